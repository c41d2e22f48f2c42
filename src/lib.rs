#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod discovery;
pub mod executor;
pub mod foundation;
pub mod installer;
pub mod invocation;
pub mod pairing;
pub mod policy;
pub mod prompt;
pub mod runner;

pub use batch::{BatchPlan, PlannedVideo, create_videos, plan_batch};
pub use config::BatchConfig;
pub use discovery::discover_media;
pub use executor::{BatchResult, DispatchMode, ExecutorConfig, run_batch};
pub use foundation::cancel::{CancelToken, DeferGuard};
pub use foundation::error::{ProcessFailure, SongreelError, SongreelResult};
pub use installer::{FfmpegLocation, ensure_ffmpeg};
pub use invocation::InvocationSpec;
pub use pairing::{ImageOrder, MediaPair, assign_images};
pub use policy::{ContainerFormat, EncodingPolicy, Resolution, ResolutionPreset};
pub use runner::{CommandRunner, ProcessRunner};
