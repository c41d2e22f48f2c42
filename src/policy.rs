use std::{ffi::OsString, path::PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "wma", "opus", "ogg"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp4,
    Avi,
    Flv,
    // Small files and fast YouTube processing make WebM the best fit for a still image.
    #[default]
    Webm,
    Wmv,
    Mov,
}

impl ContainerFormat {
    pub const ALL: [ContainerFormat; 6] = [
        Self::Mp4,
        Self::Avi,
        Self::Flv,
        Self::Webm,
        Self::Wmv,
        Self::Mov,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
            Self::Flv => "flv",
            Self::Webm => "webm",
            Self::Wmv => "wmv",
            Self::Mov => "mov",
        }
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum ResolutionPreset {
    #[value(name = "360p")]
    #[serde(rename = "360p")]
    P360,
    #[value(name = "480p")]
    #[serde(rename = "480p")]
    P480,
    #[value(name = "720p")]
    #[serde(rename = "720p")]
    P720,
    #[value(name = "1080p")]
    #[serde(rename = "1080p")]
    P1080,
}

impl ResolutionPreset {
    pub fn resolution(self) -> Resolution {
        let (width, height) = match self {
            Self::P360 => (640, 360),
            Self::P480 => (854, 480),
            Self::P720 => (1280, 720),
            Self::P1080 => (1920, 1080),
        };
        Resolution { width, height }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum VideoCodec {
    Vp9,
    X264,
    X265,
}

impl VideoCodec {
    pub fn encoder(self) -> &'static str {
        match self {
            Self::Vp9 => "libvpx-vp9",
            Self::X264 => "libx264",
            Self::X265 => "libx265",
        }
    }

    pub fn requires_even_dimensions(self) -> bool {
        matches!(self, Self::X264)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum AudioCodec {
    Vorbis,
    /// Stream copy of the source audio.
    Copy,
}

impl AudioCodec {
    pub fn encoder(self) -> &'static str {
        match self {
            Self::Vorbis => "libvorbis",
            Self::Copy => "copy",
        }
    }
}

/// The single `-vf` filter a batch uses, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum VideoFilter {
    /// Fit the image inside the target size and letterbox the rest with black, centered.
    ScaleAndPad(Resolution),
    /// Pad width and height up to the next even number without scaling.
    PadToEven,
}

impl VideoFilter {
    pub fn expression(self) -> String {
        match self {
            Self::ScaleAndPad(Resolution { width, height }) => format!(
                "scale={width}:{height}:force_original_aspect_ratio=decrease,\
                 pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"
            ),
            Self::PadToEven => "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
        }
    }
}

/// Codec, container and filter choices shared by every invocation of one batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodingPolicy {
    program: OsString,
    container: ContainerFormat,
    video_codec: VideoCodec,
    audio_codec: AudioCodec,
    resolution: Option<Resolution>,
    filter: Option<VideoFilter>,
}

impl EncodingPolicy {
    pub fn new(container: ContainerFormat, use_x265: bool, resolution: Option<Resolution>) -> Self {
        // WebM only carries VP8/VP9/AV1 video and Vorbis/Opus audio, so source passthrough is out.
        let (video_codec, audio_codec) = match container {
            ContainerFormat::Webm => (VideoCodec::Vp9, AudioCodec::Vorbis),
            _ if use_x265 => (VideoCodec::X265, AudioCodec::Copy),
            _ => (VideoCodec::X264, AudioCodec::Copy),
        };

        let filter = match resolution {
            Some(res) => Some(VideoFilter::ScaleAndPad(res)),
            None if video_codec.requires_even_dimensions() => Some(VideoFilter::PadToEven),
            None => None,
        };

        Self {
            program: OsString::from("ffmpeg"),
            container,
            video_codec,
            audio_codec,
            resolution,
            filter,
        }
    }

    pub fn from_preset(
        container: ContainerFormat,
        use_x265: bool,
        preset: Option<ResolutionPreset>,
    ) -> Self {
        Self::new(container, use_x265, preset.map(ResolutionPreset::resolution))
    }

    /// Use an explicit encoder executable instead of `ffmpeg` from `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into().into_os_string();
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn container(&self) -> ContainerFormat {
        self.container
    }

    pub fn video_codec(&self) -> VideoCodec {
        self.video_codec
    }

    pub fn audio_codec(&self) -> AudioCodec {
        self.audio_codec
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn filter(&self) -> Option<VideoFilter> {
        self.filter
    }
}
