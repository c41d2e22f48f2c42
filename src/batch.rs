use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    executor::{BatchResult, ExecutorConfig, run_batch},
    foundation::{cancel::CancelToken, error::SongreelResult},
    invocation::{self, InvocationSpec},
    pairing::{ImageOrder, MediaPair, assign_images},
    policy::EncodingPolicy,
    runner::CommandRunner,
};

/// Everything one run will do, computed before anything executes.
#[derive(Clone, Debug)]
pub struct BatchPlan {
    pub pairs: Vec<MediaPair>,
    pub invocations: Vec<InvocationSpec>,
}

/// Serializable view of one planned video, printed by `--dry-run`.
#[derive(Clone, Debug, Serialize)]
pub struct PlannedVideo<'a> {
    #[serde(flatten)]
    pub pair: &'a MediaPair,
    pub command: Vec<String>,
}

impl BatchPlan {
    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    pub fn planned(&self) -> Vec<PlannedVideo<'_>> {
        self.pairs
            .iter()
            .zip(&self.invocations)
            .map(|(pair, spec)| PlannedVideo {
                pair,
                command: spec.to_strings(),
            })
            .collect()
    }

    pub fn to_json(&self) -> SongreelResult<String> {
        let json = serde_json::to_string_pretty(&self.planned())
            .map_err(|e| anyhow::anyhow!("failed to serialize batch plan: {e}"))?;
        Ok(json)
    }
}

/// Pair audio with images and build one invocation per pair.
pub fn plan_batch(
    audio: &[PathBuf],
    images: &[PathBuf],
    order: ImageOrder,
    out_dir: &Path,
    policy: &EncodingPolicy,
) -> SongreelResult<BatchPlan> {
    let pairs = assign_images(audio, images, order, out_dir, policy.container())?;
    let invocations = invocation::build_all(&pairs, policy);
    Ok(BatchPlan { pairs, invocations })
}

/// Execute a planned batch and report how long it took.
#[tracing::instrument(skip_all, fields(songs = plan.len()))]
pub fn create_videos<R: CommandRunner>(
    plan: &BatchPlan,
    runner: &R,
    cfg: &ExecutorConfig,
    cancel: &CancelToken,
) -> SongreelResult<BatchResult> {
    tracing::info!(
        "Processing {} song(s)... (Press CTRL+C to abort)",
        plan.len()
    );
    let result = run_batch(&plan.invocations, runner, cfg, cancel)?;
    tracing::debug!(mode = ?result.mode, "batch finished");
    tracing::info!(
        "Finished operation in {:.4}s!",
        result.elapsed.as_secs_f64()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ContainerFormat;

    fn paths(prefix: &str, n: usize, ext: &str) -> Vec<PathBuf> {
        (0..n)
            .map(|i| PathBuf::from(format!("{prefix}{i}.{ext}")))
            .collect()
    }

    #[test]
    fn plan_keeps_pairs_and_invocations_aligned() {
        let policy = EncodingPolicy::new(ContainerFormat::Mp4, false, None);
        let plan = plan_batch(
            &paths("a/song", 4, "mp3"),
            &paths("i/img", 2, "png"),
            ImageOrder::Sequential,
            Path::new("out"),
            &policy,
        )
        .unwrap();

        assert_eq!(plan.len(), 4);
        for (pair, spec) in plan.pairs.iter().zip(&plan.invocations) {
            assert_eq!(spec.output(), Some(pair.output.as_path()));
            assert!(spec.contains(&pair.audio));
            assert!(spec.contains(&pair.image));
        }
    }

    #[test]
    fn dry_run_json_lists_every_video() {
        let policy = EncodingPolicy::new(ContainerFormat::Webm, false, None);
        let plan = plan_batch(
            &paths("song", 2, "flac"),
            &paths("cover", 1, "jpg"),
            ImageOrder::Sequential,
            Path::new("out"),
            &policy,
        )
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();
        let videos = value.as_array().unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[1]["output"], "out/song1.webm");
        assert_eq!(videos[0]["image"], "cover0.jpg");
        assert_eq!(videos[0]["command"][0], "ffmpeg");
    }
}
