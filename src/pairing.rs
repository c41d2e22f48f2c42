use std::{
    collections::HashMap,
    ffi::OsString,
    path::{Path, PathBuf},
};

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;

use crate::{
    foundation::error::{SongreelError, SongreelResult},
    policy::ContainerFormat,
};

/// How images are distributed over the audio files of a batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageOrder {
    /// Round-robin through the image list in its given order.
    #[default]
    Sequential,
    /// Independent uniform draw per audio file, with replacement. A seed makes it reproducible.
    Random { seed: Option<u64> },
}

/// One audio file, the image shown for it, and where the video goes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MediaPair {
    pub audio: PathBuf,
    pub image: PathBuf,
    pub output: PathBuf,
}

/// `<out_dir>/<audio stem>.<ext>`
pub fn output_path_for(audio: &Path, out_dir: &Path, format: ContainerFormat) -> PathBuf {
    let mut name = audio
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".");
    name.push(format.extension());
    out_dir.join(name)
}

/// Pick one image index per audio file.
pub fn image_indices(audio_count: usize, image_count: usize, order: ImageOrder) -> Vec<usize> {
    if image_count == 0 {
        return Vec::new();
    }
    match order {
        ImageOrder::Sequential => (0..audio_count).map(|i| i % image_count).collect(),
        ImageOrder::Random { seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            (0..audio_count)
                .map(|_| rng.random_range(0..image_count))
                .collect()
        }
    }
}

/// Pair every audio file with an image and derive its output path.
///
/// The result follows `audio` order. Fails when `images` is empty or when two audio files would
/// write the same output file.
pub fn assign_images(
    audio: &[PathBuf],
    images: &[PathBuf],
    order: ImageOrder,
    out_dir: &Path,
    format: ContainerFormat,
) -> SongreelResult<Vec<MediaPair>> {
    if images.is_empty() {
        return Err(SongreelError::validation(
            "at least one image is required to pair with audio files",
        ));
    }

    let indices = image_indices(audio.len(), images.len(), order);
    let pairs: Vec<MediaPair> = audio
        .iter()
        .zip(indices)
        .map(|(audio, idx)| MediaPair {
            output: output_path_for(audio, out_dir, format),
            image: images[idx].clone(),
            audio: audio.clone(),
        })
        .collect();

    let case_insensitive = cfg!(any(windows, target_os = "macos"));
    let mut seen = HashMap::<PathBuf, &Path>::with_capacity(pairs.len());
    for pair in &pairs {
        let key = collision_key(&pair.output, case_insensitive);
        if let Some(first) = seen.insert(key, pair.audio.as_path()) {
            return Err(SongreelError::validation(format!(
                "'{}' and '{}' would both be written to '{}'",
                first.display(),
                pair.audio.display(),
                pair.output.display()
            )));
        }
    }

    tracing::debug!(pairs = pairs.len(), ?order, "assigned images");
    Ok(pairs)
}

/// Output paths that name the same file compare equal under this key.
fn collision_key(output: &Path, case_insensitive: bool) -> PathBuf {
    if case_insensitive {
        PathBuf::from(output.to_string_lossy().to_lowercase())
    } else {
        output.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(prefix: &str, n: usize, ext: &str) -> Vec<PathBuf> {
        (1..=n)
            .map(|i| PathBuf::from(format!("in/{prefix}{i}.{ext}")))
            .collect()
    }

    #[test]
    fn sequential_cycles_through_images() {
        assert_eq!(
            image_indices(7, 3, ImageOrder::Sequential),
            vec![0, 1, 2, 0, 1, 2, 0]
        );
    }

    #[test]
    fn single_image_is_used_everywhere() {
        for order in [ImageOrder::Sequential, ImageOrder::Random { seed: Some(9) }] {
            assert_eq!(image_indices(4, 1, order), vec![0; 4]);
        }
    }

    #[test]
    fn seeded_random_order_is_reproducible() {
        let a = image_indices(32, 5, ImageOrder::Random { seed: Some(42) });
        let b = image_indices(32, 5, ImageOrder::Random { seed: Some(42) });
        assert_eq!(a, b);
        assert!(a.iter().all(|&i| i < 5));
    }

    #[test]
    fn pairs_follow_audio_order_and_name_outputs_after_stems() {
        let audio = paths("song", 4, "mp3");
        let images = paths("img", 2, "jpg");
        let pairs = assign_images(
            &audio,
            &images,
            ImageOrder::Sequential,
            Path::new("out"),
            ContainerFormat::Mp4,
        )
        .unwrap();

        assert_eq!(pairs.len(), 4);
        for (i, pair) in pairs.iter().enumerate() {
            assert_eq!(pair.audio, audio[i]);
            assert_eq!(pair.image, images[i % 2]);
            assert_eq!(pair.output, Path::new("out").join(format!("song{}.mp4", i + 1)));
        }
    }

    #[test]
    fn output_names_do_not_depend_on_order() {
        let audio = paths("song", 3, "wav");
        let images = paths("img", 3, "png");
        let seq = assign_images(
            &audio,
            &images,
            ImageOrder::Sequential,
            Path::new("o"),
            ContainerFormat::Webm,
        )
        .unwrap();
        let rnd = assign_images(
            &audio,
            &images,
            ImageOrder::Random { seed: Some(1) },
            Path::new("o"),
            ContainerFormat::Webm,
        )
        .unwrap();
        let outs = |v: &[MediaPair]| v.iter().map(|p| p.output.clone()).collect::<Vec<_>>();
        assert_eq!(outs(&seq), outs(&rnd));
    }

    #[test]
    fn empty_image_list_is_rejected() {
        let err = assign_images(
            &paths("song", 1, "mp3"),
            &[],
            ImageOrder::Sequential,
            Path::new("."),
            ContainerFormat::Webm,
        )
        .unwrap_err();
        assert!(matches!(err, SongreelError::Validation(_)));
    }

    #[test]
    fn colliding_stems_are_rejected() {
        let audio = vec![PathBuf::from("a/song.mp3"), PathBuf::from("b/song.flac")];
        let err = assign_images(
            &audio,
            &paths("img", 1, "jpg"),
            ImageOrder::Sequential,
            Path::new("out"),
            ContainerFormat::Webm,
        )
        .unwrap_err();
        assert!(err.to_string().contains("song.webm"));
    }

    #[test]
    fn collision_key_folds_case_only_when_asked() {
        let upper = Path::new("out/Song.webm");
        let lower = Path::new("out/song.webm");
        assert_eq!(collision_key(upper, true), collision_key(lower, true));
        assert_ne!(collision_key(upper, false), collision_key(lower, false));
    }

    #[cfg(any(windows, target_os = "macos"))]
    #[test]
    fn stems_differing_only_in_case_are_rejected() {
        let audio = vec![PathBuf::from("a/Song.mp3"), PathBuf::from("a/song.wav")];
        let err = assign_images(
            &audio,
            &paths("img", 1, "jpg"),
            ImageOrder::Sequential,
            Path::new("out"),
            ContainerFormat::Webm,
        )
        .unwrap_err();
        assert!(matches!(err, SongreelError::Validation(_)));
    }
}
