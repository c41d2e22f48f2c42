use std::{
    ffi::{OsStr, OsString},
    path::Path,
};

use crate::{pairing::MediaPair, policy::EncodingPolicy};

/// One complete encoder command line: program plus ordered arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InvocationSpec {
    program: OsString,
    args: Vec<OsString>,
}

impl InvocationSpec {
    pub fn new(program: impl Into<OsString>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Program followed by every argument.
    pub fn argv(&self) -> impl Iterator<Item = &OsStr> {
        std::iter::once(self.program.as_os_str()).chain(self.args.iter().map(OsString::as_os_str))
    }

    /// The output file, which is always the last argument.
    pub fn output(&self) -> Option<&Path> {
        self.args.last().map(Path::new)
    }

    /// Lossy UTF-8 rendering of every argv element.
    pub fn to_strings(&self) -> Vec<String> {
        self.argv()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    pub fn contains(&self, needle: impl AsRef<OsStr>) -> bool {
        let needle = needle.as_ref();
        self.argv().any(|a| a == needle)
    }
}

impl std::fmt::Display for InvocationSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, arg) in self.argv().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, "\"{arg}\"")?;
            } else {
                f.write_str(&arg)?;
            }
        }
        Ok(())
    }
}

/// Build the encoder invocation for one pair.
///
/// Pure: equal inputs always produce identical argument vectors.
pub fn build(pair: &MediaPair, policy: &EncodingPolicy) -> InvocationSpec {
    let mut args: Vec<OsString> = Vec::with_capacity(24);
    let mut push = |a: &str| args.push(OsString::from(a));

    push("-y");
    push("-loop");
    push("1");
    // 1 fps makes ffmpeg append up to ~30s of silence; 2 fps still leaves up to ~2s.
    push("-framerate");
    push("2");
    push("-i");
    args.push(pair.image.clone().into_os_string());
    args.push(OsString::from("-i"));
    args.push(pair.audio.clone().into_os_string());

    let tail = [
        "-c:v",
        policy.video_codec().encoder(),
        "-c:a",
        policy.audio_codec().encoder(),
        "-pix_fmt",
        "yuv420p",
    ];
    args.extend(tail.iter().map(OsString::from));

    if let Some(filter) = policy.filter() {
        args.push(OsString::from("-vf"));
        args.push(OsString::from(filter.expression()));
    }

    args.extend(
        [
            "-shortest",
            "-fflags",
            "+shortest",
            "-max_interleave_delta",
            "100M",
        ]
        .iter()
        .map(OsString::from),
    );
    args.push(pair.output.clone().into_os_string());

    InvocationSpec::new(policy.program().clone(), args)
}

/// Build one invocation per pair, preserving order.
pub fn build_all(pairs: &[MediaPair], policy: &EncodingPolicy) -> Vec<InvocationSpec> {
    pairs.iter().map(|pair| build(pair, policy)).collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::policy::{ContainerFormat, ResolutionPreset, VideoFilter};

    fn pair() -> MediaPair {
        MediaPair {
            audio: PathBuf::from("music/track one.flac"),
            image: PathBuf::from("art/cover.png"),
            output: PathBuf::from("out/track one.mp4"),
        }
    }

    #[test]
    fn x264_argument_order_is_exact() {
        let policy = EncodingPolicy::new(ContainerFormat::Mp4, false, None);
        let spec = build(&pair(), &policy);
        assert_eq!(
            spec.to_strings(),
            vec![
                "ffmpeg",
                "-y",
                "-loop",
                "1",
                "-framerate",
                "2",
                "-i",
                "art/cover.png",
                "-i",
                "music/track one.flac",
                "-c:v",
                "libx264",
                "-c:a",
                "copy",
                "-pix_fmt",
                "yuv420p",
                "-vf",
                "pad=ceil(iw/2)*2:ceil(ih/2)*2",
                "-shortest",
                "-fflags",
                "+shortest",
                "-max_interleave_delta",
                "100M",
                "out/track one.mp4",
            ]
        );
        assert_eq!(spec.output(), Some(Path::new("out/track one.mp4")));
    }

    #[test]
    fn filter_sits_right_after_pixel_format() {
        let policy = EncodingPolicy::from_preset(
            ContainerFormat::Webm,
            false,
            Some(ResolutionPreset::P720),
        );
        let args = build(&pair(), &policy).to_strings();
        let pix = args.iter().position(|a| a == "-pix_fmt").unwrap();
        assert_eq!(args[pix + 1], "yuv420p");
        assert_eq!(args[pix + 2], "-vf");
        assert!(args[pix + 3].starts_with("scale=1280:720:"));
    }

    #[test]
    fn exactly_one_filter_policy_applies() {
        let scale = VideoFilter::ScaleAndPad(ResolutionPreset::P360.resolution()).expression();
        let even = VideoFilter::PadToEven.expression();

        for container in ContainerFormat::ALL {
            for use_x265 in [false, true] {
                for preset in [None, Some(ResolutionPreset::P360)] {
                    let policy = EncodingPolicy::from_preset(container, use_x265, preset);
                    let spec = build(&pair(), &policy);
                    let vf_count = spec.args().iter().filter(|a| *a == "-vf").count();
                    let has_scale = spec.contains(&scale);
                    let has_even = spec.contains(&even);
                    assert!(!(has_scale && has_even));
                    assert!(vf_count <= 1);

                    if preset.is_some() {
                        assert!(has_scale, "{container} x265={use_x265}");
                    } else if policy.video_codec().requires_even_dimensions() {
                        assert!(has_even, "{container} x265={use_x265}");
                    } else {
                        assert_eq!(vf_count, 0, "{container} x265={use_x265}");
                    }
                }
            }
        }
    }

    #[test]
    fn webm_always_uses_vorbis_and_vp9() {
        for use_x265 in [false, true] {
            let policy = EncodingPolicy::new(ContainerFormat::Webm, use_x265, None);
            let spec = build(&pair(), &policy);
            assert!(spec.contains("libvorbis"));
            assert!(spec.contains("libvpx-vp9"));
            assert!(!spec.contains("copy"));
        }
    }

    #[test]
    fn building_is_deterministic_and_independent_per_pair() {
        let policy = EncodingPolicy::new(ContainerFormat::Mp4, true, None);
        let first = pair();
        let mut second = pair();
        second.audio = PathBuf::from("music/other.mp3");
        second.output = PathBuf::from("out/other.mp4");

        let specs = build_all(&[first.clone(), second], &policy);
        assert_eq!(specs[0], build(&first, &policy));
        assert_ne!(specs[0], specs[1]);
        assert!(specs[1].contains("music/other.mp3"));
        assert!(!specs[0].contains("music/other.mp3"));
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let policy = EncodingPolicy::new(ContainerFormat::Webm, false, None);
        let line = build(&pair(), &policy).to_string();
        assert!(line.starts_with("ffmpeg -y -loop 1"));
        assert!(line.contains("\"music/track one.flac\""));
    }

    #[test]
    fn custom_program_is_used() {
        let policy =
            EncodingPolicy::new(ContainerFormat::Webm, false, None).with_program("/x/ffmpeg");
        assert_eq!(build(&pair(), &policy).program(), "/x/ffmpeg");
    }
}
