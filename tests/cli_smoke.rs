use std::{path::PathBuf, process::Command};

fn exe() -> PathBuf {
    std::env::var_os("CARGO_BIN_EXE_songreel")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut p = PathBuf::from("target").join("debug");
            p.push(if cfg!(windows) {
                "songreel.exe"
            } else {
                "songreel"
            });
            p
        })
}

#[test]
fn cli_formats_lists_supported_types() {
    let out = Command::new(exe()).arg("--formats").output().unwrap();
    assert!(out.status.success());

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("Valid audio formats: mp3, wav, flac, wma, opus, ogg"));
    assert!(stdout.contains("Valid image formats: jpg, jpeg, png, bmp"));
    assert!(stdout.contains("webm"));
}

#[test]
fn cli_dry_run_prints_plan_without_touching_output() {
    let dir = tempfile::tempdir().unwrap();
    let music = dir.path().join("music");
    std::fs::create_dir_all(&music).unwrap();
    for name in ["b.mp3", "a.flac", "notes.txt"] {
        std::fs::write(music.join(name), b"").unwrap();
    }
    let cover = dir.path().join("cover.png");
    std::fs::write(&cover, b"").unwrap();
    let out_dir = dir.path().join("videos");

    let out = Command::new(exe())
        .arg("--dry-run")
        .arg("-a")
        .arg(&music)
        .arg("-i")
        .arg(&cover)
        .arg("-o")
        .arg(&out_dir)
        .args(["--vid-format", "mp4", "--resolution", "360p"])
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "{}",
        String::from_utf8_lossy(&out.stderr)
    );

    let plan: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let videos = plan.as_array().unwrap();
    assert_eq!(videos.len(), 2);

    let first_out = PathBuf::from(videos[0]["output"].as_str().unwrap());
    assert_eq!(first_out, out_dir.join("a.mp4"));
    let command: Vec<&str> = videos[0]["command"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(command.contains(&"libx264"));
    assert!(command.iter().any(|a| a.starts_with("scale=640:360:")));
    assert!(!out_dir.exists());
}

#[test]
fn cli_missing_audio_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(exe())
        .arg("--dry-run")
        .arg("-a")
        .arg(dir.path().join("nothing-here"))
        .arg("-i")
        .arg(dir.path())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn cli_requires_audio_and_image() {
    let out = Command::new(exe()).output().unwrap();
    assert_eq!(out.status.code(), Some(2));
}
