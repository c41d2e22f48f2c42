use std::{
    fs::File,
    io::BufRead,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::Context as _;
use ffmpeg_sidecar::download::unpack_ffmpeg;

use crate::{
    foundation::error::{SongreelError, SongreelResult},
    prompt::prompt_choice,
    runner::{is_ffmpeg_on_path, is_tool_available},
};

/// Latest GPL win64 build published by BtbN.
pub const FFMPEG_URL: &str = "https://github.com/BtbN/FFmpeg-Builds/releases/download/latest/ffmpeg-master-latest-win64-gpl.zip";
const FFMPEG_ARCHIVE: &str = "ffmpeg-master-latest-win64-gpl.zip";

#[cfg(windows)]
const FFMPEG_EXE: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const FFMPEG_EXE: &str = "ffmpeg";

/// Where the encoder binary was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FfmpegLocation {
    /// `ffmpeg` resolves through `PATH`.
    OnPath,
    /// An explicit executable outside `PATH`.
    Installed(PathBuf),
}

impl FfmpegLocation {
    /// The program to put at the head of every invocation.
    pub fn program(&self) -> PathBuf {
        match self {
            Self::OnPath => PathBuf::from("ffmpeg"),
            Self::Installed(path) => path.clone(),
        }
    }
}

/// Scoop/PowerShell install routes offered on Windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallChoice {
    ScoopUser,
    ScoopAdmin,
    Download,
}

pub fn parse_install_choice(answer: &str) -> Option<InstallChoice> {
    match answer.trim() {
        "1" => Some(InstallChoice::ScoopUser),
        "2" => Some(InstallChoice::ScoopAdmin),
        "3" => Some(InstallChoice::Download),
        _ => None,
    }
}

/// `%USERPROFILE%\.songreel\ffmpeg` on Windows, `~/.songreel/ffmpeg` elsewhere.
pub fn app_ffmpeg_dir() -> SongreelResult<PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    let home = std::env::var_os(var)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| SongreelError::configuration(format!("{var} is not set")))?;
    Ok(PathBuf::from(home).join(".songreel").join("ffmpeg"))
}

/// Find an unpacked ffmpeg executable under `dir`.
///
/// Archives unpack into a versioned folder with a `bin/` subfolder, so one level is searched
/// before the flat layout.
pub fn locate_ffmpeg_in(dir: &Path) -> Option<PathBuf> {
    if let Ok(entries) = std::fs::read_dir(dir) {
        let mut subdirs: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        subdirs.sort();
        for sub in subdirs {
            for candidate in [sub.join("bin").join(FFMPEG_EXE), sub.join(FFMPEG_EXE)] {
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }
    let flat = dir.join(FFMPEG_EXE);
    flat.is_file().then_some(flat)
}

/// Make sure an ffmpeg executable is usable, installing one on Windows if needed.
///
/// `input` answers the install-route question when PowerShell is available.
pub fn ensure_ffmpeg(input: &mut impl BufRead) -> SongreelResult<FfmpegLocation> {
    if is_ffmpeg_on_path() {
        return Ok(FfmpegLocation::OnPath);
    }

    let app_dir = app_ffmpeg_dir()?;
    if let Some(path) = locate_ffmpeg_in(&app_dir) {
        tracing::debug!(path = %path.display(), "using previously downloaded ffmpeg");
        return Ok(FfmpegLocation::Installed(path));
    }

    if cfg!(windows) {
        install_windows(&app_dir, input)
    } else if cfg!(target_os = "linux") {
        Err(SongreelError::configuration(
            "ffmpeg is required. Install it with your package manager \
             (e.g. 'sudo apt install ffmpeg' on Ubuntu or Debian) and try again",
        ))
    } else {
        Err(SongreelError::configuration(
            "ffmpeg is required. Please install ffmpeg on your system first",
        ))
    }
}

fn install_windows(app_dir: &Path, input: &mut impl BufRead) -> SongreelResult<FfmpegLocation> {
    if is_scoop_available() {
        tracing::warn!("ffmpeg dependency missing. Using Scoop to install ffmpeg...");
        return install_with_scoop();
    }

    if is_pwsh_available() {
        let answer = prompt_choice(
            "ffmpeg dependency is missing. Do you wish to install it via:\n\
             [1] (Recommended) The Scoop command-line installer. This installs Scoop for the \
             current non-admin user and then ffmpeg. Requires that this is NOT run as admin.\n\
             [2] The above, but Scoop is installed as an admin instead.\n\
             [3] Download the latest ffmpeg build from GitHub. Updates have to be handled \
             manually.\n\
             Please input 1, 2 or 3:",
            &["1", "2", "3"],
            input,
        );
        match answer.and_then(parse_install_choice) {
            Some(InstallChoice::ScoopUser) => {
                install_scoop(false)?;
                return install_with_scoop();
            }
            Some(InstallChoice::ScoopAdmin) => {
                install_scoop(true)?;
                return install_with_scoop();
            }
            Some(InstallChoice::Download) => {}
            None => return Err(SongreelError::Aborted),
        }
    }

    let path = download_ffmpeg(FFMPEG_URL, app_dir)?;
    tracing::warn!(
        "ffmpeg is only used from {} for this run. Consider adding that folder to your PATH",
        path.parent().unwrap_or(app_dir).display()
    );
    Ok(FfmpegLocation::Installed(path))
}

fn is_scoop_available() -> bool {
    // scoop is a PowerShell script shim, so it only resolves through the shell.
    Command::new("cmd")
        .args(["/C", "scoop", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn is_pwsh_available() -> bool {
    Command::new("pwsh")
        .args(["-c", "$PSVersionTable"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn install_scoop(as_admin: bool) -> SongreelResult<()> {
    // PowerShell refuses to run the installer script otherwise.
    run_checked(
        "pwsh",
        &[
            "-c",
            "Set-ExecutionPolicy",
            "RemoteSigned",
            "-Scope",
            "CurrentUser",
        ],
    )?;
    if as_admin {
        run_checked("pwsh", &["-c", "iex \"& {$(irm get.scoop.sh)} -RunAsAdmin\""])
    } else {
        run_checked("pwsh", &["-c", "irm get.scoop.sh | iex"])
    }
}

fn install_with_scoop() -> SongreelResult<FfmpegLocation> {
    run_checked("cmd", &["/C", "scoop", "install", "ffmpeg"])?;
    if is_ffmpeg_on_path() {
        return Ok(FfmpegLocation::OnPath);
    }

    // A freshly installed Scoop is not on this process's PATH yet.
    let var = std::env::var_os("USERPROFILE").unwrap_or_default();
    let shim = PathBuf::from(var)
        .join("scoop")
        .join("shims")
        .join(FFMPEG_EXE);
    if is_tool_available(&shim) {
        return Ok(FfmpegLocation::Installed(shim));
    }
    Err(SongreelError::configuration(
        "Scoop reported success but ffmpeg is still not runnable. Open a new terminal and retry",
    ))
}

fn run_checked(program: &str, args: &[&str]) -> SongreelResult<()> {
    let status = Command::new(program).args(args).status();
    let line = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    match status {
        Ok(s) if s.success() => Ok(()),
        Ok(s) => Err(SongreelError::process(line, s.code(), "")),
        Err(e) => Err(SongreelError::process(line, None, e.to_string())),
    }
}

/// Download an ffmpeg archive from `url` and unpack it into `dest`.
///
/// Returns the unpacked executable. The archive is removed afterwards.
pub fn download_ffmpeg(url: &str, dest: &Path) -> SongreelResult<PathBuf> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("failed to create '{}'", dest.display()))?;
    let archive_path = dest.join(FFMPEG_ARCHIVE);

    tracing::info!("Downloading latest ffmpeg build from {url}...");
    let resp = ureq::get(url)
        .call()
        .with_context(|| format!("HTTP request to {url} failed"))?;
    let mut body = resp.into_body().into_reader();
    let mut file = File::create(&archive_path)
        .with_context(|| format!("failed to create '{}'", archive_path.display()))?;
    let written = std::io::copy(&mut body, &mut file).context("ffmpeg download interrupted")?;
    drop(file);

    tracing::info!(
        "Download done ({written} bytes). Unpacking at {}...",
        dest.display()
    );
    unpack_ffmpeg(&archive_path, dest).context("failed to unpack the ffmpeg archive")?;
    if let Err(e) = std::fs::remove_file(&archive_path) {
        tracing::debug!("could not remove {}: {e}", archive_path.display());
    }

    locate_ffmpeg_in(dest).ok_or_else(|| {
        SongreelError::configuration(format!(
            "the downloaded archive did not contain {FFMPEG_EXE}"
        ))
    })
}
