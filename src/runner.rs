use std::{
    io::Read,
    process::{Child, Command, ExitStatus, Stdio},
    thread::JoinHandle,
    time::Duration,
};

use crate::{
    foundation::{
        cancel::CancelToken,
        error::{SongreelError, SongreelResult},
    },
    invocation::InvocationSpec,
};

/// Executes a single invocation to completion.
///
/// Implementations block the calling thread. `stop` is the pool's teardown signal: when it
/// fires, a running invocation must be terminated and `Err(Aborted)` returned.
pub trait CommandRunner: Sync {
    fn run(&self, spec: &InvocationSpec, stop: &CancelToken) -> SongreelResult<()>;
}

#[derive(Clone, Debug)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ProcessRunner {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    fn wait(
        &self,
        child: &mut Child,
        spec: &InvocationSpec,
        stop: &CancelToken,
    ) -> SongreelResult<ExitStatus> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    return Err(SongreelError::process(
                        spec.to_string(),
                        None,
                        format!("failed to wait for process: {e}"),
                    ));
                }
            }

            if stop.is_cancelled() {
                // The child may have exited in between; kill errors are not interesting then.
                let _ = child.kill();
                let _ = child.wait();
                tracing::debug!(command = %spec, "terminated in-flight invocation");
                return Err(SongreelError::Aborted);
            }

            std::thread::sleep(self.poll_interval);
        }
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &InvocationSpec, stop: &CancelToken) -> SongreelResult<()> {
        stop.check()?;

        let mut child = Command::new(spec.program())
            .args(spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SongreelError::process(
                    spec.to_string(),
                    None,
                    format!("failed to spawn (is it installed and on PATH?): {e}"),
                )
            })?;

        // Both pipes are drained concurrently so a chatty encoder never blocks on a full pipe.
        let stdout_drain = child.stdout.take().map(drain);
        let stderr_drain = child.stderr.take().map(drain);

        let status = self.wait(&mut child, spec, stop);
        let stdout = join_drain(stdout_drain);
        let stderr = join_drain(stderr_drain);
        let status = status?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let diagnostics = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(SongreelError::process(
                spec.to_string(),
                status.code(),
                diagnostics,
            ));
        }

        match spec.output() {
            Some(out) => tracing::info!("Created video at {}", out.display()),
            None => tracing::info!(command = %spec, "invocation finished"),
        }
        Ok(())
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        // A read error only truncates diagnostics.
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    })
}

fn join_drain(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

pub fn is_tool_available(program: impl AsRef<std::ffi::OsStr>) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn is_ffmpeg_on_path() -> bool {
    is_tool_available("ffmpeg")
}
