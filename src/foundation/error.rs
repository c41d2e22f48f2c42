use std::time::Duration;

pub type SongreelResult<T> = Result<T, SongreelError>;

/// Failure of one external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    /// Lossy rendering of the full command line.
    pub command: String,
    /// Exit code, `None` when the tool could not be spawned or was killed by a signal.
    pub code: Option<i32>,
    /// Captured diagnostic output (stderr, or stdout when stderr was empty).
    pub diagnostics: String,
}

impl std::fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "`{}` exited with code {code}", self.command)?,
            None => write!(f, "`{}` did not exit normally", self.command)?,
        }
        if !self.diagnostics.is_empty() {
            write!(f, ": {}", self.diagnostics)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SongreelError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("process error: {0}")]
    Process(Box<ProcessFailure>),

    #[error("timeout error: batch did not finish within {0:?}")]
    Timeout(Duration),

    #[error("aborted by user")]
    Aborted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SongreelError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    pub fn process(
        command: impl Into<String>,
        code: Option<i32>,
        diagnostics: impl Into<String>,
    ) -> Self {
        Self::Process(Box::new(ProcessFailure {
            command: command.into(),
            code,
            diagnostics: diagnostics.into(),
        }))
    }

    /// `true` for a user-initiated cancellation, as opposed to a failure.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Process exit code the CLI reports for this error.
    ///
    /// 130 mirrors the shell convention for SIGINT; every other error is a hard failure.
    pub fn exit_code(&self) -> u8 {
        if self.is_abort() { 130 } else { 1 }
    }
}
