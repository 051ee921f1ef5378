//! Exit code logic for the shdl process.
//!
//! Single responsibility: map run failures to a stable process exit code.

use shdl_core::download::DownloadError;
use shdl_core::resolver::ResolveError;

/// Outcome kinds of one run, each with a stable exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    OutputError,
    ArgInvalid,
    NetworkError,
    QueryInvalid,
    FileNotFound,
    NoMirrorConfigured,
}

impl ProcessExit {
    /// Process exit code of this kind.
    #[must_use]
    pub(crate) fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::OutputError => 1,
            Self::ArgInvalid => 2,
            Self::NetworkError => 3,
            Self::QueryInvalid => 4,
            Self::FileNotFound => 5,
            Self::NoMirrorConfigured => 6,
        }
    }
}

impl From<&ResolveError> for ProcessExit {
    fn from(error: &ResolveError) -> Self {
        match error {
            ResolveError::QueryInvalid { .. } => Self::QueryInvalid,
            ResolveError::NoMirrorConfigured { .. } => Self::NoMirrorConfigured,
            ResolveError::FileNotFound { .. } => Self::FileNotFound,
            ResolveError::UnknownRepoType { .. } | ResolveError::ClientSetup { .. } => {
                Self::ArgInvalid
            }
        }
    }
}

impl From<&DownloadError> for ProcessExit {
    fn from(_: &DownloadError) -> Self {
        Self::OutputError
    }
}

/// A fatal run failure: the exit kind plus the message shown to the user.
#[derive(Debug)]
pub(crate) struct RunFailure {
    pub(crate) exit: ProcessExit,
    pub(crate) error: anyhow::Error,
}

impl RunFailure {
    pub(crate) fn new(exit: ProcessExit, error: impl Into<anyhow::Error>) -> Self {
        Self {
            exit,
            error: error.into(),
        }
    }
}

impl From<ResolveError> for RunFailure {
    fn from(error: ResolveError) -> Self {
        Self::new(ProcessExit::from(&error), error)
    }
}

impl From<DownloadError> for RunFailure {
    fn from(error: DownloadError) -> Self {
        Self::new(ProcessExit::from(&error), error)
    }
}

/// Prints the single `ERROR:` line of a fatal run unless output is piped.
pub(crate) fn report_failure(failure: &RunFailure, piping: bool) {
    if !piping {
        eprintln!("{}", failure_line(failure));
    }
}

/// The diagnostic for a failure, folded onto one line.
pub(crate) fn failure_line(failure: &RunFailure) -> String {
    let message = format!("{:#}", failure.error);
    let folded: Vec<&str> = message
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    format!("ERROR: {}", folded.join(" "))
}
