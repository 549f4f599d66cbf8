//! Outcome of a best-effort provider call

use dwhpipe_cloud::ProviderError;
use std::fmt;

/// What happened to one provider call whose failure does not stop the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Done,

    /// The provider already had the resource
    AlreadyExists,

    /// Not attempted because an earlier call failed
    Skipped,

    /// The call failed; the error was logged
    Failed(ProviderError),
}

impl Step {
    pub fn from_result(result: Result<(), ProviderError>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) if e.is_already_exists() => Self::AlreadyExists,
            Err(e) => Self::Failed(e),
        }
    }

    /// The resource is in the requested state, whoever put it there
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Done | Self::AlreadyExists)
    }

    pub fn error(&self) -> Option<&ProviderError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::AlreadyExists => f.write_str("already exists"),
            Self::Skipped => f.write_str("skipped"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}
