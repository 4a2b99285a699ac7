//! Failure classification

use super::LaunchError;

/// Why a command did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The process ran and returned a nonzero status.
    Exit,
    /// The process never started (exec format, not found, permission).
    Launch,
}

impl LaunchError {
    /// `None` for errors that are not about the child process itself.
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            LaunchError::Exit { .. } => Some(FailureClass::Exit),
            LaunchError::Launch { .. } => Some(FailureClass::Launch),
            LaunchError::UnknownExecutable(_) | LaunchError::Io(_) => None,
        }
    }

    /// Exit code of the child, when it ran and exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            LaunchError::Exit { status, .. } => status.code(),
            _ => None,
        }
    }
}
