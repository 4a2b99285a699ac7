//! Crate-level error type.

use std::path::PathBuf;

use crate::archive::ArchiveError;
use crate::bootstrap::BootstrapError;
use crate::config::ConfigError;
use crate::launcher::LaunchError;
use crate::seal::SealError;

/// Errors that can occur while creating or using a runtime instance.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// File I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Archive packing or extraction error
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Seal trailer or payload error
    #[error("Seal error: {0}")]
    Seal(#[from] SealError),

    /// Runtime tree preparation error
    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// Subprocess error
    #[error("{0}")]
    Launch(#[from] LaunchError),

    /// Configuration error
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Expected a sealed payload but found none
    #[error("{0} carries no sealed payload")]
    NotSealed(PathBuf),
}

impl RuntimeError {
    /// Exit code of a child process that ran and failed.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RuntimeError::Launch(e) => e.exit_code(),
            _ => None,
        }
    }
}
