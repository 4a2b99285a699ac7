//! Sealed binaries
//!
//! Carries a directory tree inside an executable file:
//! - **format**: trailer layout and validation
//! - **writer**: produce a `-sealed` sibling with a new payload
//! - **loader**: detect a payload and extract it

pub mod format;
pub mod loader;
pub mod writer;

pub use format::{SealInfo, SealTrailer, SEAL_MAGIC, TRAILER_SIZE};
pub use loader::{detect, read_payload, unseal_into, unseal_next_to_executable};
pub use writer::{
    seal, seal_directory, seal_directory_into_current_exe, sealed_sibling_path,
};

use crate::archive::ArchiveError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while sealing or unsealing
#[derive(Debug, Error)]
pub enum SealError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The trailer magic matched but the declared payload is impossible
    #[error("Corrupt seal trailer: {0}")]
    CorruptTrailer(String),

    /// The binary to seal is a directory
    #[error("Binary path is a directory: {0}")]
    BinaryIsDirectory(PathBuf),

    /// The tree to seal is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Payload packing or extraction failed
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

/// Resolve the running executable, following symlinks.
pub(crate) fn current_exe_path() -> std::io::Result<PathBuf> {
    std::env::current_exe()?.canonicalize()
}
