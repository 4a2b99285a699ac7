//! Seal detection and extraction
//!
//! Detects a payload appended to an executable and unpacks it:
//! 1. Read exactly `TRAILER_SIZE` bytes from the end of the file
//! 2. Match the magic (mismatch means "not sealed", not an error)
//! 3. Validate the declared payload length against the file size
//! 4. Read the payload range and hand it to the archive codec

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, info};

use super::format::{SealInfo, SealTrailer, TRAILER_SIZE};
use super::{current_exe_path, SealError};
use crate::archive;

/// Detect a seal payload in the file at `path`.
///
/// Returns `Ok(None)` for files that are too short or whose trailer magic
/// does not match, and `SealError::CorruptTrailer` when the magic matches but
/// the declared payload cannot fit in the file.
pub fn detect(path: &Path) -> Result<Option<SealInfo>, SealError> {
    let mut file = File::open(path)?;
    detect_in(&mut file)
}

pub(crate) fn detect_in(file: &mut File) -> Result<Option<SealInfo>, SealError> {
    let size = file.metadata()?.len();
    if size < TRAILER_SIZE as u64 {
        return Ok(None);
    }

    let mut bytes = [0u8; TRAILER_SIZE];
    file.seek(SeekFrom::Start(size - TRAILER_SIZE as u64))?;
    file.read_exact(&mut bytes)?;

    match SealTrailer::from_bytes(&bytes) {
        Some(trailer) => trailer.locate(size).map(Some),
        None => Ok(None),
    }
}

/// Read exactly the payload range described by `info`.
pub fn read_payload(path: &Path, info: &SealInfo) -> Result<Vec<u8>, SealError> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(info.payload_offset))?;
    let mut payload = vec![0u8; info.payload_len as usize];
    file.read_exact(&mut payload)?;
    Ok(payload)
}

/// Extract the payload of `path` into `dest`, if it has one.
///
/// Returns `true` when a payload was present and extracted.
pub fn unseal_into(path: &Path, dest: &Path) -> Result<bool, SealError> {
    let Some(info) = detect(path)? else {
        debug!(path = %path.display(), "No seal trailer found");
        return Ok(false);
    };

    let payload = read_payload(path, &info)?;
    archive::unpack(&payload, dest)?;
    info!(
        path = %path.display(),
        dest = %dest.display(),
        payload_len = info.payload_len,
        "Extracted sealed payload"
    );
    Ok(true)
}

/// Extract the running executable's payload into the directory containing it.
///
/// Returns `false` when the executable is not sealed.
pub fn unseal_next_to_executable() -> Result<bool, SealError> {
    let exe = current_exe_path()?;
    let dest = exe
        .parent()
        .ok_or_else(|| SealError::NotADirectory(exe.clone()))?
        .to_path_buf();
    unseal_into(&exe, &dest)
}
