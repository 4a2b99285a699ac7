//! Seal writer
//!
//! Produces a sealed copy of an executable. The original file is never
//! modified; the sealed copy is written next to it with a `-sealed` suffix.
//! Sealing an already sealed binary replaces its payload instead of stacking
//! a second trailer.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::format::SealTrailer;
use super::loader::detect_in;
use super::{current_exe_path, SealError};
use crate::archive;

/// Sibling path used for the sealed copy of `binary`.
///
/// `tool` becomes `tool-sealed`; `tool.exe` (any case) becomes
/// `tool-sealed.exe`.
pub fn sealed_sibling_path(binary: &Path) -> PathBuf {
    let dir = binary.parent().unwrap_or_else(|| Path::new(""));
    let base = binary
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let is_exe = binary
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"));
    let name = if is_exe {
        let stem = &base[..base.len() - 4];
        format!("{}-sealed{}", stem, &base[base.len() - 4..])
    } else {
        format!("{}-sealed", base)
    };
    dir.join(name)
}

/// Write `base bytes ++ payload ++ trailer` to the sealed sibling of `binary`.
///
/// The sealed copy reuses the permission bits of `binary`.
pub fn seal(binary: &Path, payload: &[u8]) -> Result<PathBuf, SealError> {
    let meta = fs::metadata(binary)?;
    if meta.is_dir() {
        return Err(SealError::BinaryIsDirectory(binary.to_path_buf()));
    }

    let mut input = File::open(binary)?;
    let base_size = match detect_in(&mut input)? {
        Some(existing) => existing.payload_offset,
        None => meta.len(),
    };
    input.seek(SeekFrom::Start(0))?;

    let sealed_path = sealed_sibling_path(binary);
    let mut out = BufWriter::new(File::create(&sealed_path)?);
    let copied = io::copy(&mut (&mut input).take(base_size), &mut out)?;
    if copied != base_size {
        return Err(SealError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} shrank while sealing", binary.display()),
        )));
    }
    out.write_all(payload)?;
    SealTrailer::new(payload.len() as u64).write_to(&mut out)?;
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;

    fs::set_permissions(&sealed_path, meta.permissions())?;

    info!(
        binary = %binary.display(),
        sealed = %sealed_path.display(),
        base_size,
        payload_len = payload.len(),
        "Sealed payload into binary"
    );
    Ok(sealed_path)
}

/// Pack `dir` and seal it into a copy of `binary`.
pub fn seal_directory(binary: &Path, dir: &Path) -> Result<PathBuf, SealError> {
    if !dir.is_dir() {
        return Err(SealError::NotADirectory(dir.to_path_buf()));
    }
    let payload = archive::pack(dir)?;
    seal(binary, &payload)
}

/// Pack `dir` and seal it into a copy of the running executable.
pub fn seal_directory_into_current_exe(dir: &Path) -> Result<PathBuf, SealError> {
    let exe = current_exe_path()?;
    seal_directory(&exe, dir)
}
