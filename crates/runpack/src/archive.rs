//! Directory archive codec
//!
//! Packs a directory tree into a gzip-compressed tar stream and unpacks such a
//! stream back into a directory.
//!
//! Only two entry kinds are representable: directories and regular files.
//! Symbolic links, devices, fifos and every other tar entry type are rejected
//! in both directions, and every unpacked entry must stay inside the
//! destination root.
//!
//! ```text
//! root/            ← directory entries carry a trailing slash
//! root/a/
//! root/a/b.txt     ← mode and content preserved
//! root/c/
//! ```

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use tar::{Archive, Builder, EntryType, Header};
use thiserror::Error;
use tracing::{debug, trace};

/// Mode given to every directory created while unpacking.
pub const DIR_MODE: u32 = 0o755;

/// Errors that can occur while packing or unpacking an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The tar stream contains a header that cannot be read
    #[error("Malformed archive entry: {0}")]
    Malformed(String),

    /// The gzip stream cannot be decoded
    #[error("Failed to decompress archive: {0}")]
    Decompress(String),

    /// An entry would land outside the destination root
    #[error("Path traversal in archive: {0}")]
    PathTraversal(String),

    /// Symlinks, devices and other non-regular entries
    #[error("Unsupported archive entry: {0}")]
    UnsupportedEntry(String),

    /// The directory to pack is missing or has no usable base name
    #[error("Cannot pack {0}: not a named directory")]
    InvalidRoot(PathBuf),
}

// ============================================================================
// Packing
// ============================================================================

/// Pack `dir` into a gzip-compressed tar stream.
///
/// Every entry is prefixed with the base name of `dir`, uses forward slashes,
/// and keeps the permission bits of the file it came from. Children are
/// emitted in name order so packing the same tree twice gives the same entry
/// sequence.
pub fn pack(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let root = fs::canonicalize(dir)?;
    if !root.is_dir() {
        return Err(ArchiveError::InvalidRoot(dir.to_path_buf()));
    }
    let root_name = root
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ArchiveError::InvalidRoot(dir.to_path_buf()))?
        .to_string();

    let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    append_dir(&mut builder, &root, &root_name)?;
    let encoder = builder.into_inner()?;
    let bytes = encoder.finish()?;

    debug!(root = %root.display(), size = bytes.len(), "Packed directory");
    Ok(bytes)
}

fn append_dir<W: Write>(
    builder: &mut Builder<W>,
    dir: &Path,
    name: &str,
) -> Result<(), ArchiveError> {
    let meta = fs::symlink_metadata(dir)?;
    let entry_name = format!("{}/", name);
    let header = entry_header(&meta, EntryType::Directory, 0);
    append_entry(builder, header, &entry_name, io::empty())?;

    let mut children = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(|child| child.file_name());

    for child in children {
        let path = child.path();
        let file_name = child.file_name();
        let file_name = file_name.to_str().ok_or_else(|| {
            ArchiveError::UnsupportedEntry(format!("non UTF-8 name: {}", path.display()))
        })?;
        let child_name = format!("{}/{}", name, file_name);

        let meta = fs::symlink_metadata(&path)?;
        let file_type = meta.file_type();
        if file_type.is_symlink() {
            return Err(ArchiveError::UnsupportedEntry(format!(
                "symbolic link: {}",
                path.display()
            )));
        } else if file_type.is_dir() {
            append_dir(builder, &path, &child_name)?;
        } else if file_type.is_file() {
            let file = File::open(&path)?;
            let header = entry_header(&meta, EntryType::Regular, meta.len());
            append_entry(builder, header, &child_name, file)?;
        } else {
            return Err(ArchiveError::UnsupportedEntry(format!(
                "special file: {}",
                path.display()
            )));
        }
    }

    Ok(())
}

fn append_entry<W: Write, R: Read>(
    builder: &mut Builder<W>,
    mut header: Header,
    name: &str,
    data: R,
) -> Result<(), ArchiveError> {
    trace!(entry = name, "Appending archive entry");
    builder.append_data(&mut header, name, data)?;
    Ok(())
}

fn entry_header(meta: &Metadata, kind: EntryType, size: u64) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_size(size);
    header.set_mode(permission_bits(meta));
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    header.set_mtime(mtime);
    header
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, _) => DIR_MODE,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

// ============================================================================
// Unpacking
// ============================================================================

/// Unpack a gzip-compressed tar stream into `dest`.
///
/// Entries are validated one at a time before anything is written for them,
/// so a traversal attempt aborts the extraction without touching anything
/// outside `dest`. Existing files are truncated and overwritten.
pub fn unpack(data: &[u8], dest: &Path) -> Result<(), ArchiveError> {
    let dest = std::path::absolute(dest)?;
    let mut archive = Archive::new(GzDecoder::new(data));
    let entries = archive.entries().map_err(read_error)?;

    let mut count = 0usize;
    for entry in entries {
        let mut entry = entry.map_err(|e| match read_error(e) {
            ArchiveError::Io(e) => ArchiveError::Malformed(e.to_string()),
            other => other,
        })?;

        let raw_path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let Some(relative) = clean_entry_path(&raw_path)? else {
            continue;
        };
        let target = dest.join(&relative);
        if !target.starts_with(&dest) {
            return Err(ArchiveError::PathTraversal(raw_path));
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            create_dir(&target)?;
        } else if entry_type.is_file() {
            let mode = entry
                .header()
                .mode()
                .map_err(|e| ArchiveError::Malformed(format!("{}: {}", raw_path, e)))?;
            if let Some(parent) = target.parent() {
                create_dir(parent)?;
            }
            let mut file = File::create(&target)?;
            io::copy(&mut entry, &mut file).map_err(read_error)?;
            file.flush()?;
            drop(file);
            set_mode(&target, mode)?;
        } else {
            return Err(ArchiveError::UnsupportedEntry(format!(
                "{:?} entry {}",
                entry_type, raw_path
            )));
        }
        count += 1;
    }

    debug!(dest = %dest.display(), entries = count, "Unpacked archive");
    Ok(())
}

/// Normalize an archive entry name.
///
/// Returns `None` for names that clean to the archive root (`.`), and a
/// relative path made only of normal components otherwise.
fn clean_entry_path(raw: &str) -> Result<Option<PathBuf>, ArchiveError> {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(ArchiveError::PathTraversal(raw.to_string()));
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                if parts.pop().is_none() {
                    return Err(ArchiveError::PathTraversal(raw.to_string()));
                }
            }
            part => parts.push(part),
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }

    let relative: PathBuf = parts.iter().collect();
    // Drive prefixes and backslash separators only mean something on Windows
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(ArchiveError::PathTraversal(raw.to_string()));
    }
    Ok(Some(relative))
}

fn read_error(e: io::Error) -> ArchiveError {
    match e.kind() {
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            ArchiveError::Decompress(e.to_string())
        }
        _ => ArchiveError::Io(e),
    }
}

#[cfg(unix)]
fn create_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
}

#[cfg(not(unix))]
fn create_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Build a tar.gz whose single entry name is written verbatim, bypassing
    /// the checks `tar::Header::set_path` performs.
    fn raw_archive(name: &str, kind: EntryType, data: &[u8]) -> Vec<u8> {
        let mut header = Header::new_old();
        {
            let old = header.as_old_mut();
            old.name[..name.len()].copy_from_slice(name.as_bytes());
        }
        header.set_entry_type(kind);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();

        let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        builder.append(&header, data).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn entry_names(data: &[u8]) -> Vec<String> {
        let mut archive = Archive::new(GzDecoder::new(data));
        archive
            .entries()
            .unwrap()
            .map(|e| String::from_utf8_lossy(&e.unwrap().path_bytes()).into_owned())
            .collect()
    }

    #[test]
    fn test_clean_entry_path() {
        assert_eq!(
            clean_entry_path("root/a/b.txt").unwrap(),
            Some(PathBuf::from("root/a/b.txt"))
        );
        assert_eq!(
            clean_entry_path("./root//a/./b.txt").unwrap(),
            Some(PathBuf::from("root/a/b.txt"))
        );
        assert_eq!(
            clean_entry_path("root/x/../b.txt").unwrap(),
            Some(PathBuf::from("root/b.txt"))
        );
        assert_eq!(clean_entry_path("./").unwrap(), None);
    }

    #[test]
    fn test_clean_entry_path_rejects_escape() {
        assert!(matches!(
            clean_entry_path(".."),
            Err(ArchiveError::PathTraversal(_))
        ));
        assert!(matches!(
            clean_entry_path("root/../../etc/passwd"),
            Err(ArchiveError::PathTraversal(_))
        ));
        assert!(matches!(
            clean_entry_path("/etc/passwd"),
            Err(ArchiveError::PathTraversal(_))
        ));
    }

    #[test]
    fn test_pack_prefixes_base_name_and_marks_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("runtime");
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin/tool"), b"#!/bin/sh\n").unwrap();
        fs::write(root.join("README"), b"readme").unwrap();

        let names = entry_names(&pack(&root).unwrap());
        assert_eq!(
            names,
            vec!["runtime/", "runtime/README", "runtime/bin/", "runtime/bin/tool"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_pack_rejects_symlink() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("target.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("target.txt"), root.join("link")).unwrap();

        let result = pack(&root);
        assert!(matches!(result, Err(ArchiveError::UnsupportedEntry(_))));
    }

    #[test]
    fn test_pack_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(pack(&file), Err(ArchiveError::InvalidRoot(_))));
    }

    #[test]
    fn test_unpack_rejects_parent_traversal() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a/b/dest");
        fs::create_dir_all(&dest).unwrap();

        let data = raw_archive("../../escaped.txt", EntryType::Regular, b"pwned");
        let result = unpack(&data, &dest);

        assert!(matches!(result, Err(ArchiveError::PathTraversal(_))));
        assert!(!temp.path().join("a/escaped.txt").exists());
    }

    #[test]
    fn test_unpack_rejects_absolute_path() {
        let temp = TempDir::new().unwrap();
        let outside = temp.path().join("outside.txt");
        let data = raw_archive(outside.to_str().unwrap(), EntryType::Regular, b"pwned");

        let dest = temp.path().join("dest");
        let result = unpack(&data, &dest);

        assert!(matches!(result, Err(ArchiveError::PathTraversal(_))));
        assert!(!outside.exists());
    }

    #[test]
    fn test_unpack_rejects_symlink_entry() {
        let temp = TempDir::new().unwrap();
        let data = raw_archive("root/link", EntryType::Symlink, b"");
        let result = unpack(&data, temp.path());
        assert!(matches!(result, Err(ArchiveError::UnsupportedEntry(_))));
        assert!(!temp.path().join("root/link").exists());
    }

    #[test]
    fn test_unpack_rejects_device_entry() {
        let temp = TempDir::new().unwrap();
        let data = raw_archive("root/dev", EntryType::Char, b"");
        assert!(matches!(
            unpack(&data, temp.path()),
            Err(ArchiveError::UnsupportedEntry(_))
        ));
    }

    #[test]
    fn test_unpack_garbage_is_decompression_error() {
        let temp = TempDir::new().unwrap();
        let result = unpack(b"definitely not gzip", temp.path());
        assert!(matches!(
            result,
            Err(ArchiveError::Decompress(_)) | Err(ArchiveError::Malformed(_))
        ));
    }

    #[test]
    fn test_unpack_overwrites_existing_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src/root");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("f.txt"), b"new").unwrap();
        let data = pack(&src).unwrap();

        let dest = temp.path().join("dest");
        fs::create_dir_all(dest.join("root")).unwrap();
        fs::write(dest.join("root/f.txt"), b"much longer old content").unwrap();

        unpack(&data, &dest).unwrap();
        assert_eq!(fs::read(dest.join("root/f.txt")).unwrap(), b"new");
    }
}
