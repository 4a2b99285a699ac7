//! Interpreter lookup inside a runtime's bin directory

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::BootstrapError;
use crate::platform::Platform;

/// Candidate interpreter names, most specific first.
pub fn interpreter_candidates(version: Option<&str>, platform: &Platform) -> Vec<String> {
    let suffix = platform.exe_suffix();
    let mut names = Vec::with_capacity(3);
    if let Some(version) = version {
        names.push(format!("python{}{}", version, suffix));
    }
    names.push(format!("python3{}", suffix));
    names.push(format!("python{}", suffix));
    names.dedup();
    names
}

/// First candidate that exists in `bin_dir` and is not a directory.
pub fn resolve_interpreter(bin_dir: &Path, candidates: &[String]) -> Result<PathBuf, BootstrapError> {
    for name in candidates {
        let path = bin_dir.join(name);
        match fs::metadata(&path) {
            Ok(meta) if !meta.is_dir() => return Ok(path),
            _ => debug!(candidate = %path.display(), "Interpreter candidate not usable"),
        }
    }
    Err(BootstrapError::InterpreterNotFound {
        bin_dir: bin_dir.to_path_buf(),
        tried: candidates.to_vec(),
    })
}

/// Version tag from the first `python<major>.<minor>` file in `bin_dir`.
pub fn infer_version(bin_dir: &Path) -> Option<String> {
    let mut names: Vec<String> = fs::read_dir(bin_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names.iter().find_map(|name| parse_version(name))
}

fn parse_version(name: &str) -> Option<String> {
    let name = if name.to_ascii_lowercase().ends_with(".exe") {
        &name[..name.len() - 4]
    } else {
        name
    };
    let version = name.strip_prefix("python")?;
    let (major, minor) = version.split_once('.')?;
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if numeric(major) && numeric(minor) {
        Some(version.to_string())
    } else {
        None
    }
}
