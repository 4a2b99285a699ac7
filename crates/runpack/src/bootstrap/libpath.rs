//! Shared-library search path wiring
//!
//! The new value is computed from the current one and handed to each child
//! process; the host process environment is left alone.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::Path;

use super::BootstrapError;
use crate::platform::Platform;

/// Put `dir` in front of a search-path value unless it is already listed.
pub fn prepend_search_path(current: Option<&OsStr>, dir: &Path) -> Result<OsString, BootstrapError> {
    let existing: Vec<_> = current
        .map(|value| env::split_paths(value).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default();

    if existing.iter().any(|p| p == dir) {
        if let Some(value) = current {
            return Ok(value.to_os_string());
        }
    }

    let paths = std::iter::once(dir.to_path_buf()).chain(existing);
    env::join_paths(paths).map_err(|_| BootstrapError::InvalidSearchPath(dir.to_path_buf()))
}

/// Variable and value a child needs to find the runtime's shared libraries.
///
/// `None` on platforms whose loader finds them without help.
pub fn library_path_env(
    platform: &Platform,
    lib_dir: &Path,
) -> Result<Option<(&'static str, OsString)>, BootstrapError> {
    let Some(var) = platform.library_path_var() else {
        return Ok(None);
    };
    let current = env::var_os(var);
    let value = prepend_search_path(current.as_deref(), lib_dir)?;
    Ok(Some((var, value)))
}
