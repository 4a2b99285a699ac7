//! Execute-bit repair for extracted runtimes

use std::path::Path;
#[cfg(unix)]
use tracing::warn;

use super::{walk_files, BootstrapError};

/// Add `0o111` to every regular file under `dir`, keeping existing bits.
///
/// Returns how many files were updated. Files that cannot be updated are
/// logged and skipped. On non-Unix hosts this only checks that `dir` exists.
pub fn make_executable(dir: &Path) -> Result<usize, BootstrapError> {
    let files = walk_files(dir)?;

    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let mut updated = 0;
        for path in files {
            let result = fs::metadata(&path).and_then(|meta| {
                let mode = meta.permissions().mode();
                if mode & 0o111 == 0o111 {
                    return Ok(false);
                }
                fs::set_permissions(&path, fs::Permissions::from_mode(mode | 0o111))?;
                Ok(true)
            });
            match result {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Cannot mark file executable"),
            }
        }
        Ok(updated)
    }

    #[cfg(not(unix))]
    {
        let _ = files;
        Ok(0)
    }
}
