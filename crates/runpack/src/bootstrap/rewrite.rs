//! Build-prefix rewriting
//!
//! A runtime built under `/install` carries that path in its scripts
//! (`#!/install/bin/python3.12`, generated entry points, config files).
//! After extraction every occurrence is replaced with the new root.
//! Native executable images are never touched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{walk_files, BootstrapError};

/// Replace every occurrence of one absolute path with another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    search: PathBuf,
    replacement: PathBuf,
}

impl RewriteRule {
    pub fn new(search: impl Into<PathBuf>, replacement: impl Into<PathBuf>) -> Self {
        Self {
            search: search.into(),
            replacement: replacement.into(),
        }
    }

    pub fn search(&self) -> &Path {
        &self.search
    }

    pub fn replacement(&self) -> &Path {
        &self.replacement
    }

    /// Rewritten copy of `content`, or `None` when nothing matched.
    pub fn apply(&self, content: &[u8]) -> Option<Vec<u8>> {
        let needle = self.search.as_os_str().as_encoded_bytes();
        let replacement = self.replacement.as_os_str().as_encoded_bytes();
        if needle.is_empty() || needle == replacement || content.len() < needle.len() {
            return None;
        }

        let mut out = Vec::with_capacity(content.len());
        let mut last = 0;
        let mut i = 0;
        while i + needle.len() <= content.len() {
            if &content[i..i + needle.len()] == needle {
                out.extend_from_slice(&content[last..i]);
                out.extend_from_slice(replacement);
                i += needle.len();
                last = i;
            } else {
                i += 1;
            }
        }
        if last == 0 {
            return None;
        }
        out.extend_from_slice(&content[last..]);
        Some(out)
    }

    /// Rewrite one file in place. Returns whether the file changed.
    pub fn apply_to_file(&self, path: &Path) -> io::Result<bool> {
        let content = fs::read(path)?;
        if is_native_image(&content) {
            return Ok(false);
        }
        match self.apply(&content) {
            Some(rewritten) => {
                fs::write(path, rewritten)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Rewrite every file under `dir`, logging and skipping failures.
    pub fn apply_to_dir(&self, dir: &Path) -> Result<usize, BootstrapError> {
        let mut rewritten = 0;
        for path in walk_files(dir)? {
            match self.apply_to_file(&path) {
                Ok(true) => {
                    debug!(path = %path.display(), "Rewrote build prefix");
                    rewritten += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Cannot rewrite file"),
            }
        }
        Ok(rewritten)
    }
}

/// True for ELF, Mach-O (thin or fat) and PE images.
pub fn is_native_image(content: &[u8]) -> bool {
    const MAGICS: &[&[u8]] = &[
        b"\x7fELF",
        &[0xfe, 0xed, 0xfa, 0xce],
        &[0xfe, 0xed, 0xfa, 0xcf],
        &[0xce, 0xfa, 0xed, 0xfe],
        &[0xcf, 0xfa, 0xed, 0xfe],
        &[0xca, 0xfe, 0xba, 0xbe],
        &[0xbe, 0xba, 0xfe, 0xca],
        b"MZ",
    ];
    MAGICS.iter().any(|magic| content.starts_with(magic))
}
