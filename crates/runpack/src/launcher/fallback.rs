//! Loader fallback for runtimes whose interpreter cannot be exec'd directly
//!
//! Some hosts (noexec mounts, foreign libc, Android app sandboxes) refuse to
//! exec an extracted ELF binary, or its `PT_INTERP` points at a loader that
//! does not exist. Running the bundled loader with the binary as its first
//! argument works around both.

use std::ffi::OsString;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::platform::Platform;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";

/// Second attempt for a command that failed to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Extra environment for the retried child.
    pub env: Vec<(OsString, OsString)>,
    /// Variables cleared from the inherited and launcher environment
    /// before `env` is applied.
    pub env_remove: Vec<OsString>,
}

/// Decides whether a launch failure of `target` can be retried differently.
pub trait FallbackPolicy {
    fn fallback_for(&self, target: &Path, args: &[OsString]) -> Option<FallbackInvocation>;
}

/// Re-run ELF targets through a bundled dynamic loader.
#[derive(Debug, Clone, Default)]
pub struct ElfLoaderFallback {
    candidates: Vec<String>,
    search_dirs: Vec<PathBuf>,
    env: Vec<(OsString, OsString)>,
    env_remove: Vec<OsString>,
}

impl ElfLoaderFallback {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Policy for `platform`, or `None` when it bundles no loader.
    pub fn for_platform(platform: &Platform) -> Option<Self> {
        let candidates = platform.loader_candidates();
        if candidates.is_empty() {
            None
        } else {
            Some(Self::new(candidates.iter().copied()))
        }
    }

    /// Also look for the loader in `dir`.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Clear an inherited variable in the retried child.
    pub fn without_env(mut self, key: impl Into<OsString>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Loader next to `target`, in its sibling `lib`, or in an extra search dir.
    pub fn find_loader(&self, target: &Path) -> Option<PathBuf> {
        let mut dirs = Vec::new();
        if let Some(dir) = target.parent() {
            dirs.push(dir.to_path_buf());
            if let Some(prefix) = dir.parent() {
                dirs.push(prefix.join("lib"));
            }
        }
        dirs.extend(self.search_dirs.iter().cloned());

        dirs.iter()
            .flat_map(|dir| self.candidates.iter().map(move |name| dir.join(name)))
            .find(|path| path.is_file())
    }
}

impl FallbackPolicy for ElfLoaderFallback {
    fn fallback_for(&self, target: &Path, args: &[OsString]) -> Option<FallbackInvocation> {
        if !target.is_file() || !is_elf_binary(target) {
            debug!(path = %target.display(), "Not an ELF image, no loader fallback");
            return None;
        }
        let Some(loader) = self.find_loader(target) else {
            debug!(path = %target.display(), "No bundled loader found");
            return None;
        };

        let mut loader_args = Vec::with_capacity(args.len() + 1);
        loader_args.push(target.as_os_str().to_os_string());
        loader_args.extend(args.iter().cloned());
        Some(FallbackInvocation {
            program: loader,
            args: loader_args,
            env: self.env.clone(),
            env_remove: self.env_remove.clone(),
        })
    }
}

/// True when `path` starts with the ELF magic. Scripts (`#!`) never match.
pub fn is_elf_binary(path: &Path) -> bool {
    let mut magic = [0u8; 4];
    match File::open(path).and_then(|mut f| f.read_exact(&mut magic)) {
        Ok(()) => &magic == ELF_MAGIC,
        Err(_) => false,
    }
}
