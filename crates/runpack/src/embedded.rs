//! Registry of runtime archives embedded by the host
//!
//! The host decides at build time which archive goes with which target and
//! registers it here, typically from `include_bytes!`:
//!
//! ```ignore
//! let mut archives = EmbeddedArchives::new();
//! archives.register(
//!     Platform::new("linux", "x86_64"),
//!     RuntimeArchive::from_static(include_bytes!("../runtimes/linux-x86_64.tar.gz"))
//!         .with_version("3.12")
//!         .with_build_prefix("/install"),
//! );
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::bootstrap::BootstrapError;
use crate::platform::Platform;

/// One gzip-compressed runtime tree for one target.
#[derive(Debug, Clone)]
pub struct RuntimeArchive {
    bytes: Cow<'static, [u8]>,
    version: Option<String>,
    build_prefix: Option<PathBuf>,
}

impl RuntimeArchive {
    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self {
            bytes: Cow::Borrowed(bytes),
            version: None,
            build_prefix: None,
        }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Cow::Owned(bytes),
            version: None,
            build_prefix: None,
        }
    }

    /// Interpreter version tag, e.g. `3.12`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Absolute prefix the runtime was built under.
    pub fn with_build_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.build_prefix = Some(prefix.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn build_prefix(&self) -> Option<&Path> {
        self.build_prefix.as_deref()
    }
}

/// Runtime archives keyed by target platform.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedArchives {
    archives: HashMap<Platform, RuntimeArchive>,
}

impl EmbeddedArchives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `archive` for `platform`, returning any archive it replaces.
    pub fn register(&mut self, platform: Platform, archive: RuntimeArchive) -> Option<RuntimeArchive> {
        self.archives.insert(platform, archive)
    }

    pub fn get(&self, platform: &Platform) -> Option<&RuntimeArchive> {
        self.archives.get(platform)
    }

    /// Archive for `platform`, failing with `UnsupportedPlatform` when the
    /// target has no known layout or nothing was registered for it.
    pub fn select(&self, platform: &Platform) -> Result<&RuntimeArchive, BootstrapError> {
        platform.layout()?;
        self.get(platform).ok_or_else(|| BootstrapError::UnsupportedPlatform {
            os: platform.os().to_string(),
            arch: platform.arch().to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }
}
