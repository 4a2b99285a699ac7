//! Host platform and runtime tree layouts
//!
//! Maps an OS/architecture pair to the shape of the runtime tree embedded for
//! it, the shared-library search variable it needs, and the dynamic loader
//! names that may be bundled next to the interpreter.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::bootstrap::BootstrapError;

/// Targets a runtime archive can be embedded for.
const SUPPORTED: &[(&str, &str)] = &[
    ("linux", "x86_64"),
    ("linux", "aarch64"),
    ("linux", "arm"),
    ("macos", "x86_64"),
    ("macos", "aarch64"),
    ("windows", "x86_64"),
    ("android", "aarch64"),
];

/// An OS/architecture pair in `std::env::consts` vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    os: String,
    arch: String,
}

/// Shape of an extracted runtime tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeLayout {
    /// `<root>/prefix/bin` + `<root>/prefix/lib`
    Prefix,
    /// `<root>/<name>/bin` + `<root>/<name>/lib`
    Named(&'static str),
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process runs on.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Registry key, e.g. `linux-x86_64`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.os, self.arch)
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED
            .iter()
            .any(|(os, arch)| *os == self.os && *arch == self.arch)
    }

    /// Runtime tree layout for this platform.
    ///
    /// Fails with `UnsupportedPlatform` for combinations no archive is built
    /// for, so callers can bail out before extracting anything.
    pub fn layout(&self) -> Result<RuntimeLayout, BootstrapError> {
        if !self.is_supported() {
            return Err(BootstrapError::UnsupportedPlatform {
                os: self.os.clone(),
                arch: self.arch.clone(),
            });
        }
        Ok(match self.os.as_str() {
            "android" => RuntimeLayout::Prefix,
            _ => RuntimeLayout::Named("python"),
        })
    }

    /// Environment variable the dynamic linker reads extra library
    /// directories from, on platforms that need it wired explicitly.
    pub fn library_path_var(&self) -> Option<&'static str> {
        match self.os.as_str() {
            "linux" | "android" => Some("LD_LIBRARY_PATH"),
            _ => None,
        }
    }

    /// File names of the dynamic loader a runtime may bundle.
    ///
    /// Empty when the platform has no loader fallback.
    pub fn loader_candidates(&self) -> &'static [&'static str] {
        match (self.os.as_str(), self.arch.as_str()) {
            ("linux", "x86_64") => &["ld-linux-x86-64.so.2"],
            ("linux", "aarch64") => &["ld-linux-aarch64.so.1"],
            ("linux", "arm") => &["ld-linux-armhf.so.3", "ld-linux.so.3"],
            ("android", "aarch64") => &["linker64"],
            _ => &[],
        }
    }

    /// Suffix appended to executable names.
    pub fn exe_suffix(&self) -> &'static str {
        if self.os == "windows" {
            ".exe"
        } else {
            ""
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl RuntimeLayout {
    /// Directory holding `bin` and `lib`.
    pub fn prefix_dir(&self, root: &Path) -> PathBuf {
        match self {
            RuntimeLayout::Prefix => root.join("prefix"),
            RuntimeLayout::Named(name) => root.join(name),
        }
    }

    pub fn bin_dir(&self, root: &Path) -> PathBuf {
        self.prefix_dir(root).join("bin")
    }

    pub fn lib_dir(&self, root: &Path) -> PathBuf {
        self.prefix_dir(root).join("lib")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_by_os() {
        assert_eq!(
            Platform::new("linux", "x86_64").layout().unwrap(),
            RuntimeLayout::Named("python")
        );
        assert_eq!(
            Platform::new("macos", "aarch64").layout().unwrap(),
            RuntimeLayout::Named("python")
        );
        assert_eq!(
            Platform::new("android", "aarch64").layout().unwrap(),
            RuntimeLayout::Prefix
        );
    }

    #[test]
    fn test_unsupported_platform() {
        let result = Platform::new("freebsd", "x86_64").layout();
        assert!(matches!(
            result,
            Err(BootstrapError::UnsupportedPlatform { ref os, ref arch }) if os == "freebsd" && arch == "x86_64"
        ));
        assert!(Platform::new("linux", "riscv64").layout().is_err());
    }

    #[test]
    fn test_layout_dirs() {
        let root = Path::new("/x");
        assert_eq!(
            RuntimeLayout::Named("python").bin_dir(root),
            PathBuf::from("/x/python/bin")
        );
        assert_eq!(
            RuntimeLayout::Prefix.lib_dir(root),
            PathBuf::from("/x/prefix/lib")
        );
    }

    #[test]
    fn test_library_path_var() {
        assert_eq!(
            Platform::new("linux", "aarch64").library_path_var(),
            Some("LD_LIBRARY_PATH")
        );
        assert_eq!(Platform::new("macos", "aarch64").library_path_var(), None);
        assert_eq!(Platform::new("windows", "x86_64").library_path_var(), None);
    }

    #[test]
    fn test_loader_candidates() {
        assert_eq!(
            Platform::new("linux", "x86_64").loader_candidates(),
            &["ld-linux-x86-64.so.2"]
        );
        assert!(Platform::new("macos", "aarch64").loader_candidates().is_empty());
    }

    #[test]
    fn test_key_and_display() {
        let platform = Platform::new("linux", "arm");
        assert_eq!(platform.key(), "linux-arm");
        assert_eq!(platform.to_string(), "linux-arm");
    }
}
