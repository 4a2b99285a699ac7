//! Runtime bootstrap
//!
//! Turns a freshly extracted directory tree into a runnable interpreter
//! reference:
//!
//! 1. Pick the tree layout for the target platform
//! 2. Add execute bits to everything under the bin directory
//! 3. Rewrite the build-time prefix baked into scripts
//! 4. Resolve the interpreter from an ordered candidate list
//!
//! Library path wiring and installer availability are separate steps
//! ([`libpath`], [`installer`]) because they need the launcher.

pub mod installer;
pub mod interpreter;
pub mod libpath;
pub mod permissions;
pub mod rewrite;

pub use installer::ensure_installer;
pub use interpreter::{infer_version, interpreter_candidates, resolve_interpreter};
pub use libpath::{library_path_env, prepend_search_path};
pub use permissions::make_executable;
pub use rewrite::{is_native_image, RewriteRule};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::platform::{Platform, RuntimeLayout};

/// Errors that can occur while preparing an extracted runtime
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("No runtime is available for {os}-{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Runtime tree has no {} directory", .0.display())]
    MissingRuntimeDir(PathBuf),

    #[error("No interpreter found in {bin_dir} (tried: {})", tried.join(", "))]
    InterpreterNotFound { bin_dir: PathBuf, tried: Vec<String> },

    #[error("Package installer is unavailable: {0}")]
    InstallerBootstrapFailed(String),

    #[error("Cannot add {0} to the library search path")]
    InvalidSearchPath(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Resolved locations inside one extracted runtime tree.
///
/// Built once per extraction and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDescriptor {
    root: PathBuf,
    bin_dir: PathBuf,
    lib_dir: PathBuf,
    interpreter: PathBuf,
    version: Option<String>,
}

impl RuntimeDescriptor {
    /// Extraction root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Version tag such as `3.12`, when known or inferable.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Directory holding `bin` and `lib`; the interpreter's home.
    pub fn home(&self) -> &Path {
        self.bin_dir.parent().unwrap_or(&self.root)
    }
}

/// Prepare the tree extracted at `root` and resolve its interpreter.
///
/// Per-file permission and rewrite failures are logged and skipped; only an
/// unreadable bin directory or a missing interpreter aborts the bootstrap.
pub fn bootstrap_tree(
    root: &Path,
    layout: RuntimeLayout,
    platform: &Platform,
    version: Option<&str>,
    rewrite: Option<&RewriteRule>,
) -> Result<RuntimeDescriptor, BootstrapError> {
    let prefix = layout.prefix_dir(root);
    if !prefix.is_dir() {
        return Err(BootstrapError::MissingRuntimeDir(prefix));
    }
    let bin_dir = layout.bin_dir(root);
    let lib_dir = layout.lib_dir(root);
    debug!(root = %root.display(), bin = %bin_dir.display(), "Bootstrapping runtime tree");

    let repaired = make_executable(&bin_dir)?;
    let rewritten = match rewrite {
        Some(rule) => rule.apply_to_dir(&bin_dir)?,
        None => 0,
    };

    let version = match version {
        Some(v) => Some(v.to_string()),
        None => infer_version(&bin_dir),
    };
    let candidates = interpreter_candidates(version.as_deref(), platform);
    let interpreter = resolve_interpreter(&bin_dir, &candidates)?;

    info!(
        interpreter = %interpreter.display(),
        version = version.as_deref().unwrap_or("unknown"),
        repaired,
        rewritten,
        "Runtime bootstrapped"
    );

    Ok(RuntimeDescriptor {
        root: root.to_path_buf(),
        bin_dir,
        lib_dir,
        interpreter,
        version,
    })
}

/// Every regular file below `dir`, in sorted order.
pub(crate) fn walk_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = fs::read_dir(&current)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        for path in entries {
            let file_type = fs::symlink_metadata(&path)?.file_type();
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_tree(root: &Path) {
        let bin = root.join("python/bin");
        fs::create_dir_all(&bin).unwrap();
        fs::create_dir_all(root.join("python/lib")).unwrap();
        fs::write(bin.join("python3.11"), b"\x7fELF-not-really").unwrap();
        fs::write(bin.join("pip3"), b"#!/build/python/bin/python3.11\n").unwrap();
    }

    #[test]
    fn test_walk_files_recurses_sorted() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("b/c")).unwrap();
        fs::write(temp.path().join("b/c/z"), b"").unwrap();
        fs::write(temp.path().join("a"), b"").unwrap();

        let files = walk_files(temp.path()).unwrap();
        assert_eq!(files, vec![temp.path().join("a"), temp.path().join("b/c/z")]);
    }

    #[test]
    fn test_bootstrap_tree_infers_version() {
        let temp = TempDir::new().unwrap();
        fake_tree(temp.path());

        let platform = Platform::new("linux", "x86_64");
        let rule = RewriteRule::new("/build", temp.path());
        let descriptor = bootstrap_tree(
            temp.path(),
            RuntimeLayout::Named("python"),
            &platform,
            None,
            Some(&rule),
        )
        .unwrap();

        assert_eq!(descriptor.version(), Some("3.11"));
        assert_eq!(descriptor.interpreter(), temp.path().join("python/bin/python3.11"));
        assert_eq!(descriptor.lib_dir(), temp.path().join("python/lib"));
        assert_eq!(descriptor.home(), temp.path().join("python"));

        let pip = fs::read_to_string(temp.path().join("python/bin/pip3")).unwrap();
        assert_eq!(
            pip,
            format!("#!{}/python/bin/python3.11\n", temp.path().display())
        );
        // native image left alone
        assert_eq!(
            fs::read(temp.path().join("python/bin/python3.11")).unwrap(),
            b"\x7fELF-not-really"
        );
    }

    #[test]
    fn test_bootstrap_tree_missing_interpreter() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("prefix/bin")).unwrap();
        fs::write(temp.path().join("prefix/bin/pip"), b"").unwrap();

        let result = bootstrap_tree(
            temp.path(),
            RuntimeLayout::Prefix,
            &Platform::new("android", "aarch64"),
            Some("3.12"),
            None,
        );
        match result {
            Err(BootstrapError::InterpreterNotFound { tried, .. }) => {
                assert_eq!(tried, vec!["python3.12", "python3", "python"]);
            }
            other => panic!("expected InterpreterNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_bootstrap_tree_missing_bin_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("python")).unwrap();
        let result = bootstrap_tree(
            temp.path(),
            RuntimeLayout::Named("python"),
            &Platform::new("linux", "x86_64"),
            None,
            None,
        );
        assert!(matches!(result, Err(BootstrapError::Io(_))));
    }

    #[test]
    fn test_bootstrap_tree_wrong_top_level_dir() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("runtime/bin")).unwrap();
        fs::write(temp.path().join("runtime/bin/python3"), b"").unwrap();

        let result = bootstrap_tree(
            temp.path(),
            RuntimeLayout::Named("python"),
            &Platform::new("linux", "x86_64"),
            None,
            None,
        );
        match result {
            Err(BootstrapError::MissingRuntimeDir(dir)) => {
                assert_eq!(dir, temp.path().join("python"))
            }
            other => panic!("expected MissingRuntimeDir, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        fake_tree(temp.path());
        let bin = temp.path().join("python/bin");
        fs::write(bin.join("easy_install"), b"#!/build/python/bin/python3.11\n").unwrap();
        let locked = bin.join("locked");
        fs::write(&locked, b"#!/build/python/bin/python3.11\n").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&locked).is_ok() {
            // privileged user, nothing is unreadable
            return;
        }

        let rule = RewriteRule::new("/build", temp.path());
        let descriptor = bootstrap_tree(
            temp.path(),
            RuntimeLayout::Named("python"),
            &Platform::new("linux", "x86_64"),
            None,
            Some(&rule),
        )
        .unwrap();
        assert_eq!(descriptor.interpreter(), bin.join("python3.11"));

        let expected = format!("#!{}/python/bin/python3.11\n", temp.path().display());
        for name in ["easy_install", "pip3"] {
            assert_eq!(fs::read_to_string(bin.join(name)).unwrap(), expected);
        }
        let mode = fs::metadata(&locked).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o111);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(
            fs::read(&locked).unwrap(),
            b"#!/build/python/bin/python3.11\n"
        );
    }
}
