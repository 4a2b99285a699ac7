//! Package installation through the runtime's bundled installer

use std::env;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{ExecMode, LaunchError, ProcessLauncher};

/// Suffixes that mark a spec as a local archive or wheel.
const LOCAL_SUFFIXES: &[&str] = &[".whl", ".tar.gz", ".tgz", ".zip", ".tar.bz2"];

/// What to hand to the installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSpec {
    /// Opaque requirement, passed through unchanged (`requests==2.31`, URLs)
    Named(String),
    /// Local file or directory, resolved to an absolute path
    Local(PathBuf),
}

impl PackageSpec {
    /// Classify `spec`, resolving local references against `base`.
    pub fn parse(spec: &str, base: &Path) -> Self {
        if !Self::is_local_reference(spec) {
            return PackageSpec::Named(spec.to_string());
        }
        let path = Path::new(spec);
        if path.is_absolute() {
            PackageSpec::Local(path.to_path_buf())
        } else {
            PackageSpec::Local(base.join(path))
        }
    }

    /// Whether `spec` names something on the local filesystem.
    pub fn is_local_reference(spec: &str) -> bool {
        if spec.is_empty() || spec.contains("://") {
            return false;
        }
        if Path::new(spec).is_absolute() || spec.starts_with('.') {
            return true;
        }
        if spec.contains('/') || spec.contains(std::path::MAIN_SEPARATOR) {
            return true;
        }
        let lower = spec.to_ascii_lowercase();
        LOCAL_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
    }

    pub fn as_os_str(&self) -> &OsStr {
        match self {
            PackageSpec::Named(name) => OsStr::new(name),
            PackageSpec::Local(path) => path.as_os_str(),
        }
    }
}

/// Changes the process working directory and restores it on drop.
#[derive(Debug)]
pub struct WorkingDirGuard {
    original: PathBuf,
}

impl WorkingDirGuard {
    pub fn change_to(dir: &Path) -> io::Result<Self> {
        let original = env::current_dir()?;
        env::set_current_dir(dir)?;
        Ok(Self { original })
    }

    pub fn original(&self) -> &Path {
        &self.original
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.original) {
            warn!(dir = %self.original.display(), error = %e, "Cannot restore working directory");
        }
    }
}

/// Run `<interpreter> -m pip install <spec>` from inside `runtime_dir`.
///
/// Local specs are resolved against the caller's working directory before it
/// changes. The working directory is restored whether or not the install
/// succeeds. `interpreter` must be absolute.
pub fn install_package(
    launcher: &ProcessLauncher,
    interpreter: &Path,
    runtime_dir: &Path,
    spec: &str,
) -> Result<PackageSpec, LaunchError> {
    let resolved = PackageSpec::parse(spec, &env::current_dir()?);
    info!(spec = ?resolved, "Installing package");

    let _guard = WorkingDirGuard::change_to(runtime_dir)?;
    let args = [
        OsStr::new("-m"),
        OsStr::new("pip"),
        OsStr::new("install"),
        resolved.as_os_str(),
    ];
    launcher.execute(interpreter, &args, ExecMode::Stream)?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_specs() {
        let base = Path::new("/work");
        for spec in ["requests", "numpy==1.26", "https://example.com/pkg.whl", "git+https://h/r.git"] {
            assert_eq!(
                PackageSpec::parse(spec, base),
                PackageSpec::Named(spec.to_string()),
                "{}",
                spec
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_local_specs() {
        let base = Path::new("/work");
        assert_eq!(
            PackageSpec::parse("./pkg", base),
            PackageSpec::Local(PathBuf::from("/work/./pkg"))
        );
        assert_eq!(
            PackageSpec::parse("../other", base),
            PackageSpec::Local(PathBuf::from("/work/../other"))
        );
        assert_eq!(
            PackageSpec::parse("dist/pkg-1.0.tar.gz", base),
            PackageSpec::Local(PathBuf::from("/work/dist/pkg-1.0.tar.gz"))
        );
        assert_eq!(
            PackageSpec::parse("pkg-1.0-py3-none-any.WHL", base),
            PackageSpec::Local(PathBuf::from("/work/pkg-1.0-py3-none-any.WHL"))
        );
        assert_eq!(
            PackageSpec::parse("/abs/pkg.zip", base),
            PackageSpec::Local(PathBuf::from("/abs/pkg.zip"))
        );
    }

    #[test]
    fn test_empty_spec_is_named() {
        assert!(!PackageSpec::is_local_reference(""));
    }
}
