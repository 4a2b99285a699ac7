//! Extracted runtime instances
//!
//! A [`RuntimeInstance`] owns one extracted runtime tree: it extracts the
//! archive (or sealed payload) into a fresh directory, bootstraps it, and
//! then runs commands, installs packages and keeps the executable catalog
//! current. The extraction directory is removed when the instance is dropped
//! unless `Config::keep_extracted_files` is set.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::archive;
use crate::bootstrap::{
    bootstrap_tree, ensure_installer, library_path_env, RewriteRule, RuntimeDescriptor,
};
use crate::config::Config;
use crate::embedded::EmbeddedArchives;
use crate::error::RuntimeError;
use crate::launcher::{
    install_package, CommandOutput, ElfLoaderFallback, ExecMode, ExecutableCatalog, LaunchError,
    PackageSpec, ProcessLauncher,
};
use crate::platform::Platform;
use crate::seal;

/// Environment variable pointing a loader-launched interpreter at its home.
const RUNTIME_HOME_VAR: &str = "PYTHONHOME";

/// Host variables that would inject host-libc code into a loader-launched child.
const LOADER_SCRUBBED_VARS: &[&str] = &["LD_PRELOAD", "LD_AUDIT"];

/// One extracted and bootstrapped runtime.
#[derive(Debug)]
pub struct RuntimeInstance {
    config: Config,
    platform: Platform,
    descriptor: RuntimeDescriptor,
    catalog: ExecutableCatalog,
    launcher: ProcessLauncher,
    /// Removes the extraction directory on drop; `None` when kept or borrowed.
    _extraction: Option<TempDir>,
}

impl RuntimeInstance {
    /// Extract the archive registered for the current platform.
    pub fn create(archives: &EmbeddedArchives, config: Config) -> Result<Self, RuntimeError> {
        Self::create_for(archives, &Platform::current(), config)
    }

    /// Extract the archive registered for `platform`.
    ///
    /// Unsupported platforms fail before anything is written to disk.
    pub fn create_for(
        archives: &EmbeddedArchives,
        platform: &Platform,
        config: Config,
    ) -> Result<Self, RuntimeError> {
        let archive = archives.select(platform)?;
        let (dir, root) = fresh_extraction_dir(&config)?;
        archive::unpack(archive.bytes(), &root)?;

        let build_prefix = archive
            .build_prefix()
            .or(config.build_prefix.as_deref())
            .map(Path::to_path_buf);
        let version = archive.version().map(str::to_string);
        Self::bootstrap(root, dir, platform.clone(), version.as_deref(), build_prefix.as_deref(), config)
    }

    /// Extract the payload sealed into the running executable.
    pub fn from_sealed_executable(config: Config) -> Result<Self, RuntimeError> {
        let exe = seal::current_exe_path()?;
        Self::from_sealed_binary(&exe, &Platform::current(), config)
    }

    /// Extract the payload sealed into `binary`.
    pub fn from_sealed_binary(
        binary: &Path,
        platform: &Platform,
        config: Config,
    ) -> Result<Self, RuntimeError> {
        platform.layout()?;
        let (dir, root) = fresh_extraction_dir(&config)?;
        if !seal::unseal_into(binary, &root)? {
            return Err(RuntimeError::NotSealed(binary.to_path_buf()));
        }
        let build_prefix = config.build_prefix.clone();
        Self::bootstrap(root, dir, platform.clone(), None, build_prefix.as_deref(), config)
    }

    /// Bootstrap a tree that is already on disk. The tree is never removed.
    pub fn from_tree(root: &Path, platform: &Platform, config: Config) -> Result<Self, RuntimeError> {
        let root = std::path::absolute(root)?;
        let build_prefix = config.build_prefix.clone();
        Self::bootstrap(root, None, platform.clone(), None, build_prefix.as_deref(), config)
    }

    fn bootstrap(
        root: PathBuf,
        extraction: Option<TempDir>,
        platform: Platform,
        version: Option<&str>,
        build_prefix: Option<&Path>,
        config: Config,
    ) -> Result<Self, RuntimeError> {
        let layout = platform.layout()?;
        let rule = build_prefix.map(|prefix| RewriteRule::new(prefix, layout.prefix_dir(&root)));
        let descriptor = bootstrap_tree(&root, layout, &platform, version, rule.as_ref())?;

        let mut launcher = ProcessLauncher::new().verbose(config.verbose);
        if let Some((var, value)) = library_path_env(&platform, descriptor.lib_dir())? {
            launcher = launcher.with_env(var, value);
        }
        if let Some(policy) = ElfLoaderFallback::for_platform(&platform) {
            let policy = LOADER_SCRUBBED_VARS
                .iter()
                .fold(policy, |policy, var| policy.without_env(*var))
                .with_search_dir(descriptor.lib_dir())
                .with_env(RUNTIME_HOME_VAR, descriptor.home());
            launcher = launcher.with_fallback(policy);
        }

        if config.ensure_installer {
            ensure_installer(&launcher, descriptor.interpreter())?;
        }

        let catalog = ExecutableCatalog::scan(descriptor.bin_dir())?;
        let instance = Self {
            config,
            platform,
            descriptor,
            catalog,
            launcher,
            _extraction: extraction,
        };
        instance.log_catalog();
        Ok(instance)
    }

    pub fn descriptor(&self) -> &RuntimeDescriptor {
        &self.descriptor
    }

    pub fn executables(&self) -> &ExecutableCatalog {
        &self.catalog
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn launcher(&self) -> &ProcessLauncher {
        &self.launcher
    }

    /// Directory the runtime was extracted into.
    pub fn extraction_path(&self) -> &Path {
        self.descriptor.root()
    }

    /// Run the interpreter with `args`.
    pub fn exec<S: AsRef<OsStr>>(
        &self,
        args: &[S],
        mode: ExecMode,
    ) -> Result<CommandOutput, RuntimeError> {
        Ok(self
            .launcher
            .execute(self.descriptor.interpreter(), args, mode)?)
    }

    /// Run a catalog entry by name.
    pub fn exec_executable<S: AsRef<OsStr>>(
        &self,
        name: &str,
        args: &[S],
        mode: ExecMode,
    ) -> Result<CommandOutput, RuntimeError> {
        let path = self
            .catalog
            .get(name)
            .ok_or_else(|| LaunchError::UnknownExecutable(name.to_string()))?;
        Ok(self.launcher.execute(path, args, mode)?)
    }

    /// Install a package and rebuild the catalog.
    ///
    /// Changes the process working directory for the duration of the
    /// install; do not run concurrently with code that depends on it.
    pub fn install(&mut self, spec: &str) -> Result<PackageSpec, RuntimeError> {
        let resolved = install_package(
            &self.launcher,
            self.descriptor.interpreter(),
            self.descriptor.root(),
            spec,
        )?;
        info!(spec = ?resolved, "Package installed, rescanning executables");
        self.rescan()?;
        Ok(resolved)
    }

    /// Rebuild the catalog from the bin directory.
    pub fn rescan(&mut self) -> Result<&ExecutableCatalog, RuntimeError> {
        self.catalog = ExecutableCatalog::scan(self.descriptor.bin_dir())?;
        self.log_catalog();
        Ok(&self.catalog)
    }

    fn log_catalog(&self) {
        if self.config.verbose {
            for (name, path) in self.catalog.iter() {
                info!(name, path = %path.display(), "Found executable");
            }
        } else {
            debug!(count = self.catalog.len(), "Executable catalog built");
        }
    }
}

/// Create a unique directory under the configured base.
///
/// The `TempDir` is returned only when the directory should be removed later.
fn fresh_extraction_dir(config: &Config) -> Result<(Option<TempDir>, PathBuf), RuntimeError> {
    fs::create_dir_all(&config.extraction_base)?;
    let base = std::path::absolute(&config.extraction_base)?;
    let dir = tempfile::Builder::new()
        .prefix("runpack-")
        .tempdir_in(&base)?;

    if config.keep_extracted_files {
        let root = dir.keep();
        info!(path = %root.display(), "Keeping extracted runtime");
        Ok((None, root))
    } else {
        let root = dir.path().to_path_buf();
        debug!(path = %root.display(), "Extracting runtime");
        Ok((Some(dir), root))
    }
}
