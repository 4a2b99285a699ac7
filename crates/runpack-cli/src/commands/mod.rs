//! Subcommand implementations.
//!
//! Each command returns the process exit code.

pub mod install;
pub mod list;
pub mod run;
pub mod seal;
pub mod unseal;

use anyhow::Context;
use runpack::{Config, Platform, RuntimeInstance};
use std::path::Path;

const VERBOSE_VAR: &str = "RUNPACK_VERBOSE";
const KEEP_EXTRACTED_VAR: &str = "RUNPACK_KEEP_EXTRACTED";

/// Config file (if any), then environment toggles, then flags.
pub fn load_config(path: Option<&Path>, verbose: bool) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if env_flag(VERBOSE_VAR) {
        config.verbose = true;
    }
    if env_flag(KEEP_EXTRACTED_VAR) {
        config.keep_extracted_files = true;
    }
    if verbose {
        config.verbose = true;
    }
    Ok(config)
}

/// Bootstrap the tree at `runtime`, or extract the payload sealed into this
/// executable when no tree is given.
pub fn open_runtime(config: Config, runtime: Option<&Path>) -> anyhow::Result<RuntimeInstance> {
    match runtime {
        Some(root) => RuntimeInstance::from_tree(root, &Platform::current(), config)
            .with_context(|| format!("Failed to prepare runtime at {}", root.display())),
        None => RuntimeInstance::from_sealed_executable(config)
            .context("Failed to prepare embedded runtime"),
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|value| !value.is_empty())
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Installs change the process working directory.
    static CWD_LOCK: Mutex<()> = Mutex::new(());

    /// Answers the installer probe and leaves a `<name>-tool` per install.
    const FAKE_PYTHON: &str = r#"#!/bin/sh
here=$(dirname "$0")
if [ "$1" = "-m" ] && [ "$2" = "pip" ]; then
    case "$3" in
        --version) echo "pip 24.0"; exit 0 ;;
        install) touch "$here/$(basename "$4")-tool"; exit 0 ;;
    esac
fi
exit 0
"#;

    fn runtime_tree(root: &Path) {
        fs::create_dir_all(root.join("python/bin")).unwrap();
        fs::create_dir_all(root.join("python/lib")).unwrap();
        fs::write(root.join("python/bin/python3.12"), FAKE_PYTHON).unwrap();
    }

    #[test]
    fn test_install_persists_in_runtime_tree() {
        let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp = TempDir::new().unwrap();
        runtime_tree(temp.path());

        let code =
            install::execute(Config::default(), Some(temp.path()), &["requests".to_string()])
                .unwrap();
        assert_eq!(code, 0);

        let reopened = open_runtime(Config::default(), Some(temp.path())).unwrap();
        assert!(reopened.executables().contains("requests-tool"));
    }

    #[test]
    fn test_run_installs_before_executing() {
        let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let temp = TempDir::new().unwrap();
        runtime_tree(temp.path());

        let code = run::execute(
            Config::default(),
            Some(temp.path()),
            false,
            &["black".to_string()],
            &["-c".to_string(), "pass".to_string()],
        )
        .unwrap();
        assert_eq!(code, 0);
        assert!(temp.path().join("python/bin/black-tool").is_file());
    }

    #[test]
    fn test_install_without_runtime_is_refused() {
        let err = install::execute(Config::default(), None, &["requests".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("--runtime"));
    }
}
