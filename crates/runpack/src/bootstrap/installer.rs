//! Package installer availability

use std::path::Path;
use tracing::{info, warn};

use super::BootstrapError;
use crate::launcher::{ExecMode, LaunchError, ProcessLauncher};

/// Make sure `interpreter -m pip` works, bootstrapping it with `ensurepip`
/// when it does not.
pub fn ensure_installer(launcher: &ProcessLauncher, interpreter: &Path) -> Result<(), BootstrapError> {
    if probe(launcher, interpreter).is_ok() {
        return Ok(());
    }

    info!(interpreter = %interpreter.display(), "Bootstrapping package installer");
    if let Err(e) = launcher.execute(interpreter, &["-m", "ensurepip", "--upgrade"], ExecMode::Capture) {
        warn!(error = %e, "ensurepip failed");
    }

    probe(launcher, interpreter).map_err(|e| match e {
        LaunchError::Exit { output, .. } => BootstrapError::InstallerBootstrapFailed(
            String::from_utf8_lossy(&output).trim().to_string(),
        ),
        other => BootstrapError::InstallerBootstrapFailed(other.to_string()),
    })
}

fn probe(launcher: &ProcessLauncher, interpreter: &Path) -> Result<(), LaunchError> {
    launcher
        .execute(interpreter, &["-m", "pip", "--version"], ExecMode::Capture)
        .map(|_| ())
}
