//! Process launcher
//!
//! Runs commands against an extracted runtime. Two output modes:
//!
//! - `Capture`: stdout and stderr share one pipe, the combined bytes are
//!   returned to the caller
//! - `Stream`: the child's standard streams are the host's
//!
//! If a command never starts (a launch failure, as opposed to a nonzero
//! exit), an optional [`FallbackPolicy`] may supply a second invocation,
//! typically the bundled dynamic loader with the target prepended to argv.
//! At most one retry is made.

pub mod catalog;
pub mod failure;
pub mod fallback;
pub mod install;

pub use catalog::ExecutableCatalog;
pub use failure::FailureClass;
pub use fallback::{is_elf_binary, ElfLoaderFallback, FallbackInvocation, FallbackPolicy};
pub use install::{install_package, PackageSpec, WorkingDirGuard};

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while running a command
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The process never started
    #[error("Failed to launch {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The process ran and exited unsuccessfully
    #[error("{command} exited with {status}")]
    Exit {
        command: String,
        status: ExitStatus,
        output: Vec<u8>,
    },

    #[error("Unknown executable: {0}")]
    UnknownExecutable(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a child's output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Collect combined stdout/stderr
    Capture,
    /// Connect the child to the host's streams
    Stream,
}

/// Result of a successful command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// Combined output; empty in `Stream` mode.
    pub output: Vec<u8>,
}

impl CommandOutput {
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Runs child processes with a fixed extra environment.
#[derive(Default)]
pub struct ProcessLauncher {
    env: Vec<(OsString, OsString)>,
    fallback: Option<Box<dyn FallbackPolicy>>,
    verbose: bool,
}

impl fmt::Debug for ProcessLauncher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessLauncher")
            .field("env", &self.env)
            .field("fallback", &self.fallback.is_some())
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable in every child's environment.
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_fallback(mut self, policy: impl FallbackPolicy + 'static) -> Self {
        self.fallback = Some(Box::new(policy));
        self
    }

    /// Log captured output at `info`.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Run `command` with `args` in the current working directory.
    ///
    /// Exit failures are returned as-is. Launch failures go through the
    /// fallback policy once, if one is registered and it recognises the
    /// target.
    pub fn execute<S: AsRef<OsStr>>(
        &self,
        command: &Path,
        args: &[S],
        mode: ExecMode,
    ) -> Result<CommandOutput, LaunchError> {
        let args: Vec<OsString> = args.iter().map(|a| a.as_ref().to_os_string()).collect();

        match self.run_once(command.as_os_str(), &args, &[], &[], mode) {
            Err(err) if err.class() == Some(FailureClass::Launch) => {
                let Some(invocation) = self
                    .fallback
                    .as_ref()
                    .and_then(|policy| policy.fallback_for(command, &args))
                else {
                    return Err(err);
                };
                info!(
                    path = %command.display(),
                    loader = %invocation.program.display(),
                    error = %err,
                    "Direct launch failed, retrying through loader"
                );
                self.run_once(
                    invocation.program.as_os_str(),
                    &invocation.args,
                    &invocation.env,
                    &invocation.env_remove,
                    mode,
                )
            }
            other => other,
        }
    }

    fn run_once(
        &self,
        program: &OsStr,
        args: &[OsString],
        extra_env: &[(OsString, OsString)],
        env_remove: &[OsString],
        mode: ExecMode,
    ) -> Result<CommandOutput, LaunchError> {
        let name = program.to_string_lossy().into_owned();
        debug!(command = %name, ?args, ?mode, "Running command");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(std::env::current_dir()?)
            .envs(self.env.iter().map(|(k, v)| (k, v)));
        for key in env_remove {
            cmd.env_remove(key);
        }
        cmd.envs(extra_env.iter().map(|(k, v)| (k, v)));

        let launch_error = |source: io::Error| LaunchError::Launch {
            command: name.clone(),
            source,
        };

        let (status, output) = match mode {
            ExecMode::Capture => {
                let (mut reader, writer) = io::pipe()?;
                cmd.stdin(Stdio::null())
                    .stdout(writer.try_clone()?)
                    .stderr(writer);
                let mut child = cmd.spawn().map_err(launch_error)?;
                // The command still holds write ends of the pipe
                drop(cmd);
                let output = drain_output(&mut child, &mut reader)?;
                (child.wait()?, output)
            }
            ExecMode::Stream => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
                let status = cmd.spawn().map_err(launch_error)?.wait()?;
                (status, Vec::new())
            }
        };

        if self.verbose && !output.is_empty() {
            info!(command = %name, output = %String::from_utf8_lossy(&output), "Command output");
        }

        if !status.success() {
            return Err(LaunchError::Exit {
                command: name,
                status,
                output,
            });
        }
        Ok(CommandOutput { status, output })
    }
}

/// Read `reader` to EOF. On a read error the child is killed and reaped
/// before the error is returned.
fn drain_output(child: &mut Child, reader: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut output = Vec::new();
    if let Err(e) = reader.read_to_end(&mut output) {
        let _ = child.kill();
        let _ = child.wait();
        return Err(e);
    }
    Ok(output)
}
