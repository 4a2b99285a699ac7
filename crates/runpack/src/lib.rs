//! Runpack
//!
//! Embeds a relocatable language runtime in a host program and launches it
//! without a system-wide installation.
//!
//! - [`archive`]: tar.gz codec with path containment checks
//! - [`seal`]: append, detect and extract a payload on an executable
//! - [`bootstrap`]: prepare an extracted tree and resolve its interpreter
//! - [`launcher`]: run commands, loader fallback, package installs
//! - [`instance`]: one extracted runtime tying the above together

pub mod archive;
pub mod bootstrap;
pub mod config;
pub mod embedded;
pub mod error;
pub mod instance;
pub mod launcher;
pub mod platform;
pub mod seal;

pub use archive::{pack, unpack, ArchiveError};
pub use bootstrap::{BootstrapError, RewriteRule, RuntimeDescriptor};
pub use config::{Config, ConfigError};
pub use embedded::{EmbeddedArchives, RuntimeArchive};
pub use error::RuntimeError;
pub use instance::RuntimeInstance;
pub use launcher::{
    CommandOutput, ExecMode, ExecutableCatalog, FailureClass, LaunchError, PackageSpec,
    ProcessLauncher,
};
pub use platform::{Platform, RuntimeLayout};
pub use seal::{SealError, SealInfo};
