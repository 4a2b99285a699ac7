//! `runpack install`: Install packages into an extracted runtime tree.

use anyhow::{bail, Context};
use runpack::Config;
use std::path::Path;

use super::open_runtime;

pub fn execute(config: Config, runtime: Option<&Path>, specs: &[String]) -> anyhow::Result<i32> {
    // A fresh extraction is deleted on exit, so installing into it is lost
    let Some(runtime) = runtime else {
        bail!(
            "install needs --runtime <DIR> (a tree from `runpack unseal` or `run --keep`); \
             use `run --install <SPEC>` to install for a single run"
        );
    };
    let mut instance = open_runtime(config, Some(runtime))?;

    for spec in specs {
        instance
            .install(spec)
            .with_context(|| format!("Failed to install {}", spec))?;
        println!("Installed {}", spec);
    }

    println!(
        "{} executables available in {}",
        instance.executables().len(),
        instance.descriptor().bin_dir().display()
    );
    Ok(0)
}
