//! `runpack run`: Run the embedded interpreter.

use anyhow::Context;
use runpack::{Config, ExecMode};
use std::path::Path;

use super::open_runtime;

pub fn execute(
    mut config: Config,
    runtime: Option<&Path>,
    keep: bool,
    install: &[String],
    args: &[String],
) -> anyhow::Result<i32> {
    if keep {
        config.keep_extracted_files = true;
    }
    let mut instance = open_runtime(config, runtime)?;
    if runtime.is_none() && instance.config().keep_extracted_files {
        eprintln!("Runtime kept at {}", instance.extraction_path().display());
    }

    for spec in install {
        instance
            .install(spec)
            .with_context(|| format!("Failed to install {}", spec))?;
    }

    match instance.exec(args, ExecMode::Stream) {
        Ok(_) => Ok(0),
        Err(e) => match e.exit_code() {
            Some(code) => Ok(code),
            None => Err(e.into()),
        },
    }
}
