//! `runpack list`: Show executables provided by the embedded runtime.

use runpack::Config;
use std::path::Path;

use super::open_runtime;

pub fn execute(config: Config, runtime: Option<&Path>) -> anyhow::Result<i32> {
    let instance = open_runtime(config, runtime)?;
    let descriptor = instance.descriptor();

    println!(
        "Interpreter: {} ({})",
        descriptor.interpreter().display(),
        descriptor.version().unwrap_or("unknown version")
    );
    for (name, path) in instance.executables().iter() {
        println!("  {:<24} {}", name, path.display());
    }
    Ok(0)
}
