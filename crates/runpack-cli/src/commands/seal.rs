//! `runpack seal`: Embed a directory into a copy of an executable.

use anyhow::Context;
use runpack::{seal, Platform};
use std::path::Path;

pub fn execute(dir: &Path, binary: Option<&Path>) -> anyhow::Result<i32> {
    if let Ok(layout) = Platform::current().layout() {
        let expected = layout.prefix_dir(Path::new(""));
        if dir.file_name() != expected.file_name() {
            eprintln!(
                "Warning: {} is not named {}; the runtime will not be found after extraction",
                dir.display(),
                expected.display()
            );
        }
    }

    let sealed = match binary {
        Some(binary) => seal::seal_directory(binary, dir),
        None => seal::seal_directory_into_current_exe(dir),
    }
    .with_context(|| format!("Failed to seal {}", dir.display()))?;

    println!("Sealed binary written to {}", sealed.display());
    Ok(0)
}
