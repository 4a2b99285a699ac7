//! Runpack command-line tool
//!
//! Seals a runtime tree into this executable, extracts it again, and runs
//! the embedded interpreter.

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "runpack")]
#[command(about = "Seal and run an embedded language runtime", long_about = None)]
#[command(version)]
struct Cli {
    /// Log progress and child output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Load settings from a TOML file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use an already extracted runtime tree instead of this executable's payload
    #[arg(long, global = true, value_name = "DIR")]
    runtime: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a runtime directory into a copy of an executable
    Seal {
        /// Directory to embed
        dir: PathBuf,
        /// Executable to copy (defaults to this one)
        #[arg(long, value_name = "PATH")]
        binary: Option<PathBuf>,
    },

    /// Extract this executable's payload next to it
    Unseal,

    /// Run the embedded interpreter
    Run {
        /// Keep the extracted runtime after exit
        #[arg(long)]
        keep: bool,
        /// Install a package before running (repeatable)
        #[arg(long = "install", value_name = "SPEC")]
        install: Vec<String>,
        /// Arguments passed to the interpreter
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Install packages into the runtime given by --runtime
    Install {
        /// Package names, requirement strings or local paths
        #[arg(required = true)]
        specs: Vec<String>,
    },

    /// List executables provided by the embedded runtime
    List,
}

fn main() {
    let cli = Cli::parse();

    let config = match commands::load_config(cli.config.as_deref(), cli.verbose) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    logging::init(config.verbose);

    let runtime = cli.runtime.as_deref();
    let result = match cli.command {
        Commands::Seal { dir, binary } => commands::seal::execute(&dir, binary.as_deref()),
        Commands::Unseal => commands::unseal::execute(),
        Commands::Run {
            keep,
            install,
            args,
        } => commands::run::execute(config, runtime, keep, &install, &args),
        Commands::Install { specs } => commands::install::execute(config, runtime, &specs),
        Commands::List => commands::list::execute(config, runtime),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
