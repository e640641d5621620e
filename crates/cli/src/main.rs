//! Rung CLI
//!
//! Command-line interface for checking, simulating, and ladder-rendering
//! IEC 61131-3 Structured Text files.
//!
//! Exit codes: 0 ok, 1 fatal (I/O, bad arguments, scan abort),
//! 2 diagnostics with errors.

mod commands;
mod watch;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use std::io;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "rung")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Structured Text simulator and ladder-diagram tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a .st file and report diagnostics
    Check {
        /// Input .st source file
        input: PathBuf,

        /// Emit diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the scan-cycle simulator and print the resulting store
    Run {
        /// Input .st source file
        input: PathBuf,

        /// Number of scan cycles to execute
        #[arg(short, long, default_value_t = 1)]
        scans: u64,

        /// Scan time in milliseconds (overrides rung.toml)
        #[arg(long)]
        scan_time: Option<u64>,

        /// Pre-scan variable overrides, e.g. --var Start=TRUE --var PV=3
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Treat runtime faults as errors
        #[arg(long)]
        strict: bool,

        /// Emit the final store snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transform a .st file into a ladder diagram graph
    Ladder {
        /// Input .st source file
        input: PathBuf,

        /// Write the graph JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Include the parsed AST in the output
        #[arg(long)]
        intermediates: bool,
    },

    /// Re-run check (and optionally the ladder transform) on change
    Watch {
        /// Input .st source file
        input: PathBuf,

        /// Also re-run the ladder transform on each change
        #[arg(long)]
        ladder: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Check { input, json } => commands::check(&input, json),
        Commands::Run {
            input,
            scans,
            scan_time,
            vars,
            strict,
            json,
        } => commands::run(&input, scans, scan_time, &vars, strict, json),
        Commands::Ladder {
            input,
            output,
            intermediates,
        } => commands::ladder(&input, output.as_deref(), intermediates),
        Commands::Watch { input, ladder } => watch::watch(&input, ladder),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            0
        }
    };
    process::exit(code);
}
