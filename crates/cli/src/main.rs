use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use wax::commands::{
    history_command, init_config_command, sweep_command, version_command, SweepOptions,
};
use wax::init_logging;

/// Post-analysis cleanup of disassembled x86 images.
///
/// This CLI is a thin wrapper around `wax-core` (exposed in code as `wax_core`).
/// It loads an address-space snapshot, runs one cleanup sweep over it, and
/// writes back the repaired snapshot.
#[derive(Parser, Debug)]
#[command(
    name = "wax",
    version,
    about = "Heuristic cleanup of analysis databases",
    long_about = None
)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one cleanup sweep over a snapshot.
    ///
    /// This will:
    /// - Remove spurious data cross-references.
    /// - Create alignment items for inter-function padding.
    /// - Repair truncated functions.
    /// - Type function/data pointers in data segments and tag immediates.
    Sweep {
        /// Snapshot to clean up (JSON, or YAML with a .yaml/.yml extension).
        #[arg(long)]
        snapshot: PathBuf,

        /// Write the repaired snapshot here instead of updating the input.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Sweep config file. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Word list file (one entry per line). Overrides the config.
        #[arg(long)]
        wordlist: Option<PathBuf>,

        /// Record the sweep in this history database.
        #[arg(long)]
        history: Option<PathBuf>,

        /// Write the full report as JSON to this file.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Emit the report as JSON instead of a text summary.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Sweep even if auto-analysis has not finished.
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
    },

    /// Show recorded sweeps, or the findings of one sweep.
    History {
        /// History database written by `sweep --history`.
        #[arg(long)]
        db: PathBuf,

        /// Show the findings of this run id.
        #[arg(long)]
        run: Option<i64>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write the default sweep config.
    InitConfig {
        /// Destination (JSON, or YAML with a .yaml/.yml extension).
        #[arg(long, default_value = "wax.json")]
        path: PathBuf,
    },

    /// Print version information.
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Sweep { snapshot, out, config, wordlist, history, report, json, yes } => {
            let opts =
                SweepOptions { snapshot, out, config, wordlist, history, report, json, yes };
            sweep_command(&opts)?;
        }
        Command::History { db, run, json } => history_command(&db, run, json)?,
        Command::InitConfig { path } => init_config_command(&path)?,
        Command::Version => version_command(),
    }

    Ok(())
}
