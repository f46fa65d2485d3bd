//! Sprout CLI - offline backup tooling for a Sprout data directory
//!
//! Provides `sprout export`, `sprout import`, and `sprout inspect`.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sprout")]
#[command(about = "Sprout - photo journal backup tool")]
#[command(version)]
struct Cli {
    /// Data directory holding store.db and uploads/
    #[arg(
        long,
        global = true,
        env = "SPROUT_STORAGE__DATA_DIR",
        default_value = "data"
    )]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a backup archive of the data directory
    Export {
        /// Output file or directory (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the data directory with the content of a backup archive
    Import {
        /// Archive to import
        archive: PathBuf,
        /// Give up if installing files takes longer than this
        #[arg(long, default_value_t = 120)]
        quiesce_timeout_secs: u64,
    },
    /// Validate a backup archive without touching any data
    Inspect {
        /// Archive to inspect
        archive: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Export { output } => commands::export::execute(&cli.data_dir, output.as_deref()),
        Commands::Import {
            archive,
            quiesce_timeout_secs,
        } => commands::import::execute(&cli.data_dir, &archive, quiesce_timeout_secs),
        Commands::Inspect { archive, json } => commands::inspect::execute(&archive, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
