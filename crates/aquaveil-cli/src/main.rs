//! Aquaveil CLI.
//!
//! Drives the encrypted-telemetry pipeline end-to-end with the in-process
//! reference adapters: seal readings, derive optimization ciphertexts,
//! request decryption and apply the oracle's signed fulfillments.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

/// Aquaveil: encrypted plant telemetry with oracle-gated reveals.
#[derive(Parser)]
#[command(name = "aquaveil")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline against an in-process oracle
    Demo {
        /// Inflow rate reading
        #[arg(long, default_value_t = 20)]
        inflow: u64,

        /// Chemical levels reading
        #[arg(long, default_value_t = 30)]
        chemicals: u64,

        /// Turbidity reading
        #[arg(long, default_value_t = 10)]
        turbidity: u64,

        /// Bacterial count reading
        #[arg(long, default_value_t = 50)]
        bacteria: u64,

        /// Operator name used to derive the caller identity
        #[arg(long, default_value = "demo-operator")]
        operator: String,

        /// Output format (json, human)
        #[arg(short, long, default_value = "human")]
        format: String,
    },

    /// Generate a fresh oracle keypair and print it as hex
    Keygen,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match cli.command {
        Commands::Demo {
            inflow,
            chemicals,
            turbidity,
            bacteria,
            operator,
            format,
        } => commands::demo(inflow, chemicals, turbidity, bacteria, &operator, &format),
        Commands::Keygen => commands::keygen(),
    }
}
