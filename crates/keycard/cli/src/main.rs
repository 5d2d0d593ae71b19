//! `cardlink`: list PC/SC readers, inspect Keycards and provision them

use anyhow::Result;
use cardlink_apdu_pcsc::{PcscConfig, PcscDeviceManager};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod utils;

use commands::*;
use utils::{InitArgs, reader};

#[derive(Parser)]
#[command(version, about = "Provision Keycards over PC/SC")]
struct Cli {
    /// Optional reader name to use (will auto-detect if not specified)
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Debug level output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    List,

    /// Select the Keycard application and show its state
    Select,

    /// Initialize a Keycard, generating any secret not given
    Init {
        #[command(flatten)]
        secrets: SecretArgs,

        #[command(flatten)]
        init: InitArgs,
    },

    /// Report cards as they connect and disconnect
    Watch {
        /// Initialize every newly connected card with random secrets
        #[arg(long)]
        init: bool,

        #[command(flatten)]
        options: InitArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let manager = PcscDeviceManager::with_config(PcscConfig::default())?;

    match &cli.command {
        Commands::List => list_readers(&manager),
        Commands::Watch { init, options } => watch_command(
            &manager,
            cli.reader.as_deref(),
            *init,
            options.session_config(),
        ),
        Commands::Select | Commands::Init { .. } => {
            let reader = reader::resolve_reader(&manager, cli.reader.as_deref())?;
            info!("Using reader: {}", reader.name());
            let transport = manager.open_reader(reader.name())?;

            match &cli.command {
                Commands::Init { secrets, init } => init_command(transport, secrets, init),
                _ => select_command(transport),
            }
        }
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .init();
}
