//! walletsync - keep a wallet, an on-chain transfer ledger and a local cache in step

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use walletsync::cli::commands;
use walletsync::config::Config;

/// Wallet/ledger synchronizer
#[derive(Parser)]
#[command(name = "walletsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the synchronizer until interrupted
    Start,

    /// Submit a transfer through the wallet and record it in the ledger
    Send {
        /// Receiver address (0x-prefixed)
        #[arg(long)]
        to: String,

        /// Amount in ether, decimal ("0.05")
        #[arg(long)]
        amount: String,

        /// Keyword tag attached to the transfer
        #[arg(long, default_value = "")]
        keyword: String,

        /// Message attached to the transfer
        #[arg(long, default_value = "")]
        message: String,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Show the transaction view, newest first
    Transactions {
        /// Number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show the cached transaction count
    Count,

    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("walletsync=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Start => commands::start(&config).await,
        Commands::Send {
            to,
            amount,
            keyword,
            message,
            yes,
        } => commands::send(&config, to, amount, keyword, message, yes).await,
        Commands::Transactions { limit } => commands::transactions(&config, limit).await,
        Commands::Count => commands::count(&config).await,
        Commands::Config => commands::show_config(&config).await,
    }
}
