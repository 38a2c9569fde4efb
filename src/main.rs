mod commands;
mod config;
mod session;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::Host;
use crate::config::GdataConfig;

#[derive(Parser)]
#[command(name = "gdata")]
#[command(about = "Keep a local calendar and task store in sync with Google Calendar and Google Tasks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve each calendar's remote address
    Init {
        /// Only operate on this calendar (by id)
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Fetch remote changes into the local store
    Sync {
        /// Only operate on this calendar (by id)
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Drop sync state and cached items so the next sync starts over
    Reset {
        /// Only operate on this calendar (by id)
        #[arg(short, long)]
        calendar: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = GdataConfig::load()?;
    let host = Host::open(&config).await?;

    match cli.command {
        Commands::Init { calendar } => {
            let calendars = host.select(calendar.as_deref()).await?;
            commands::init::run(&host, calendars).await
        }
        Commands::Sync { calendar } => {
            let calendars = host.select(calendar.as_deref()).await?;
            commands::sync::run(&host, calendars).await
        }
        Commands::Reset { calendar } => {
            let calendars = host.select(calendar.as_deref()).await?;
            commands::reset::run(&host, calendars).await
        }
    }
}
