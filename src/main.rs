mod commands;
mod window;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::window::Window;

#[derive(Parser)]
#[command(name = "calfetch")]
#[command(about = "Fetch calendar events through a deduplicating cache")]
struct Cli {
    /// Log cache activity (gaps, remote calls) to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and print events for one or more windows
    Events {
        /// Windows as FROM..TO (YYYY-MM-DD or RFC3339), fetched concurrently
        windows: Vec<Window>,

        /// Calendar to read instead of the configured one
        #[arg(short, long)]
        calendar: Option<String>,

        /// Fetch every window in full, ignoring what was already fetched
        #[arg(long)]
        refetch: bool,
    },
    /// Show config path and effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Events {
            windows,
            calendar,
            refetch,
        } => commands::events::run(windows, calendar, refetch).await,
        Commands::Config => commands::config::run(),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
