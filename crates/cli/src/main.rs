//! Heimdall CLI: the main entry point.
//!
//! Commands:
//! - `chat`     Interactive session, or one turn with `--message`
//! - `onboard`  Create the config file and workspace
//! - `status`   Show the resolved configuration

use clap::{Parser, Subcommand};

mod commands;
mod operator;

#[derive(Parser)]
#[command(
    name = "heimdall",
    about = "Heimdall: an AI assistant for ethical penetration testing",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a session with the agent
    Chat {
        /// Handle a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Initialize configuration and workspace
    Onboard,

    /// Show the resolved configuration
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Onboard => commands::onboard::run()?,
        Commands::Status => commands::status::run()?,
    }

    Ok(())
}
