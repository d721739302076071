//! toolchat CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP gateway
//! - `chat` : Single message or interactive chat on a thread
//! - `tools`: List the built-in tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "toolchat",
    about = "toolchat — a conversational agent that answers directly or calls tools",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (default: ~/.toolchat/config.toml)
    #[arg(short, long, global = true, env = "TOOLCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the bind address
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the agent
    Chat {
        /// Thread to continue (a new one is created when omitted)
        #[arg(short, long)]
        thread: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List the available tools
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(config, host, port).await?,
        Commands::Chat { thread, message } => commands::chat::run(config, thread, message).await?,
        Commands::Tools => commands::tools::run(config)?,
    }

    Ok(())
}
