//! Despensa CLI: the main entry point.
//!
//! Commands:
//! - `chat`: Interactive chat, or a single interaction with `--message`/`--audio`/`--image`
//! - `serve`: Start the WhatsApp webhook gateway
//! - `inventory`: Print the configured pantry
//! - `onboard`: Write a default config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "despensa",
    about = "Despensa — a conversational pantry assistant",
    version,
    author
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
    /// Chat with the pantry assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Attach an audio file (voice note) to a single interaction
        #[arg(short, long, conflicts_with = "image")]
        audio: Option<PathBuf>,

        /// Attach an image (receipt, photo of products) to a single interaction
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Start the WhatsApp webhook gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the configured pantry
    Inventory,

    /// Write a default configuration file
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            audio,
            image,
        } => commands::chat::run(message, audio.or(image)).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Inventory => commands::inventory::run()?,
        Commands::Onboard => commands::onboard::run()?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chat_accepts_a_single_media_flag() {
        let cli = Cli::try_parse_from(["despensa", "chat", "--audio", "nota.ogg"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { audio: Some(_), image: None, .. }));

        let both = Cli::try_parse_from(["despensa", "chat", "--audio", "a.ogg", "--image", "b.jpg"]);
        assert!(both.is_err());
    }

    #[test]
    fn serve_port_override() {
        let cli = Cli::try_parse_from(["despensa", "serve", "-p", "8080", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Serve { port: Some(8080) }));
    }
}
