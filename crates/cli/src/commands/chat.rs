//! `despensa chat`: Interactive or single-interaction mode.

use despensa_agent::UserInput;
use despensa_channels::CliChannel;
use despensa_config::AppConfig;
use despensa_core::channel::{Channel, ChannelMessage};
use despensa_core::message::Conversation;
use std::io::Write;
use std::path::PathBuf;

use crate::runtime::Runtime;

/// Turn a terminal message into loop input. Empty lines yield nothing.
pub fn to_input(msg: &ChannelMessage) -> Option<UserInput> {
    let text = msg.content.trim();
    let input = UserInput {
        text: (!text.is_empty()).then(|| text.to_string()),
        media: msg.attachments.first().map(|a| PathBuf::from(&a.url)),
    };
    (input.text.is_some() || input.media.is_some()).then_some(input)
}

fn prompt() -> std::io::Result<()> {
    print!("  Tú > ");
    std::io::stdout().flush()
}

pub async fn run(
    message: Option<String>,
    media: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENAI_API_KEY   = 'sk-...'");
        eprintln!("    DESPENSA_API_KEY = 'sk-...'   (generic, wins over OPENAI_API_KEY)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let runtime = Runtime::from_config(&config)?;
    let agent = runtime.agent;

    if message.is_some() || media.is_some() {
        let input = UserInput {
            text: message,
            media,
        };
        eprint!("  Pensando...");
        let interaction = agent.run(&Conversation::new(), input).await?;
        eprint!("\r              \r");
        println!("{}", interaction.reply);
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Despensa — Asistente de inventario     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", config.model);
    println!();
    for line in despensa_tools::inventory::lookup(&runtime.store, None).lines() {
        println!("  {line}");
    }
    println!();
    println!("  Escribí tu mensaje y presioná Enter.");
    println!("  Adjuntá archivos con 'audio: <ruta>' o 'imagen: <ruta>'.");
    println!("  Escribí 'salir' para terminar.");
    println!();

    let channel = CliChannel::new();
    let mut rx = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;
    let mut conversation = Conversation::new();

    prompt()?;

    while let Some(result) = rx.recv().await {
        match result {
            Ok(msg) => {
                let Some(input) = to_input(&msg) else {
                    prompt()?;
                    continue;
                };

                eprint!("  ...");
                match agent.run(&conversation, input).await {
                    Ok(interaction) => {
                        eprint!("\r     \r");
                        conversation = interaction.conversation;
                        channel.send(&msg.sender_id, &interaction.reply).await?;
                    }
                    Err(e) => {
                        eprint!("\r     \r");
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }

                prompt()?;
            }
            Err(e) => {
                eprintln!("  [Channel Error] {e}");
                break;
            }
        }
    }

    println!();
    println!("  ¡Hasta luego! 👋");
    println!();

    Ok(())
}
