//! `despensa serve`: Start the WhatsApp webhook gateway.

use despensa_config::AppConfig;
use despensa_core::event::DomainEvent;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::runtime::Runtime;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let runtime = Runtime::from_config(&config)?;

    let mut events = runtime.event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "event log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("🥫 Despensa Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Webhook:   /webhook");
    println!("   Model:     {}", config.model);
    println!("   Pantry:    {} items", runtime.store.len());

    despensa_gateway::start(&config, runtime.agent, runtime.event_bus).await?;

    Ok(())
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::MessageReceived { channel, sender_id, kind, .. } => {
            debug!(channel, sender = %sender_id, kind, "event: message received");
        }
        DomainEvent::ResponseGenerated { conversation_id, model, tokens_used, tool_calls, .. } => {
            debug!(conversation_id, model, tokens_used, tool_calls, "event: response generated");
        }
        DomainEvent::ToolExecuted { tool_name, success, duration_ms, .. } => {
            debug!(tool = %tool_name, success, duration_ms, "event: capability executed");
        }
        DomainEvent::InventoryChanged { item, previous, current, .. } => {
            debug!(item, %previous, %current, "event: inventory changed");
        }
        DomainEvent::ErrorOccurred { context, error_message, .. } => {
            debug!(context, error = %error_message, "event: error");
        }
    }
}
