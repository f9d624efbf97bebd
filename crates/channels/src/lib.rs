//! Messaging channels for Despensa.
//!
//! Each channel connects to a place where users talk to the assistant and
//! relays messages to and from the agent loop.
//!
//! Available channels:
//! - **CLI**: Interactive terminal chat (stdin/stdout) with media prefixes
//! - **WhatsApp**: WhatsApp Cloud API (webhook ingress, Graph API delivery)

pub mod cli;
pub mod whatsapp;

pub use cli::{CliChannel, ParsedLine, parse_line};
pub use whatsapp::{WhatsAppChannel, parse_webhook};
