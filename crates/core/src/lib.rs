//! # Despensa Core
//!
//! Domain types, traits, and error definitions for the Despensa pantry
//! assistant. This crate has **no framework dependencies**: it defines the
//! domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (the language-model oracle, the perception
//! services, the messaging channels) is a trait here. Implementations live in
//! their respective crates, which keeps the agent loop testable with
//! deterministic stubs.

pub mod channel;
pub mod error;
pub mod event;
pub mod inventory;
pub mod media;
pub mod message;
pub mod perception;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{Attachment, AttachmentKind, Channel, ChannelId, ChannelMessage};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use inventory::{InventoryStore, OperationKind, StockStatus};
pub use media::{MediaKind, PendingMedia};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use perception::Perception;
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{Capability, Tool, ToolCall, ToolRegistry, ToolResult};
