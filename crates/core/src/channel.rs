//! Channel trait: the abstraction over messaging platforms.
//!
//! A Channel connects Despensa to a place where users talk to it (WhatsApp,
//! the terminal). It yields inbound messages and delivers replies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The channel this message belongs to
    pub channel_id: ChannelId,

    /// Sender identifier (platform-specific user ID, e.g. a phone number)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// The text content (empty for media-only messages)
    pub content: String,

    /// Platform message ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Attachments (voice notes, photos)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChannelMessage {
    pub fn text(channel_id: ChannelId, sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel_id,
            sender_id: sender_id.into(),
            sender_name: None,
            content: content.into(),
            message_id: None,
            attachments: Vec::new(),
        }
    }
}

/// An attachment in a channel message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Type of attachment
    pub kind: AttachmentKind,

    /// Platform media ID, URL or local file path
    pub url: String,

    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Audio,
    Voice,
    /// A message type the assistant cannot handle (stickers, locations, ...)
    Unsupported,
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "whatsapp", "cli").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for incoming messages.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChannelMessage, ChannelError>>,
        ChannelError,
    >;

    /// Deliver a text reply to a recipient. Best effort: callers log failures.
    async fn send(&self, recipient: &str, content: &str) -> std::result::Result<(), ChannelError>;

    /// Check if a sender is allowed (allowlist check).
    fn is_allowed(&self, sender_id: &str) -> bool;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: is the channel configured and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
