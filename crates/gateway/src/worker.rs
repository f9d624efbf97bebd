//! The ingress worker: drains the channel queue one message at a time and
//! drives the agent loop for each.
//!
//! A single worker means loop runs never overlap, so inventory updates from
//! different senders are applied in arrival order.

use async_trait::async_trait;
use chrono::Utc;
use despensa_agent::{AgentLoop, UserInput};
use despensa_channels::WhatsAppChannel;
use despensa_core::channel::{Attachment, AttachmentKind, Channel, ChannelMessage};
use despensa_core::error::ChannelError;
use despensa_core::event::{DomainEvent, EventBus};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::session::SessionStore;

pub const UNSUPPORTED_REPLY: &str =
    "Lo siento, solo puedo procesar mensajes de texto, audio e imágenes.";
pub const DOWNLOAD_FAILED_REPLY: &str =
    "Lo siento, no pude descargar el archivo. Por favor, intenta de nuevo.";
pub const PROCESSING_FAILED_REPLY: &str =
    "Lo siento, hubo un error procesando tu mensaje. Por favor, intenta de nuevo.";

/// A channel whose attachments can be fetched to local files.
#[async_trait]
pub trait MediaChannel: Channel {
    /// Fetch an attachment into a temp file that is removed on drop.
    async fn download(&self, attachment: &Attachment) -> Result<NamedTempFile, ChannelError>;
}

#[async_trait]
impl MediaChannel for WhatsAppChannel {
    async fn download(&self, attachment: &Attachment) -> Result<NamedTempFile, ChannelError> {
        let mime = attachment.mime_type.as_deref().unwrap_or_default();
        self.download_media(&attachment.url, mime, attachment.kind).await
    }
}

fn kind_label(msg: &ChannelMessage) -> &'static str {
    match msg.attachments.first().map(|a| a.kind) {
        None => "text",
        Some(AttachmentKind::Audio) => "audio",
        Some(AttachmentKind::Voice) => "voice",
        Some(AttachmentKind::Image) => "image",
        Some(AttachmentKind::Unsupported) => "unsupported",
    }
}

pub struct Worker {
    channel: Arc<dyn MediaChannel>,
    agent: Arc<AgentLoop>,
    sessions: Arc<SessionStore>,
    event_bus: Arc<EventBus>,
}

impl Worker {
    pub fn new(
        channel: Arc<dyn MediaChannel>,
        agent: Arc<AgentLoop>,
        sessions: Arc<SessionStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            channel,
            agent,
            sessions,
            event_bus,
        }
    }

    /// Process messages until the queue closes.
    pub fn spawn(
        self,
        mut rx: mpsc::Receiver<Result<ChannelMessage, ChannelError>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(next) = rx.recv().await {
                match next {
                    Ok(msg) => self.handle(msg).await,
                    Err(e) => warn!(error = %e, "Channel reported an error"),
                }
            }
            info!("Ingress queue closed, worker stopping");
        })
    }

    /// Handle one inbound message end to end, replying on the channel.
    pub async fn handle(&self, msg: ChannelMessage) {
        let sender = msg.sender_id.clone();
        if !self.channel.is_allowed(&sender) {
            warn!(sender = %sender, "Sender not in allow-list, ignoring message");
            return;
        }

        let kind = kind_label(&msg);
        info!(sender = %sender, kind, "Message received");
        self.event_bus.publish(DomainEvent::MessageReceived {
            channel: self.channel.name().to_string(),
            sender_id: sender.clone(),
            kind: kind.to_string(),
            timestamp: Utc::now(),
        });

        // Held until the loop returns; dropping it deletes the file.
        let mut media: Option<NamedTempFile> = None;
        if let Some(attachment) = msg.attachments.first() {
            if attachment.kind == AttachmentKind::Unsupported {
                self.reply(&sender, UNSUPPORTED_REPLY).await;
                return;
            }
            match self.channel.download(attachment).await {
                Ok(file) => media = Some(file),
                Err(e) => {
                    error!(sender = %sender, error = %e, "Media download failed");
                    self.publish_error("media_download", &e.to_string());
                    self.reply(&sender, DOWNLOAD_FAILED_REPLY).await;
                    return;
                }
            }
        }

        let text = msg.content.trim();
        let input = UserInput {
            text: (!text.is_empty()).then(|| text.to_string()),
            media: media.as_ref().map(|f| f.path().to_path_buf()),
        };
        if input.text.is_none() && input.media.is_none() {
            debug!(sender = %sender, "Empty message, nothing to do");
            return;
        }

        let context = self.sessions.get(&sender).await;
        match self.agent.run(&context, input).await {
            Ok(interaction) => {
                self.sessions.replace(&sender, interaction.conversation).await;
                self.reply(&sender, &interaction.reply).await;
            }
            Err(e) => {
                error!(sender = %sender, error = %e, "Agent loop failed");
                self.publish_error("agent_loop", &e.to_string());
                self.reply(&sender, PROCESSING_FAILED_REPLY).await;
            }
        }
        drop(media);
    }

    async fn reply(&self, recipient: &str, content: &str) {
        if let Err(e) = self.channel.send(recipient, content).await {
            warn!(recipient, error = %e, "Reply delivery failed");
            self.publish_error("delivery", &e.to_string());
        }
    }

    fn publish_error(&self, context: &str, message: &str) {
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: message.to_string(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use despensa_core::channel::ChannelId;
    use despensa_core::inventory::{InventoryStore, StockStatus};
    use despensa_core::message::{Message, Role};
    use std::path::PathBuf;

    fn text(sender: &str, content: &str) -> ChannelMessage {
        ChannelMessage::text(ChannelId("fake".into()), sender, content)
    }

    fn with_attachment(sender: &str, kind: AttachmentKind, id: &str) -> ChannelMessage {
        let mut msg = text(sender, "");
        msg.attachments.push(Attachment {
            kind,
            url: id.into(),
            mime_type: None,
        });
        msg
    }

    #[tokio::test]
    async fn text_message_updates_session_and_replies() {
        let channel = Arc::new(FakeChannel::new());
        let store = Arc::new(InventoryStore::from_items([("leche", StockStatus::Low)]));
        let oracle = ScriptedOracle::new(vec![
            tool_call_turn("apply_operation", serde_json::json!({"description": "Compré leche", "kind": "IN"})),
            Message::agent("Listo, leche en ALTO."),
        ]);
        let sessions = Arc::new(SessionStore::new());
        let worker = Worker::new(channel.clone(), agent(Arc::new(oracle), store.clone()), sessions.clone(), Arc::new(EventBus::default()));

        worker.handle(text("549", "Compré leche")).await;

        assert_eq!(store.get("leche"), Some(StockStatus::High));
        assert_eq!(channel.sent(), vec![("549".to_string(), "Listo, leche en ALTO.".to_string())]);
        let session = sessions.get("549").await;
        assert_eq!(session.messages()[0].role, Role::User);
        assert_eq!(session.last().unwrap().content, "Listo, leche en ALTO.");
    }

    #[tokio::test]
    async fn unsupported_message_gets_canned_reply() {
        let channel = Arc::new(FakeChannel::new());
        let worker = Worker::new(
            channel.clone(),
            agent(Arc::new(ScriptedOracle::new(vec![])), Arc::new(InventoryStore::new())),
            Arc::new(SessionStore::new()),
            Arc::new(EventBus::default()),
        );
        worker.handle(with_attachment("549", AttachmentKind::Unsupported, "")).await;
        assert_eq!(channel.sent()[0].1, UNSUPPORTED_REPLY);
    }

    #[tokio::test]
    async fn download_failure_leaves_session_untouched() {
        let channel = Arc::new(FakeChannel::new().failing_downloads());
        let sessions = Arc::new(SessionStore::new());
        let worker = Worker::new(
            channel.clone(),
            agent(Arc::new(ScriptedOracle::new(vec![])), Arc::new(InventoryStore::new())),
            sessions.clone(),
            Arc::new(EventBus::default()),
        );
        worker.handle(with_attachment("549", AttachmentKind::Voice, "media-1")).await;
        assert_eq!(channel.sent()[0].1, DOWNLOAD_FAILED_REPLY);
        assert!(sessions.is_empty().await);
    }

    #[tokio::test]
    async fn loop_failure_replies_with_apology() {
        let channel = Arc::new(FakeChannel::new());
        let sessions = Arc::new(SessionStore::new());
        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();
        // No scripted answers: the oracle fails on first use.
        let worker = Worker::new(
            channel.clone(),
            agent(Arc::new(ScriptedOracle::new(vec![])), Arc::new(InventoryStore::new())),
            sessions.clone(),
            bus,
        );
        worker.handle(text("549", "hola")).await;

        assert_eq!(channel.sent()[0].1, PROCESSING_FAILED_REPLY);
        assert!(sessions.is_empty().await);

        let first = events.recv().await.unwrap();
        assert!(matches!(first.as_ref(), DomainEvent::MessageReceived { kind, .. } if kind == "text"));
    }

    #[tokio::test]
    async fn media_file_lives_for_the_interaction_only() {
        let channel = Arc::new(FakeChannel::new());
        let oracle = Arc::new(ScriptedOracle::new(vec![Message::agent("Recibido")]).watching(channel.downloads()));
        let worker = Worker::new(
            channel.clone(),
            agent(oracle.clone(), Arc::new(InventoryStore::new())),
            Arc::new(SessionStore::new()),
            Arc::new(EventBus::default()),
        );
        worker.handle(with_attachment("549", AttachmentKind::Image, "media-2")).await;

        assert_eq!(channel.sent()[0].1, "Recibido");
        assert_eq!(oracle.files_present_during_calls(), vec![true]);
        let paths: Vec<PathBuf> = channel.downloads().lock().unwrap().clone();
        assert_eq!(paths.len(), 1);
        assert!(!paths[0].exists());
    }

    #[tokio::test]
    async fn blocked_sender_is_ignored() {
        let channel = Arc::new(FakeChannel::new().allowing(&["111"]));
        let worker = Worker::new(
            channel.clone(),
            agent(Arc::new(ScriptedOracle::new(vec![])), Arc::new(InventoryStore::new())),
            Arc::new(SessionStore::new()),
            Arc::new(EventBus::default()),
        );
        worker.handle(text("999", "hola")).await;
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn spawned_worker_drains_queue_in_order() {
        let channel = Arc::new(FakeChannel::new());
        let oracle = ScriptedOracle::new(vec![Message::agent("uno"), Message::agent("dos")]);
        let worker = Worker::new(
            channel.clone(),
            agent(Arc::new(oracle), Arc::new(InventoryStore::new())),
            Arc::new(SessionStore::new()),
            Arc::new(EventBus::default()),
        );
        let (tx, rx) = mpsc::channel(8);
        let handle = worker.spawn(rx);
        tx.send(Ok(text("a", "hola"))).await.unwrap();
        tx.send(Ok(text("b", "hola"))).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let replies: Vec<String> = channel.sent().into_iter().map(|(_, r)| r).collect();
        assert_eq!(replies, vec!["uno", "dos"]);
    }
}
