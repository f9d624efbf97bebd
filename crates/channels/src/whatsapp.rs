//! WhatsApp Cloud API channel adapter.
//!
//! Inbound messages arrive as webhook POSTs (handled by the gateway), are
//! parsed here and injected into the channel's queue. Replies go out through
//! the Graph API `messages` endpoint. Voice notes and photos are fetched in
//! two hops (media metadata, then the signed download URL) into scoped
//! temporary files.

use async_trait::async_trait;
use despensa_config::WhatsAppConfig;
use despensa_core::channel::{Attachment, AttachmentKind, Channel, ChannelId, ChannelMessage};
use despensa_core::error::ChannelError;
use serde::Deserialize;
use std::io::Write;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const GRAPH_API_BASE: &str = "https://graph.facebook.com";
const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";
const DEFAULT_AUDIO_MIME: &str = "audio/ogg";
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

// Webhook payload shape (only the fields we read).

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
struct WebhookEntry {
    #[serde(default)]
    changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
struct WebhookChange {
    #[serde(default)]
    value: WebhookValue,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookValue {
    #[serde(default)]
    messages: Vec<InboundMessage>,
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    from: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<TextBody>,
    #[serde(default)]
    audio: Option<MediaRef>,
    #[serde(default)]
    voice: Option<MediaRef>,
    #[serde(default)]
    image: Option<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    id: String,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaMetadata {
    #[serde(default)]
    url: Option<String>,
}

/// Parse a webhook body into channel messages.
///
/// Returns `None` when the payload is not a WhatsApp Business notification
/// (the caller acknowledges and ignores it). Status updates without
/// `messages` yield an empty list.
pub fn parse_webhook(payload: &serde_json::Value) -> Option<Vec<ChannelMessage>> {
    let payload: WebhookPayload = serde_json::from_value(payload.clone()).ok()?;
    if payload.object.as_deref() != Some(BUSINESS_ACCOUNT_OBJECT) {
        return None;
    }

    let channel_id = ChannelId("whatsapp".into());
    let messages = payload
        .entry
        .into_iter()
        .flat_map(|e| e.changes)
        .flat_map(|c| c.value.messages)
        .map(|m| to_channel_message(&channel_id, m))
        .collect();
    Some(messages)
}

fn to_channel_message(channel_id: &ChannelId, msg: InboundMessage) -> ChannelMessage {
    let mut out = ChannelMessage::text(channel_id.clone(), msg.from, "");
    out.message_id = msg.id;

    let media = |kind: AttachmentKind, media: MediaRef, default_mime: &str| Attachment {
        kind,
        url: media.id,
        mime_type: Some(media.mime_type.unwrap_or_else(|| default_mime.to_string())),
    };

    match msg.kind.as_str() {
        "text" => out.content = msg.text.map(|t| t.body).unwrap_or_default(),
        "audio" | "voice" => match msg.audio.or(msg.voice) {
            Some(m) => out.attachments.push(media(AttachmentKind::Audio, m, DEFAULT_AUDIO_MIME)),
            None => out.attachments.push(unsupported(&msg.kind)),
        },
        "image" => match msg.image {
            Some(m) => out.attachments.push(media(AttachmentKind::Image, m, DEFAULT_IMAGE_MIME)),
            None => out.attachments.push(unsupported(&msg.kind)),
        },
        other => out.attachments.push(unsupported(other)),
    }
    out
}

fn unsupported(kind: &str) -> Attachment {
    Attachment {
        kind: AttachmentKind::Unsupported,
        url: String::new(),
        mime_type: Some(kind.to_string()),
    }
}

/// Temp-file suffix for a downloaded media object.
///
/// Mime parameters (`audio/ogg; codecs=opus`) are ignored. An unknown mime
/// falls back to a suffix of the attachment's kind, so the file is still
/// recognised as audio or image downstream.
pub fn media_suffix(mime_type: &str, kind: AttachmentKind) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence.to_ascii_lowercase().as_str() {
        "audio/ogg" => ".ogg",
        "audio/mpeg" => ".mp3",
        "audio/mp4" => ".m4a",
        "audio/wav" => ".wav",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/webp" => ".webp",
        _ => match kind {
            AttachmentKind::Audio | AttachmentKind::Voice => ".ogg",
            AttachmentKind::Image => ".jpg",
            AttachmentKind::Unsupported => ".tmp",
        },
    }
}

/// Phone numbers go out as digits only: no `+`, spaces or dashes.
pub fn normalize_phone(number: &str) -> String {
    number
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-'))
        .collect()
}

/// WhatsApp Cloud channel adapter.
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    channel_id: ChannelId,
    client: reqwest::Client,
    api_base: String,
    inject_tx: tokio::sync::Mutex<Option<mpsc::Sender<Result<ChannelMessage, ChannelError>>>>,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            channel_id: ChannelId("whatsapp".into()),
            client: reqwest::Client::new(),
            api_base: GRAPH_API_BASE.into(),
            inject_tx: tokio::sync::Mutex::new(None),
        }
    }

    /// Point Graph API calls at another host (local fakes in tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn config(&self) -> &WhatsAppConfig {
        &self.config
    }

    /// Inject a parsed webhook message (called by the HTTP handler).
    pub async fn inject_message(&self, msg: ChannelMessage) -> Result<(), ChannelError> {
        let guard = self.inject_tx.lock().await;
        if let Some(tx) = guard.as_ref() {
            tx.send(Ok(msg))
                .await
                .map_err(|_| ChannelError::ConnectionLost("Message channel closed".into()))
        } else {
            Err(ChannelError::ConnectionLost(
                "WhatsApp channel not started".into(),
            ))
        }
    }

    /// The subscription handshake: echo the challenge when the mode is
    /// `subscribe` and the token matches the configured verify token.
    pub fn verify_subscription(
        &self,
        mode: Option<&str>,
        token: Option<&str>,
        challenge: Option<&str>,
    ) -> Option<String> {
        let expected = self.config.verify_token.as_deref()?;
        if mode == Some("subscribe") && token == Some(expected) {
            Some(challenge.unwrap_or_default().to_string())
        } else {
            None
        }
    }

    /// Validate the `X-Hub-Signature-256` header (`sha256=<hex>`) against the
    /// app secret. Without a configured secret every payload is accepted.
    pub fn validate_signature(&self, payload: &[u8], signature: Option<&str>) -> bool {
        use hmac::{Hmac, Mac};
        use sha2::Sha256;

        type HmacSha256 = Hmac<Sha256>;

        let secret = match self.config.app_secret.as_deref() {
            None | Some("") => return true,
            Some(secret) => secret,
        };
        let Some(signature) = signature else {
            return false;
        };

        let sig_hex = signature.strip_prefix("sha256=").unwrap_or(signature);
        let Ok(provided) = hex::decode(sig_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&provided).is_ok()
    }

    fn access_token(&self) -> Result<&str, ChannelError> {
        self.config
            .access_token
            .as_deref()
            .ok_or_else(|| ChannelError::NotConfigured("WhatsApp access token not set".into()))
    }

    /// Download a media object into a temp file. The file is removed when
    /// the returned handle drops.
    pub async fn download_media(
        &self,
        media_id: &str,
        mime_type: &str,
        kind: AttachmentKind,
    ) -> Result<NamedTempFile, ChannelError> {
        let token = self.access_token()?;
        let download = |e: reqwest::Error| ChannelError::MediaDownload(e.to_string());

        let metadata_url = format!("{}/{}/{}", self.api_base, self.config.api_version, media_id);
        let metadata: MediaMetadata = self
            .client
            .get(&metadata_url)
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(download)?
            .json()
            .await
            .map_err(download)?;

        let url = metadata
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ChannelError::MediaDownload(format!("no download URL for media {media_id}")))?;

        let bytes = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(download)?
            .bytes()
            .await
            .map_err(download)?;

        let io_err = |e: std::io::Error| ChannelError::MediaDownload(e.to_string());
        let mut file = tempfile::Builder::new()
            .prefix("despensa-")
            .suffix(media_suffix(mime_type, kind))
            .tempfile()
            .map_err(io_err)?;
        file.write_all(&bytes).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        debug!(media_id, bytes = bytes.len(), path = %file.path().display(), "Media downloaded");
        Ok(file)
    }
}

#[async_trait]
impl Channel for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    fn id(&self) -> &ChannelId {
        &self.channel_id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        info!(
            configured = self.config.is_configured(),
            "WhatsApp channel starting"
        );
        let (tx, rx) = mpsc::channel(64);
        *self.inject_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn send(&self, recipient: &str, content: &str) -> Result<(), ChannelError> {
        let token = self.access_token()?;
        let phone_number_id = self.config.phone_number_id.as_deref().ok_or_else(|| {
            ChannelError::NotConfigured("WhatsApp phone number id not set".into())
        })?;

        let url = format!(
            "{}/{}/{}/messages",
            self.api_base, self.config.api_version, phone_number_id
        );
        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": normalize_phone(recipient),
            "type": "text",
            "text": { "preview_url": false, "body": content },
        });

        let failed = |reason: String| ChannelError::DeliveryFailed {
            channel: "whatsapp".into(),
            reason,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "WhatsApp delivery rejected");
            return Err(failed(format!("status {status}: {text}")));
        }

        debug!(recipient, content_len = content.len(), "WhatsApp message sent");
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        let allowed = &self.config.allowed_senders;
        if allowed.is_empty() {
            return false;
        }
        if allowed.iter().any(|s| s == "*") {
            return true;
        }
        let sender = normalize_phone(sender_id);
        allowed.iter().any(|s| normalize_phone(s) == sender)
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("WhatsApp channel stopping");
        *self.inject_tx.lock().await = None;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(self.config.is_configured())
    }
}
