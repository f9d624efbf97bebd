//! Test doubles for the gateway: a recording channel and a scripted oracle.

use async_trait::async_trait;
use despensa_agent::AgentLoop;
use despensa_core::channel::{Attachment, AttachmentKind, Channel, ChannelId, ChannelMessage};
use despensa_core::error::{ChannelError, PerceptionError, ProviderError};
use despensa_core::event::EventBus;
use despensa_core::inventory::InventoryStore;
use despensa_core::message::{Message, MessageToolCall};
use despensa_core::perception::Perception;
use despensa_core::provider::{Provider, ProviderRequest, ProviderResponse};
use despensa_tools::{PerceptionSettings, default_registry};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

use crate::worker::MediaChannel;

/// Records replies and serves attachments from local temp files.
pub struct FakeChannel {
    id: ChannelId,
    allowed: Vec<String>,
    fail_downloads: bool,
    sent: Mutex<Vec<(String, String)>>,
    downloads: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("fake".into()),
            allowed: vec!["*".into()],
            fail_downloads: false,
            sent: Mutex::new(Vec::new()),
            downloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_downloads(mut self) -> Self {
        self.fail_downloads = true;
        self
    }

    pub fn allowing(mut self, senders: &[&str]) -> Self {
        self.allowed = senders.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        self.downloads.clone()
    }
}

#[async_trait]
impl Channel for FakeChannel {
    fn name(&self) -> &str {
        "fake"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(&self, recipient: &str, content: &str) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), content.to_string()));
        Ok(())
    }

    fn is_allowed(&self, sender_id: &str) -> bool {
        self.allowed.iter().any(|s| s == "*" || s == sender_id)
    }
}

#[async_trait]
impl MediaChannel for FakeChannel {
    async fn download(&self, attachment: &Attachment) -> Result<NamedTempFile, ChannelError> {
        if self.fail_downloads {
            return Err(ChannelError::MediaDownload("404 Not Found".into()));
        }
        let suffix = match attachment.kind {
            AttachmentKind::Image => ".jpg",
            _ => ".ogg",
        };
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(b"fake media").unwrap();
        self.downloads.lock().unwrap().push(file.path().to_path_buf());
        Ok(file)
    }
}

/// Answers with scripted Agent turns in order, then fails.
pub struct ScriptedOracle {
    turns: Mutex<Vec<Message>>,
    watched: Option<Arc<Mutex<Vec<PathBuf>>>>,
    present: Mutex<Vec<bool>>,
}

impl ScriptedOracle {
    pub fn new(turns: Vec<Message>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().rev().collect()),
            watched: None,
            present: Mutex::new(Vec::new()),
        }
    }

    /// On every call, record whether all watched files exist.
    pub fn watching(mut self, paths: Arc<Mutex<Vec<PathBuf>>>) -> Self {
        self.watched = Some(paths);
        self
    }

    pub fn files_present_during_calls(&self) -> Vec<bool> {
        self.present.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Some(watched) = &self.watched {
            let all = watched.lock().unwrap().iter().all(|p| p.exists());
            self.present.lock().unwrap().push(all);
        }
        let turn = self
            .turns
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::Network("connection refused".into()))?;
        Ok(ProviderResponse {
            message: turn,
            usage: None,
            model: request.model,
        })
    }
}

/// Perception that is never expected to run.
pub struct NoPerception;

#[async_trait]
impl Perception for NoPerception {
    fn name(&self) -> &str {
        "none"
    }

    async fn transcribe(&self, _path: &Path, _language: &str) -> Result<String, PerceptionError> {
        Err(PerceptionError::Service("not available".into()))
    }

    async fn describe_image(
        &self,
        _path: &Path,
        _mime_type: &str,
        _instruction: &str,
    ) -> Result<String, PerceptionError> {
        Err(PerceptionError::Service("not available".into()))
    }
}

pub fn tool_call_turn(name: &str, args: serde_json::Value) -> Message {
    Message::agent_with_calls(
        "",
        vec![MessageToolCall {
            id: format!("call_{name}"),
            name: name.into(),
            arguments: args.to_string(),
        }],
    )
}

pub fn agent(oracle: Arc<ScriptedOracle>, store: Arc<InventoryStore>) -> Arc<AgentLoop> {
    let tools = default_registry(
        store,
        Arc::new(NoPerception),
        &PerceptionSettings::default(),
        None,
    );
    Arc::new(AgentLoop::new(
        oracle,
        "mock-model",
        Arc::new(tools),
        Arc::new(EventBus::default()),
    ))
}
