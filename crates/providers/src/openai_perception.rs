//! OpenAI perception backend: Whisper speech-to-text and chat-completion vision.

use async_trait::async_trait;
use base64::Engine;
use despensa_core::error::PerceptionError;
use despensa_core::perception::Perception;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

pub struct OpenAiPerception {
    base_url: String,
    api_key: String,
    transcription_model: String,
    vision_model: String,
    vision_max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiPerception {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            transcription_model: "whisper-1".into(),
            vision_model: "gpt-4o-mini".into(),
            vision_max_tokens: 500,
            client,
        }
    }

    pub fn with_transcription_model(mut self, model: impl Into<String>) -> Self {
        self.transcription_model = model.into();
        self
    }

    pub fn with_vision_model(mut self, model: impl Into<String>, max_tokens: u32) -> Self {
        self.vision_model = model.into();
        self.vision_max_tokens = max_tokens;
        self
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PerceptionError> {
        let status = response.status().as_u16();
        if status == 200 {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status, body = %body, "Perception service returned error");
        Err(classify_failure(status, &body))
    }
}

/// Map an HTTP failure from the service to a [`PerceptionError`].
pub fn classify_failure(status: u16, body: &str) -> PerceptionError {
    if status == 429 || body.contains("rate_limit") {
        PerceptionError::RateLimited
    } else if body.contains("invalid_file") || body.contains("invalid_image") {
        PerceptionError::InvalidFile(body.to_string())
    } else {
        PerceptionError::Service(format!("status {status}: {body}"))
    }
}

/// Build a `data:` URL for an inline image.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{encoded}")
}

fn network(e: reqwest::Error) -> PerceptionError {
    PerceptionError::Network(e.to_string())
}

#[async_trait]
impl Perception for OpenAiPerception {
    fn name(&self) -> &str {
        "openai"
    }

    async fn transcribe(&self, path: &Path, language: &str) -> Result<String, PerceptionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PerceptionError::Io(e.to_string()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        debug!(file = %file_name, bytes = bytes.len(), model = %self.transcription_model, "Transcribing audio");

        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .text("language", language.to_string())
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;

        let parsed: TranscriptionResponse = Self::check(response).await?.json().await.map_err(network)?;
        Ok(parsed.text)
    }

    async fn describe_image(
        &self,
        path: &Path,
        mime_type: &str,
        instruction: &str,
    ) -> Result<String, PerceptionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PerceptionError::Io(e.to_string()))?;

        debug!(bytes = bytes.len(), model = %self.vision_model, "Describing image");

        let body = serde_json::json!({
            "model": self.vision_model,
            "max_tokens": self.vision_max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": instruction},
                    {"type": "image_url", "image_url": {"url": data_url(mime_type, &bytes)}}
                ]
            }]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(network)?;

        let parsed: VisionResponse = Self::check(response).await?.json().await.map_err(network)?;
        Ok(parsed.into_text())
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct VisionResponse {
    choices: Vec<VisionChoice>,
}

impl VisionResponse {
    /// The first choice's text. A null or missing answer is an empty
    /// description, not a failure.
    fn into_text(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct VisionChoice {
    message: VisionMessage,
}

#[derive(Debug, Deserialize)]
struct VisionMessage {
    content: Option<String>,
}
