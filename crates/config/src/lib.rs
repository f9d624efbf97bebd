//! Configuration loading, validation, and management for Despensa.
//!
//! Loads configuration from `~/.despensa/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use despensa_core::inventory::StockStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.despensa/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key shared by the oracle and the perception services
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chat model used by the agent
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per oracle response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub perception: PerceptionConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.0
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("perception", &self.perception)
            .field("gateway", &self.gateway)
            .field("whatsapp", &self.whatsapp)
            .field("inventory", &self.inventory)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum Agent Steps per interaction
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    8
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// Speech-to-text and vision settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionConfig {
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_model")]
    pub vision_model: String,

    /// Working language for transcription (ISO-639-1)
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_vision_max_tokens")]
    pub vision_max_tokens: u32,

    #[serde(default = "default_audio_max_mb")]
    pub audio_max_mb: u64,

    #[serde(default = "default_image_max_mb")]
    pub image_max_mb: u64,
}

fn default_transcription_model() -> String {
    "whisper-1".into()
}
fn default_language() -> String {
    "es".into()
}
fn default_vision_max_tokens() -> u32 {
    500
}
fn default_audio_max_mb() -> u64 {
    25
}
fn default_image_max_mb() -> u64 {
    20
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            transcription_model: default_transcription_model(),
            vision_model: default_model(),
            language: default_language(),
            vision_max_tokens: default_vision_max_tokens(),
            audio_max_mb: default_audio_max_mb(),
            image_max_mb: default_image_max_mb(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    5001
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// WhatsApp Cloud API credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_id: Option<String>,

    /// Token echoed back during the webhook subscription handshake
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_token: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// When set, inbound webhooks must carry a valid `X-Hub-Signature-256`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,

    /// Sender phone numbers allowed to talk to the agent ("*" = everyone)
    #[serde(default = "default_allowed_senders")]
    pub allowed_senders: Vec<String>,
}

fn default_api_version() -> String {
    "v21.0".into()
}
fn default_allowed_senders() -> Vec<String> {
    vec!["*".into()]
}

impl WhatsAppConfig {
    /// Whether outbound delivery and media download can work.
    pub fn is_configured(&self) -> bool {
        self.access_token.is_some() && self.phone_number_id.is_some()
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            verify_token: None,
            api_version: default_api_version(),
            app_secret: None,
            allowed_senders: default_allowed_senders(),
        }
    }
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("access_token", &redact(&self.access_token))
            .field("phone_number_id", &self.phone_number_id)
            .field("verify_token", &redact(&self.verify_token))
            .field("api_version", &self.api_version)
            .field("app_secret", &redact(&self.app_secret))
            .field("allowed_senders", &self.allowed_senders)
            .finish()
    }
}

/// Initial pantry contents, item name → status label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_seed")]
    pub seed: BTreeMap<String, String>,
}

fn default_seed() -> BTreeMap<String, String> {
    [
        ("leche", "BAJO"),
        ("huevos", "ALTO"),
        ("pan", "MEDIO"),
        ("azúcar", "ALTO"),
        ("aceite", "MEDIO"),
        ("arroz", "BAJO"),
        ("fideos", "ALTO"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

impl InventoryConfig {
    /// Parse the seed into typed statuses.
    pub fn items(&self) -> Result<Vec<(String, StockStatus)>, ConfigError> {
        self.seed
            .iter()
            .map(|(name, label)| {
                label
                    .parse::<StockStatus>()
                    .map(|status| (name.clone(), status))
                    .map_err(|e| ConfigError::ValidationError(format!("inventory.seed.{name}: {e}")))
            })
            .collect()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.despensa/config.toml).
    ///
    /// Environment variables override file values:
    /// - `DESPENSA_API_KEY`, then `OPENAI_API_KEY`
    /// - `DESPENSA_MODEL`, `DESPENSA_PORT`
    /// - `WHATSAPP_TOKEN`, `WHATSAPP_PHONE_NUMBER_ID`, `WHATSAPP_VERIFY_TOKEN`,
    ///   `WHATSAPP_API_VERSION`, `WHATSAPP_APP_SECRET`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("DESPENSA_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = var("DESPENSA_MODEL") {
            self.model = model;
        }
        if let Some(port) = var("DESPENSA_PORT") {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid DESPENSA_PORT"),
            }
        }
        if let Some(token) = var("WHATSAPP_TOKEN") {
            self.whatsapp.access_token = Some(token);
        }
        if let Some(id) = var("WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = Some(id);
        }
        if let Some(token) = var("WHATSAPP_VERIFY_TOKEN") {
            self.whatsapp.verify_token = Some(token);
        }
        if let Some(version) = var("WHATSAPP_API_VERSION") {
            self.whatsapp.api_version = version;
        }
        if let Some(secret) = var("WHATSAPP_APP_SECRET") {
            self.whatsapp.app_secret = Some(secret);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".despensa")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.perception.audio_max_mb == 0 || self.perception.image_max_mb == 0 {
            return Err(ConfigError::ValidationError(
                "perception size limits must be > 0".into(),
            ));
        }

        self.inventory.items()?;
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            agent: AgentConfig::default(),
            perception: PerceptionConfig::default(),
            gateway: GatewayConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            inventory: InventoryConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
