//! Error types for the Despensa domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] is what the
//! agent loop surfaces to its caller.

use thiserror::Error;

use crate::message::Conversation;

/// The top-level error type for all Despensa operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Oracle errors (fatal for one interaction) ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Loop non-termination ---
    /// The oracle kept requesting capabilities past the iteration cap.
    /// Carries the conversation built up to the point of abort.
    #[error("Agent loop exceeded {limit} iterations without a final answer")]
    IterationLimit {
        limit: u32,
        conversation: Box<Conversation>,
    },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Media download failed: {0}")]
    MediaDownload(String),

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

/// Failures reported by the external perception services.
#[derive(Debug, Clone, Error)]
pub enum PerceptionError {
    #[error("rate_limit: perception service rate limit exceeded")]
    RateLimited,

    #[error("invalid_file: {0}")]
    InvalidFile(String),

    #[error("{0}")]
    Service(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn iteration_limit_mentions_the_cap() {
        let err = Error::IterationLimit {
            limit: 8,
            conversation: Box::new(Conversation::new()),
        };
        assert!(err.to_string().contains('8'));
    }

    #[test]
    fn perception_errors_keep_provider_markers() {
        assert!(PerceptionError::RateLimited.to_string().contains("rate_limit"));
        assert!(
            PerceptionError::InvalidFile("bad header".into())
                .to_string()
                .starts_with("invalid_file")
        );
    }
}
