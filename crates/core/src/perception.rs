//! Perception trait: the boundary to the external speech-to-text and
//! image-understanding services.
//!
//! The perception capabilities validate artifacts locally and then delegate
//! here. Implementations only talk to the remote service; they never touch
//! the inventory store.

use async_trait::async_trait;
use std::path::Path;

use crate::error::PerceptionError;

#[async_trait]
pub trait Perception: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai").
    fn name(&self) -> &str;

    /// Transcribe an audio file in the given working language (ISO-639-1).
    async fn transcribe(&self, path: &Path, language: &str) -> Result<String, PerceptionError>;

    /// Describe an image following `instruction`.
    async fn describe_image(
        &self,
        path: &Path,
        mime_type: &str,
        instruction: &str,
    ) -> Result<String, PerceptionError>;
}
