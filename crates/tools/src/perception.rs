//! Perception capabilities: `transcribe_audio` and `process_image`.
//!
//! Both validate the artifact locally, then delegate to the injected
//! [`Perception`] backend. They always answer with text; failures are
//! mapped to a small set of canonical messages. Neither touches the
//! inventory store.

use async_trait::async_trait;
use despensa_core::error::{PerceptionError, ToolError};
use despensa_core::perception::Perception;
use despensa_core::tool::{Capability, Tool, ToolResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::media::{self, MediaRules};

pub const RATE_LIMITED: &str =
    "Error: Límite de tasa excedido. Por favor, intenta de nuevo en unos momentos.";

/// Sentinel the vision service answers with when nothing is recognized.
pub const NO_PRODUCTS: &str = "No se pudieron identificar productos claramente en la imagen";

/// Fixed instruction sent with every image.
pub const VISION_INSTRUCTION: &str = r#"Analiza esta imagen de una despensa, compra de supermercado, o productos alimenticios.

Identifica los productos visibles en la imagen y genera un mensaje estructurado para actualizar el inventario.

Formato de respuesta:
- Si hay un solo producto: "Compra de [producto] [cantidad si es visible], establecer a ALTO"
- Si hay múltiples productos: una línea por producto con el mismo formato

Ejemplos:
- "Compra de 1kg de arroz, establecer a ALTO"
- "Compra de pan, establecer a ALTO"
- "Compra de leche, establecer a ALTO"

Si no puedes identificar productos claramente, responde exactamente: "No se pudieron identificar productos claramente en la imagen"."#;

/// Canonical failure classes of a perception call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureClass {
    RateLimited,
    InvalidFile,
    Other,
}

fn classify(err: &PerceptionError) -> FailureClass {
    match err {
        PerceptionError::RateLimited => FailureClass::RateLimited,
        PerceptionError::InvalidFile(_) => FailureClass::InvalidFile,
        other => {
            let text = other.to_string().to_lowercase();
            if text.contains("rate_limit") {
                FailureClass::RateLimited
            } else if text.contains("invalid_file") || text.contains("invalid_image") {
                FailureClass::InvalidFile
            } else {
                FailureClass::Other
            }
        }
    }
}

fn path_argument(arguments: &serde_json::Value) -> Result<PathBuf, ToolError> {
    arguments["path"]
        .as_str()
        .map(|p| PathBuf::from(p.trim()))
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))
}

fn path_schema(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": description
            }
        },
        "required": ["path"]
    })
}

/// Speech-to-text over an audio artifact.
pub struct TranscribeAudioTool {
    perception: Arc<dyn Perception>,
    rules: MediaRules,
    language: String,
}

impl TranscribeAudioTool {
    pub fn new(perception: Arc<dyn Perception>, language: impl Into<String>, max_mb: u64) -> Self {
        Self {
            perception,
            rules: MediaRules::audio(max_mb),
            language: language.into(),
        }
    }

    fn failure_text(path: &Path, err: &PerceptionError) -> String {
        match classify(err) {
            FailureClass::RateLimited => RATE_LIMITED.to_string(),
            FailureClass::InvalidFile => format!(
                "Error: El archivo '{}' no es un archivo de audio válido.",
                path.display()
            ),
            FailureClass::Other => format!("Error al transcribir audio: {err}"),
        }
    }
}

#[async_trait]
impl Tool for TranscribeAudioTool {
    fn capability(&self) -> Capability {
        Capability::TranscribeAudio
    }

    fn description(&self) -> &str {
        "Transcribe un archivo de audio enviado por el usuario y devuelve lo que dijo."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        path_schema("Ruta al archivo de audio, ej: 'nota.ogg'")
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = path_argument(&arguments)?;

        if let Err(rejection) = media::validate(&path, &self.rules).await {
            info!(path = %path.display(), reason = %rejection, "Audio rejected");
            return Ok(ToolResult::failed(rejection.to_string()));
        }

        match self.perception.transcribe(&path, &self.language).await {
            Ok(text) => Ok(ToolResult::ok(format!("El usuario dijo: '{}'", text.trim()))),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Transcription failed");
                Ok(ToolResult::failed(Self::failure_text(&path, &e)))
            }
        }
    }
}

/// Grocery recognition over an image artifact.
pub struct ProcessImageTool {
    perception: Arc<dyn Perception>,
    rules: MediaRules,
}

impl ProcessImageTool {
    pub fn new(perception: Arc<dyn Perception>, max_mb: u64) -> Self {
        Self {
            perception,
            rules: MediaRules::image(max_mb),
        }
    }

    fn failure_text(path: &Path, err: &PerceptionError) -> String {
        match classify(err) {
            FailureClass::RateLimited => RATE_LIMITED.to_string(),
            FailureClass::InvalidFile => format!(
                "Error: El archivo '{}' no es una imagen válida.",
                path.display()
            ),
            FailureClass::Other => format!("Error al procesar imagen: {err}"),
        }
    }
}

#[async_trait]
impl Tool for ProcessImageTool {
    fn capability(&self) -> Capability {
        Capability::ProcessImage
    }

    fn description(&self) -> &str {
        "Analiza una imagen de productos o de una compra y devuelve una línea por producto \
         con el formato 'Compra de <producto> [cantidad], establecer a ALTO'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        path_schema("Ruta al archivo de imagen, ej: 'compra.jpg'")
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = path_argument(&arguments)?;

        let extension = match media::validate(&path, &self.rules).await {
            Ok(ext) => ext,
            Err(rejection) => {
                info!(path = %path.display(), reason = %rejection, "Image rejected");
                return Ok(ToolResult::failed(rejection.to_string()));
            }
        };

        let mime = media::image_mime_type(&extension);
        match self
            .perception
            .describe_image(&path, &mime, VISION_INSTRUCTION)
            .await
        {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    Ok(ToolResult::ok(NO_PRODUCTS))
                } else {
                    Ok(ToolResult::ok(text))
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Image processing failed");
                Ok(ToolResult::failed(Self::failure_text(&path, &e)))
            }
        }
    }
}
