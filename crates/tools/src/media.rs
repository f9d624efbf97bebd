//! Local validation of media artifacts before they reach a perception service.

use despensa_core::media::extension_of;
use std::path::Path;
use thiserror::Error;

/// Extensions accepted by the speech-to-text service.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
];

/// Raster formats accepted by the vision service.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Which artifacts a capability accepts.
#[derive(Debug, Clone)]
pub struct MediaRules {
    /// "audio" or "imagen", used in reports
    pub label: &'static str,
    pub extensions: &'static [&'static str],
    pub max_mb: u64,
}

impl MediaRules {
    pub fn audio(max_mb: u64) -> Self {
        Self {
            label: "audio",
            extensions: AUDIO_EXTENSIONS,
            max_mb,
        }
    }

    pub fn image(max_mb: u64) -> Self {
        Self {
            label: "imagen",
            extensions: IMAGE_EXTENSIONS,
            max_mb,
        }
    }

    fn allowed_list(&self) -> String {
        self.extensions
            .iter()
            .map(|e| format!(".{e}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Why an artifact was rejected. The `Display` text is what the oracle sees.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaRejection {
    #[error("Error: El archivo de {label} '{path}' no existe.")]
    NotFound { label: &'static str, path: String },

    #[error("Error: '{0}' no es un archivo válido.")]
    NotAFile(String),

    #[error("Error: Formato de archivo '{extension}' no soportado. Formatos válidos: {allowed}")]
    UnsupportedFormat { extension: String, allowed: String },

    #[error("Error: El archivo es demasiado grande ({size_mb:.2} MB). El máximo es {max_mb} MB.")]
    TooLarge { size_mb: f64, max_mb: u64 },
}

/// Check existence, regular-file-ness, extension and size.
///
/// Returns the lowercased extension on success.
pub async fn validate(path: &Path, rules: &MediaRules) -> Result<String, MediaRejection> {
    let shown = path.display().to_string();

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| MediaRejection::NotFound {
            label: rules.label,
            path: shown.clone(),
        })?;

    if !metadata.is_file() {
        return Err(MediaRejection::NotAFile(shown));
    }

    let extension = extension_of(path).unwrap_or_default();
    if !rules.extensions.contains(&extension.as_str()) {
        let extension = if extension.is_empty() {
            String::new()
        } else {
            format!(".{extension}")
        };
        return Err(MediaRejection::UnsupportedFormat {
            extension,
            allowed: rules.allowed_list(),
        });
    }

    if metadata.len() > rules.max_mb * BYTES_PER_MB {
        return Err(MediaRejection::TooLarge {
            size_mb: metadata.len() as f64 / BYTES_PER_MB as f64,
            max_mb: rules.max_mb,
        });
    }

    Ok(extension)
}

/// MIME type for an allow-listed image extension.
pub fn image_mime_type(extension: &str) -> String {
    match extension {
        "jpg" => "image/jpeg".to_string(),
        other => format!("image/{other}"),
    }
}
