//! Media attached to the current user turn.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::tool::Capability;

/// Extensions inferred as audio. Anything else is treated as an image.
pub const AUDIO_KIND_EXTENSIONS: &[&str] = &[
    "wav", "mp3", "m4a", "ogg", "oga", "opus", "flac", "aac", "webm", "mpeg", "mpga",
];

/// The kind of a media artifact, inferred from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        match extension_of(path) {
            Some(ext) if AUDIO_KIND_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Audio,
            _ => MediaKind::Image,
        }
    }

    /// The perception capability that handles this kind.
    pub fn capability(&self) -> Capability {
        match self {
            MediaKind::Audio => Capability::TranscribeAudio,
            MediaKind::Image => Capability::ProcessImage,
        }
    }

    /// Human label used in synthesized user turns.
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Image => "imagen",
        }
    }
}

/// Lowercased extension without the leading dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// A single audio or image artifact attached to the current interaction.
///
/// Lives for one run of the agent loop only. `turn_offset` is the length of
/// the conversation when the interaction began; perception requests recorded
/// at or after that index count as having processed this media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMedia {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub turn_offset: usize,
}

impl PendingMedia {
    pub fn new(path: impl Into<PathBuf>, turn_offset: usize) -> Self {
        let path = path.into();
        let kind = MediaKind::from_path(&path);
        Self {
            path,
            kind,
            turn_offset,
        }
    }

    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(MediaKind::from_path(Path::new("nota.OGG")), MediaKind::Audio);
        assert_eq!(MediaKind::from_path(Path::new("/tmp/a.wav")), MediaKind::Audio);
        assert_eq!(MediaKind::from_path(Path::new("compra.jpg")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("photo.bmp")), MediaKind::Image);
        assert_eq!(MediaKind::from_path(Path::new("sin_extension")), MediaKind::Image);
    }

    #[test]
    fn kind_maps_to_perception_capability() {
        assert_eq!(MediaKind::Audio.capability(), Capability::TranscribeAudio);
        assert_eq!(MediaKind::Image.capability(), Capability::ProcessImage);
    }

    #[test]
    fn pending_media_infers_kind() {
        let media = PendingMedia::new("/tmp/voz.m4a", 3);
        assert_eq!(media.kind, MediaKind::Audio);
        assert_eq!(media.turn_offset, 3);
        assert_eq!(media.display_path(), "/tmp/voz.m4a");
    }
}
