//! Capability implementations for Despensa.
//!
//! Inventory capabilities query and mutate the shared [`InventoryStore`];
//! perception capabilities turn an audio or image artifact into text through
//! an injected [`Perception`] backend.

pub mod inventory;
pub mod media;
pub mod perception;

use despensa_core::event::EventBus;
use despensa_core::inventory::InventoryStore;
use despensa_core::perception::Perception;
use despensa_core::tool::ToolRegistry;
use std::sync::Arc;

pub use inventory::{ApplyOperationTool, LookupTool, RestockSuggestionTool};
pub use perception::{ProcessImageTool, TranscribeAudioTool};

/// Limits and language for the perception capabilities.
#[derive(Debug, Clone)]
pub struct PerceptionSettings {
    pub language: String,
    pub audio_max_mb: u64,
    pub image_max_mb: u64,
}

impl Default for PerceptionSettings {
    fn default() -> Self {
        Self {
            language: "es".into(),
            audio_max_mb: 25,
            image_max_mb: 20,
        }
    }
}

/// Create a registry with every capability, built once at startup.
pub fn default_registry(
    store: Arc<InventoryStore>,
    perception: Arc<dyn Perception>,
    settings: &PerceptionSettings,
    events: Option<Arc<EventBus>>,
) -> ToolRegistry {
    let mut apply = ApplyOperationTool::new(store.clone());
    if let Some(events) = events {
        apply = apply.with_events(events);
    }

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(LookupTool::new(store.clone())));
    registry.register(Box::new(apply));
    registry.register(Box::new(RestockSuggestionTool::new(store)));
    registry.register(Box::new(TranscribeAudioTool::new(
        perception.clone(),
        settings.language.clone(),
        settings.audio_max_mb,
    )));
    registry.register(Box::new(ProcessImageTool::new(perception, settings.image_max_mb)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use despensa_core::error::PerceptionError;
    use despensa_core::tool::{Capability, ToolCall};
    use std::path::Path;

    struct Silent;

    #[async_trait]
    impl Perception for Silent {
        fn name(&self) -> &str {
            "silent"
        }
        async fn transcribe(&self, _: &Path, _: &str) -> Result<String, PerceptionError> {
            Ok(String::new())
        }
        async fn describe_image(&self, _: &Path, _: &str, _: &str) -> Result<String, PerceptionError> {
            Ok(String::new())
        }
    }

    #[test]
    fn registry_has_every_capability() {
        let registry = default_registry(
            Arc::new(InventoryStore::new()),
            Arc::new(Silent),
            &PerceptionSettings::default(),
            None,
        );
        assert_eq!(registry.capabilities(), Capability::ALL.to_vec());
    }

    #[tokio::test]
    async fn registry_dispatches_by_name() {
        let store = Arc::new(InventoryStore::from_items([(
            "leche",
            despensa_core::inventory::StockStatus::Low,
        )]));
        let registry = default_registry(store, Arc::new(Silent), &PerceptionSettings::default(), None);

        let call = ToolCall {
            id: "call_1".into(),
            name: "restock_suggestion".into(),
            arguments: serde_json::json!({}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert_eq!(result.call_id, "call_1");
        assert!(result.output.contains("leche"));

        let unknown = ToolCall {
            id: "call_2".into(),
            name: "shell".into(),
            arguments: serde_json::json!({}),
        };
        assert!(registry.execute(&unknown).await.is_err());
    }
}
