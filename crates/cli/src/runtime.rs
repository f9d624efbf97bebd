//! Wiring shared by the commands: store, backends, registry and agent loop,
//! each built once from the loaded configuration.

use despensa_agent::AgentLoop;
use despensa_config::AppConfig;
use despensa_core::event::EventBus;
use despensa_core::inventory::InventoryStore;
use despensa_tools::{PerceptionSettings, default_registry};
use std::sync::Arc;

pub struct Runtime {
    pub store: Arc<InventoryStore>,
    pub agent: Arc<AgentLoop>,
    pub event_bus: Arc<EventBus>,
}

/// The pantry seeded from `[inventory]`.
pub fn seeded_store(config: &AppConfig) -> Result<InventoryStore, Box<dyn std::error::Error>> {
    Ok(InventoryStore::from_items(config.inventory.items()?))
}

pub fn perception_settings(config: &AppConfig) -> PerceptionSettings {
    PerceptionSettings {
        language: config.perception.language.clone(),
        audio_max_mb: config.perception.audio_max_mb,
        image_max_mb: config.perception.image_max_mb,
    }
}

impl Runtime {
    pub fn from_config(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(seeded_store(config)?);
        let backends = despensa_providers::build_from_config(config)?;
        let event_bus = Arc::new(EventBus::default());

        let tools = Arc::new(default_registry(
            store.clone(),
            backends.perception,
            &perception_settings(config),
            Some(event_bus.clone()),
        ));

        let agent = AgentLoop::new(backends.oracle, &config.model, tools, event_bus.clone())
            .with_max_iterations(config.agent.max_iterations)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens);

        Ok(Self {
            store,
            agent: Arc::new(agent),
            event_bus,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use despensa_core::inventory::StockStatus;

    #[test]
    fn default_seed_is_the_sample_pantry() {
        let store = seeded_store(&AppConfig::default()).unwrap();
        assert_eq!(store.len(), 7);
        assert_eq!(store.get("leche"), Some(StockStatus::Low));
        assert_eq!(store.get("huevos"), Some(StockStatus::High));
    }

    #[test]
    fn settings_follow_perception_section() {
        let mut config = AppConfig::default();
        config.perception.language = "en".into();
        config.perception.image_max_mb = 5;
        let settings = perception_settings(&config);
        assert_eq!(settings.language, "en");
        assert_eq!(settings.image_max_mb, 5);
        assert_eq!(settings.audio_max_mb, 25);
    }

    #[test]
    fn missing_api_key_is_reported() {
        let config = AppConfig::default();
        assert!(Runtime::from_config(&config).is_err());
    }

    #[test]
    fn builds_with_api_key() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let runtime = Runtime::from_config(&config).unwrap();
        assert_eq!(runtime.store.len(), 7);
    }
}
