//! Inventory capabilities: `lookup`, `apply_operation`, `restock_suggestion`.
//!
//! Each capability operates on an injected [`InventoryStore`] and always
//! answers with a text report. Absence of an item is a normal result.

use async_trait::async_trait;
use chrono::Utc;
use despensa_core::error::ToolError;
use despensa_core::event::{DomainEvent, EventBus};
use despensa_core::inventory::{InventoryStore, OperationKind, StatusChange, StockStatus};
use despensa_core::tool::{Capability, Tool, ToolResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Sentinel returned by `restock_suggestion` when nothing is at BAJO.
pub const NOTHING_URGENT: &str = "Nada urgente: no hay productos en nivel BAJO.";

/// Report items whose name contains `filter`, or the whole store.
pub fn lookup(store: &InventoryStore, filter: Option<&str>) -> String {
    let filter = filter.map(str::trim).filter(|f| !f.is_empty());
    let items = match filter {
        Some(f) => store.matching(f),
        None => store.snapshot(),
    };

    if items.is_empty() {
        return match filter {
            Some(f) => format!("El ítem '{f}' no está registrado en la despensa."),
            None => "La despensa está vacía.".to_string(),
        };
    }

    let mut report = String::from("Estado de la despensa:");
    for (name, status) in items {
        report.push_str(&format!("\n- {name}: {status}"));
    }
    report
}

/// Apply an operation described in free text and report what changed.
///
/// Existing keys appearing in `description` are set to the kind's target
/// status. When nothing matches, the operation is accepted and logged as
/// unresolved; no item is created.
pub fn apply_operation(store: &InventoryStore, description: &str, kind: OperationKind) -> String {
    describe_operation(description, kind, &store.apply(description, kind))
}

/// Report text for the changes one operation produced.
pub fn describe_operation(description: &str, kind: OperationKind, changes: &[StatusChange]) -> String {
    if changes.is_empty() {
        info!(kind = kind.label(), description, "Unresolved inventory operation");
        return format!(
            "Operación {} registrada, pero ningún producto de la despensa coincide con '{}'. No se modificó el inventario.",
            kind.label(),
            description.trim()
        );
    }

    let mut report = format!("✅ Operación {} aplicada:", kind.label());
    for change in changes {
        report.push_str(&format!(
            "\n- {}: {} → {}",
            change.item, change.previous, change.current
        ));
    }
    report
}

/// Shopping list of every item at BAJO, or [`NOTHING_URGENT`].
pub fn restock_suggestion(store: &InventoryStore) -> String {
    let low = store.with_status(StockStatus::Low);
    if low.is_empty() {
        return NOTHING_URGENT.to_string();
    }

    let mut report = String::from("Lista de compras sugerida:");
    for item in low {
        report.push_str(&format!("\n- {item}"));
    }
    report
}

/// Query the current status of pantry items.
pub struct LookupTool {
    store: Arc<InventoryStore>,
}

impl LookupTool {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for LookupTool {
    fn capability(&self) -> Capability {
        Capability::Lookup
    }

    fn description(&self) -> &str {
        "Consulta el estado (BAJO, MEDIO, ALTO) de los productos de la despensa. \
         Sin argumentos devuelve todo el inventario."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "item_name": {
                    "type": "string",
                    "description": "Nombre (o parte del nombre) del producto, ej: 'leche'"
                }
            }
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let filter = arguments["item_name"].as_str();
        debug!(filter = ?filter, "Inventory lookup");
        Ok(ToolResult::ok(lookup(&self.store, filter)))
    }
}

/// Register an acquisition, depletion or correction.
pub struct ApplyOperationTool {
    store: Arc<InventoryStore>,
    events: Option<Arc<EventBus>>,
}

impl ApplyOperationTool {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self {
            store,
            events: None,
        }
    }

    /// Publish an `InventoryChanged` event for every status change.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }
}

#[async_trait]
impl Tool for ApplyOperationTool {
    fn capability(&self) -> Capability {
        Capability::ApplyOperation
    }

    fn description(&self) -> &str {
        "Actualiza la despensa a partir de una descripción en lenguaje natural. \
         kind=IN cuando el usuario compró o agregó (queda ALTO), OUT cuando se acabó \
         o lo consumió (queda BAJO), UPDATE cuando corrige a un nivel intermedio (queda MEDIO)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "Descripción de la operación, ej: 'Compré leche y pan'"
                },
                "kind": {
                    "type": "string",
                    "enum": ["IN", "OUT", "UPDATE"],
                    "description": "Tipo de operación"
                }
            },
            "required": ["description", "kind"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let description = arguments["description"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'description' argument".into()))?;
        let kind_arg = arguments["kind"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'kind' argument".into()))?;

        let kind: OperationKind = match kind_arg.parse() {
            Ok(kind) => kind,
            Err(_) => {
                return Ok(ToolResult::failed(format!(
                    "Error: El tipo de operación '{kind_arg}' no es válido. Use: IN, OUT o UPDATE"
                )));
            }
        };

        let changes = self.store.apply(description, kind);
        let report = describe_operation(description, kind, &changes);

        if let Some(events) = &self.events {
            for change in changes.into_iter().filter(|c| c.previous != c.current) {
                events.publish(DomainEvent::InventoryChanged {
                    item: change.item,
                    previous: change.previous,
                    current: change.current,
                    timestamp: Utc::now(),
                });
            }
        }

        Ok(ToolResult::ok(report))
    }
}

/// Suggest what to buy: every item at BAJO.
pub struct RestockSuggestionTool {
    store: Arc<InventoryStore>,
}

impl RestockSuggestionTool {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RestockSuggestionTool {
    fn capability(&self) -> Capability {
        Capability::RestockSuggestion
    }

    fn description(&self) -> &str {
        "Devuelve la lista de compras: todos los productos en nivel BAJO. \
         Úsala cuando el usuario pregunte qué le falta o qué debe comprar."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(restock_suggestion(&self.store)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pantry() -> Arc<InventoryStore> {
        Arc::new(InventoryStore::from_items([
            ("leche", StockStatus::Low),
            ("pan", StockStatus::Medium),
            ("arroz", StockStatus::Low),
            ("huevos", StockStatus::High),
        ]))
    }

    #[test]
    fn lookup_single_item() {
        let store = pantry();
        let report = lookup(&store, Some("Leche"));
        assert!(report.contains("leche: BAJO"));
        assert!(!report.contains("pan"));
    }

    #[test]
    fn lookup_not_found() {
        let report = lookup(&pantry(), Some("café"));
        assert_eq!(report, "El ítem 'café' no está registrado en la despensa.");
    }

    #[test]
    fn lookup_everything_and_empty_store() {
        let report = lookup(&pantry(), None);
        for item in ["leche", "pan", "arroz", "huevos"] {
            assert!(report.contains(item));
        }
        assert_eq!(lookup(&InventoryStore::new(), None), "La despensa está vacía.");
        assert_eq!(lookup(&pantry(), Some("  ")), lookup(&pantry(), None));
    }

    #[test]
    fn every_kind_sets_its_target_status() {
        let store = pantry();
        for item in store.keys() {
            apply_operation(&store, &format!("compré {item}"), OperationKind::In);
            assert!(lookup(&store, Some(&item)).contains(&format!("{item}: ALTO")));
            apply_operation(&store, &format!("se acabó {item}"), OperationKind::Out);
            assert!(lookup(&store, Some(&item)).contains(&format!("{item}: BAJO")));
            apply_operation(&store, &format!("queda algo de {item}"), OperationKind::Update);
            assert!(lookup(&store, Some(&item)).contains(&format!("{item}: MEDIO")));
        }
    }

    #[test]
    fn apply_operation_without_match_keeps_key_set() {
        let store = pantry();
        let before = store.keys();
        let report = apply_operation(&store, "compré yerba", OperationKind::In);
        assert!(report.contains("ningún producto"));
        assert_eq!(store.keys(), before);
    }

    #[test]
    fn apply_operation_reports_transitions() {
        let store = pantry();
        let report = apply_operation(&store, "Compré leche", OperationKind::In);
        assert!(report.contains("leche: BAJO → ALTO"));
    }

    #[test]
    fn restock_lists_exactly_the_low_items() {
        let store = pantry();
        let report = restock_suggestion(&store);
        assert!(report.contains("- arroz"));
        assert!(report.contains("- leche"));
        assert!(!report.contains("pan"));
        assert!(!report.contains("huevos"));
    }

    #[test]
    fn restock_sentinel_when_nothing_low() {
        let store = InventoryStore::from_items([("pan", StockStatus::Medium)]);
        assert_eq!(restock_suggestion(&store), NOTHING_URGENT);
        assert_eq!(restock_suggestion(&InventoryStore::new()), NOTHING_URGENT);
    }

    #[tokio::test]
    async fn apply_tool_rejects_invalid_kind_as_text() {
        let tool = ApplyOperationTool::new(pantry());
        let result = tool
            .execute(serde_json::json!({"description": "compré leche", "kind": "BUY"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("IN, OUT o UPDATE"));
    }

    #[tokio::test]
    async fn apply_tool_missing_description_is_invalid_arguments() {
        let tool = ApplyOperationTool::new(pantry());
        let err = tool
            .execute(serde_json::json!({"kind": "IN"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn apply_tool_publishes_inventory_changes() {
        let store = pantry();
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let tool = ApplyOperationTool::new(store.clone()).with_events(bus);

        let result = tool
            .execute(serde_json::json!({"description": "compré leche", "kind": "in"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(store.get("leche"), Some(StockStatus::High));

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::InventoryChanged { item, previous, current, .. } => {
                assert_eq!(item, "leche");
                assert_eq!(*previous, StockStatus::Low);
                assert_eq!(*current, StockStatus::High);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn apply_tool_publishes_only_its_own_changes() {
        let store = pantry();
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let tool = ApplyOperationTool::new(store.clone()).with_events(bus);

        // huevos is already ALTO, so only leche actually changes.
        tool.execute(serde_json::json!({"description": "compré leche y huevos", "kind": "IN"}))
            .await
            .unwrap();
        // An update made outside the tool is not attributed to it.
        store.apply("se acabó el pan", OperationKind::Out);
        tool.execute(serde_json::json!({"description": "compré yerba", "kind": "IN"}))
            .await
            .unwrap();

        let event = rx.try_recv().unwrap();
        assert!(matches!(
            event.as_ref(),
            DomainEvent::InventoryChanged { item, .. } if item == "leche"
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn lookup_tool_without_arguments_reports_all() {
        let tool = LookupTool::new(pantry());
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("huevos: ALTO"));
    }

    #[test]
    fn tools_expose_their_capability_names() {
        let store = pantry();
        assert_eq!(LookupTool::new(store.clone()).name(), "lookup");
        assert_eq!(ApplyOperationTool::new(store.clone()).name(), "apply_operation");
        assert_eq!(RestockSuggestionTool::new(store).name(), "restock_suggestion");
    }
}
