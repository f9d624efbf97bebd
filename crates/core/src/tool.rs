//! Tool trait: the abstraction over agent capabilities.
//!
//! The set of capabilities is closed: the oracle names one by string, the
//! name is resolved to a [`Capability`] variant, and the registry maps each
//! variant to exactly one implementation built at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;

/// Every capability the agent may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Query the inventory store
    Lookup,
    /// Mutate the inventory store from a free-form description
    ApplyOperation,
    /// List items that need restocking
    RestockSuggestion,
    /// Convert an audio artifact into a transcript
    TranscribeAudio,
    /// Convert an image artifact into normalized purchase lines
    ProcessImage,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Lookup,
        Capability::ApplyOperation,
        Capability::RestockSuggestion,
        Capability::TranscribeAudio,
        Capability::ProcessImage,
    ];

    /// Capabilities offered on every agent step.
    pub const ALWAYS_AVAILABLE: [Capability; 3] = [
        Capability::Lookup,
        Capability::ApplyOperation,
        Capability::RestockSuggestion,
    ];

    /// The wire name the oracle uses for this capability.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Lookup => "lookup",
            Capability::ApplyOperation => "apply_operation",
            Capability::RestockSuggestion => "restock_suggestion",
            Capability::TranscribeAudio => "transcribe_audio",
            Capability::ProcessImage => "process_image",
        }
    }

    /// Whether this capability wraps an external perception service.
    pub fn is_perception(&self) -> bool {
        matches!(self, Capability::TranscribeAudio | Capability::ProcessImage)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Capability {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| ToolError::NotFound(s.to_string()))
    }
}

/// A request to execute a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the oracle's call id)
    pub id: String,

    /// Name of the capability to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Decode a call embedded in an agent turn.
    ///
    /// An empty argument string is read as `{}`.
    pub fn from_message_call(call: &MessageToolCall) -> Result<Self, ToolError> {
        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| {
                ToolError::InvalidArguments(format!("'{}' arguments are not valid JSON: {e}", call.name))
            })?
        };
        Ok(Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        })
    }
}

/// The result of a capability execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the capability executed successfully
    pub success: bool,

    /// The text handed back to the oracle
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: false,
            output: output.into(),
        }
    }
}

/// The core Tool trait.
///
/// Each capability implements this trait and is registered in the
/// [`ToolRegistry`] under its [`Capability`] variant.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which capability this tool implements.
    fn capability(&self) -> Capability;

    /// A description of what this tool does (sent to the oracle).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// The unique name of this tool.
    fn name(&self) -> &'static str {
        self.capability().name()
    }

    /// Convert this tool into a ToolDefinition for sending to the oracle.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available capabilities.
///
/// The agent uses it to:
/// 1. Get the definitions offered to the oracle on a given step
/// 2. Resolve and execute calls the oracle requests
pub struct ToolRegistry {
    tools: BTreeMap<Capability, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool for the same capability.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.capability(), tool);
    }

    /// Get a tool by capability.
    pub fn get(&self, capability: Capability) -> Option<&dyn Tool> {
        self.tools.get(&capability).map(|t| t.as_ref())
    }

    /// Definitions for a subset of capabilities; unregistered ones are skipped.
    pub fn definitions_for(&self, capabilities: &[Capability]) -> Vec<ToolDefinition> {
        capabilities
            .iter()
            .filter_map(|c| self.tools.get(c))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Execute a call. Unknown names are rejected with [`ToolError::NotFound`].
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let capability: Capability = call.name.parse()?;
        let tool = self
            .tools
            .get(&capability)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// List all registered capabilities.
    pub fn capabilities(&self) -> Vec<Capability> {
        self.tools.keys().copied().collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes the `item_name` argument back.
    struct EchoLookup;

    #[async_trait]
    impl Tool for EchoLookup {
        fn capability(&self) -> Capability {
            Capability::Lookup
        }
        fn description(&self) -> &str {
            "Echoes back the item name"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "item_name": { "type": "string" } }
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            let text = arguments["item_name"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("Missing 'item_name' argument".into()))?;
            Ok(ToolResult::ok(text))
        }
    }

    #[test]
    fn capability_names_roundtrip() {
        for cap in Capability::ALL {
            assert_eq!(cap.name().parse::<Capability>().unwrap(), cap);
        }
    }

    #[test]
    fn unknown_capability_is_a_typed_error() {
        let err = "delete_everything".parse::<Capability>().unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "delete_everything"));
    }

    #[test]
    fn perception_capabilities() {
        assert!(Capability::TranscribeAudio.is_perception());
        assert!(Capability::ProcessImage.is_perception());
        assert!(Capability::ALWAYS_AVAILABLE.iter().all(|c| !c.is_perception()));
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoLookup));
        assert!(registry.get(Capability::Lookup).is_some());
        assert!(registry.get(Capability::ProcessImage).is_none());
        assert_eq!(registry.capabilities(), vec![Capability::Lookup]);
    }

    #[test]
    fn definitions_for_skips_unregistered() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoLookup));
        let defs = registry.definitions_for(&[Capability::Lookup, Capability::TranscribeAudio]);
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "lookup");
    }

    #[tokio::test]
    async fn registry_execute_tags_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoLookup));

        let call = ToolCall {
            id: "call_7".into(),
            name: "lookup".into(),
            arguments: serde_json::json!({"item_name": "leche"}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "leche");
        assert_eq!(result.call_id, "call_7");
    }

    #[tokio::test]
    async fn registry_execute_unknown_name() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: serde_json::json!({}),
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn registry_execute_known_but_unregistered() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "process_image".into(),
            arguments: serde_json::json!({}),
        };
        assert!(matches!(
            registry.execute(&call).await.unwrap_err(),
            ToolError::NotFound(_)
        ));
    }

    #[test]
    fn decode_message_call_arguments() {
        let call = MessageToolCall {
            id: "call_1".into(),
            name: "lookup".into(),
            arguments: r#"{"item_name":"pan"}"#.into(),
        };
        let decoded = ToolCall::from_message_call(&call).unwrap();
        assert_eq!(decoded.arguments["item_name"], "pan");

        let empty = MessageToolCall {
            arguments: "  ".into(),
            ..call.clone()
        };
        assert!(ToolCall::from_message_call(&empty).unwrap().arguments.is_object());

        let broken = MessageToolCall {
            arguments: "{not json".into(),
            ..call
        };
        assert!(matches!(
            ToolCall::from_message_call(&broken).unwrap_err(),
            ToolError::InvalidArguments(_)
        ));
    }
}
