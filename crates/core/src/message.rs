//! Turn and Conversation domain types.
//!
//! These are the value objects that flow through the entire system:
//! a user sends a message → the channel receives it → the agent loop appends
//! turns → the oracle sees them in insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (one per end-user identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The fixed decision-policy instruction
    System,
    /// The end user (or a synthesized user directive)
    User,
    /// The oracle's output: a final answer or capability requests
    Agent,
    /// The result of one capability invocation
    Tool,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Capability calls requested by the agent (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// If this is a tool result, which capability produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create an agent turn carrying a final answer.
    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content.into())
    }

    /// Create an agent turn requesting capability calls.
    pub fn agent_with_calls(content: impl Into<String>, calls: Vec<MessageToolCall>) -> Self {
        let mut msg = Self::new(Role::Agent, content.into());
        msg.tool_calls = calls;
        msg
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    /// Create a tool result turn tagged with the originating call.
    pub fn tool_result(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::new(Role::Tool, content.into());
        msg.tool_name = Some(tool_name.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Whether this is an agent turn with pending capability requests.
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Agent && !self.tool_calls.is_empty()
    }
}

/// A capability call embedded in an agent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this call (assigned by the oracle)
    pub id: String,

    /// Name of the capability to invoke
    pub name: String,

    /// Arguments as a JSON string
    pub arguments: String,
}

/// An ordered, append-only sequence of turns.
///
/// Appending consumes the conversation and returns the extended one, so a
/// context handed to the agent loop is never mutated behind the caller's back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered turns
    messages: Vec<Message>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        Self::with_id(ConversationId::new())
    }

    /// Create an empty conversation with a known identifier.
    pub fn with_id(id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Return this conversation extended by one turn.
    ///
    /// At most one system turn exists: appending a system turn when one is
    /// already present replaces the existing one in place.
    pub fn with_message(mut self, message: Message) -> Self {
        self.updated_at = Utc::now();
        if message.role == Role::System
            && let Some(pos) = self.messages.iter().position(|m| m.role == Role::System)
        {
            self.messages[pos] = message;
            return self;
        }
        self.messages.push(message);
        self
    }

    /// All turns in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent turn.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// The system turn, if one has been recorded.
    pub fn system_turn(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.role == Role::System)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get the total token count estimate (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.content.len() / 4).sum()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Compré leche");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Compré leche");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn appending_keeps_insertion_order() {
        let conv = Conversation::new()
            .with_message(Message::user("uno"))
            .with_message(Message::agent("dos"))
            .with_message(Message::user("tres"));
        let contents: Vec<_> = conv.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["uno", "dos", "tres"]);
        assert_eq!(conv.last().unwrap().content, "tres");
    }

    #[test]
    fn appending_leaves_the_original_untouched() {
        let original = Conversation::new().with_message(Message::user("hola"));
        let extended = original.clone().with_message(Message::agent("¡hola!"));
        assert_eq!(original.len(), 1);
        assert_eq!(extended.len(), 2);
        assert_eq!(original.id, extended.id);
    }

    #[test]
    fn only_one_system_turn() {
        let conv = Conversation::new()
            .with_message(Message::system("v1"))
            .with_message(Message::user("hola"))
            .with_message(Message::system("v2"));
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.system_turn().unwrap().content, "v2");
        assert_eq!(conv.messages()[0].role, Role::System);
    }

    #[test]
    fn tool_result_carries_name_and_call_id() {
        let msg = Message::tool_result("lookup", "call_1", "leche: BAJO");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_name.as_deref(), Some("lookup"));
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn has_tool_calls_only_for_agent_turns() {
        let call = MessageToolCall {
            id: "call_1".into(),
            name: "lookup".into(),
            arguments: "{}".into(),
        };
        assert!(Message::agent_with_calls("", vec![call]).has_tool_calls());
        assert!(!Message::agent("listo").has_tool_calls());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user("Test message");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "Test message");
        assert_eq!(deserialized.role, Role::User);
    }

    #[test]
    fn conversation_token_estimate() {
        // 20 chars ≈ 5 tokens
        let conv = Conversation::new().with_message(Message::user("12345678901234567890"));
        assert_eq!(conv.estimated_tokens(), 5);
    }
}
