//! The Agent Step: one oracle consultation.
//!
//! Given the conversation and the optional pending media, the step selects
//! which capabilities to offer, assembles the turns the oracle sees, and
//! appends the oracle's answer as exactly one new Agent turn.

use chrono::Utc;
use despensa_core::event::{DomainEvent, EventBus};
use despensa_core::media::PendingMedia;
use despensa_core::message::{Conversation, Message, Role};
use despensa_core::provider::{Provider, ProviderRequest};
use despensa_core::tool::{Capability, ToolRegistry};
use despensa_core::Result;
use std::sync::Arc;
use tracing::debug;

use crate::prompt::{SYSTEM_INSTRUCTION, media_directive};

/// Whether an Agent turn recorded during the current interaction already
/// requested a perception capability.
pub fn media_processed(context: &Conversation, media: &PendingMedia) -> bool {
    context
        .messages()
        .iter()
        .skip(media.turn_offset)
        .filter(|m| m.role == Role::Agent)
        .flat_map(|m| m.tool_calls.iter())
        .any(|call| {
            call.name
                .parse::<Capability>()
                .is_ok_and(|c| c.is_perception())
        })
}

/// Capabilities offered this step: the always-available set, plus the
/// perception capability matching unprocessed media.
pub fn offered_capabilities(unprocessed: Option<&PendingMedia>) -> Vec<Capability> {
    let mut offered = Capability::ALWAYS_AVAILABLE.to_vec();
    if let Some(media) = unprocessed {
        offered.push(media.kind.capability());
    }
    offered
}

/// The turn sequence sent to the oracle: one System turn first, then the
/// media directive (if any), then the rest of the history in order.
pub fn assemble(context: &Conversation, unprocessed: Option<&PendingMedia>) -> Vec<Message> {
    let system = context
        .system_turn()
        .cloned()
        .unwrap_or_else(|| Message::system(SYSTEM_INSTRUCTION));

    let mut turns = Vec::with_capacity(context.len() + 2);
    turns.push(system);
    if let Some(media) = unprocessed {
        turns.push(Message::user(media_directive(media)));
    }
    turns.extend(
        context
            .messages()
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned(),
    );
    turns
}

pub struct AgentStep {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    event_bus: Arc<EventBus>,
}

impl AgentStep {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            temperature: 0.0,
            max_tokens: None,
            event_bus,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Consult the oracle once and return `context` plus the new Agent turn.
    ///
    /// Oracle failure is the only error; the input context is untouched.
    pub async fn step(
        &self,
        context: &Conversation,
        media: Option<&PendingMedia>,
    ) -> Result<Conversation> {
        let unprocessed = media.filter(|m| !media_processed(context, m));
        let offered = offered_capabilities(unprocessed);

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: assemble(context, unprocessed),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.definitions_for(&offered),
        };

        debug!(
            conversation_id = %context.id,
            turns = request.messages.len(),
            offered = ?offered,
            "Consulting oracle"
        );

        let response = self.provider.complete(request).await?;

        self.event_bus.publish(DomainEvent::ResponseGenerated {
            conversation_id: context.id.to_string(),
            model: response.model.clone(),
            tokens_used: response.usage.as_ref().map_or(0, |u| u.total_tokens),
            tool_calls: response.message.tool_calls.len(),
            timestamp: Utc::now(),
        });

        let mut turn = response.message;
        turn.role = Role::Agent;
        Ok(context.clone().with_message(turn))
    }
}
