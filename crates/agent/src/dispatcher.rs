//! The Dispatcher: routing after each Agent Step, and capability execution.

use chrono::Utc;
use despensa_core::event::{DomainEvent, EventBus};
use despensa_core::message::{Conversation, Message, MessageToolCall};
use despensa_core::tool::{ToolCall, ToolRegistry};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// What to do after an Agent Step.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// The last turn requested these calls; execute them and step again.
    Continue(Vec<MessageToolCall>),
    /// The last turn is a final answer.
    Stop,
}

/// Decide from the last turn alone.
pub fn route(context: &Conversation) -> Route {
    match context.last() {
        Some(turn) if turn.has_tool_calls() => Route::Continue(turn.tool_calls.clone()),
        _ => Route::Stop,
    }
}

/// Executes requested calls and records their results.
pub struct Dispatcher {
    tools: Arc<ToolRegistry>,
    event_bus: Arc<EventBus>,
}

impl Dispatcher {
    pub fn new(tools: Arc<ToolRegistry>, event_bus: Arc<EventBus>) -> Self {
        Self { tools, event_bus }
    }

    /// Run every call and append one ToolResult turn per call, tagged with
    /// its call id, in request order. Never fails: capability errors
    /// become result text.
    pub async fn dispatch(&self, context: Conversation, calls: &[MessageToolCall]) -> Conversation {
        let mut context = context;
        for call in calls {
            let output = self.execute(call).await;
            context = context.with_message(Message::tool_result(&call.name, &call.id, output));
        }
        context
    }

    async fn execute(&self, call: &MessageToolCall) -> String {
        let start = Instant::now();
        let outcome = match ToolCall::from_message_call(call) {
            Ok(tool_call) => self.tools.execute(&tool_call).await,
            Err(e) => Err(e),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (success, output) = match outcome {
            Ok(result) => {
                debug!(tool = %call.name, success = result.success, duration_ms, "Capability executed");
                (result.success, result.output)
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Capability call rejected");
                (false, format!("Error: {e}"))
            }
        };

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        output
    }
}
