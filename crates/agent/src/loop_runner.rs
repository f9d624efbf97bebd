//! The Loop Controller: Agent Step and Dispatcher wired into a bounded cycle.
//!
//! ```text
//! STEP ──► ROUTE ──Continue──► (dispatch) ──► STEP
//!            │
//!            └──Stop──► DONE
//! ```

use despensa_core::event::EventBus;
use despensa_core::media::PendingMedia;
use despensa_core::message::{Conversation, Message};
use despensa_core::provider::Provider;
use despensa_core::tool::ToolRegistry;
use despensa_core::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, Route, route};
use crate::prompt::media_only_turn;
use crate::step::AgentStep;

/// Default cap on Agent Steps per interaction.
pub const DEFAULT_MAX_ITERATIONS: u32 = 8;

/// What the user supplied for one interaction.
#[derive(Debug, Clone, Default)]
pub struct UserInput {
    pub text: Option<String>,
    pub media: Option<PathBuf>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            media: None,
        }
    }

    pub fn media(path: impl Into<PathBuf>) -> Self {
        Self {
            text: None,
            media: Some(path.into()),
        }
    }

    pub fn with_media(mut self, path: impl Into<PathBuf>) -> Self {
        self.media = Some(path.into());
        self
    }
}

/// The outcome of one completed interaction.
#[derive(Debug, Clone)]
pub struct Interaction {
    /// Text of the final Agent turn
    pub reply: String,
    /// The caller's context extended with every turn of this interaction
    pub conversation: Conversation,
    /// Number of Agent Steps taken
    pub steps: u32,
}

enum LoopState {
    Step(Conversation),
    Route(Conversation),
    Done(Conversation),
}

pub struct AgentLoop {
    step: AgentStep,
    dispatcher: Dispatcher,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            step: AgentStep::new(provider, model, tools.clone(), event_bus.clone()),
            dispatcher: Dispatcher::new(tools, event_bus),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the maximum number of Agent Steps per interaction.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.step = self.step.with_temperature(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.step = self.step.with_max_tokens(max_tokens);
        self
    }

    /// Run one interaction.
    ///
    /// The caller's `context` is never modified. On success the returned
    /// [`Interaction`] carries the extended conversation; on failure the
    /// caller still holds the prior context. Capability failures never
    /// surface here: only oracle failure and [`Error::IterationLimit`] do.
    pub async fn run(&self, context: &Conversation, input: UserInput) -> Result<Interaction> {
        let media = input
            .media
            .as_ref()
            .map(|path| PendingMedia::new(path.clone(), context.len()));

        let opening = match (&input.text, &media) {
            (Some(text), _) => context.clone().with_message(Message::user(text.clone())),
            (None, Some(media)) => context.clone().with_message(Message::user(media_only_turn(media))),
            (None, None) => context.clone(),
        };

        info!(
            conversation_id = %context.id,
            turns = context.len(),
            media = ?media.as_ref().map(|m| m.kind),
            "Processing interaction"
        );

        let mut steps = 0u32;
        let mut state = LoopState::Step(opening);

        loop {
            state = match state {
                LoopState::Step(current) => {
                    if steps >= self.max_iterations {
                        warn!(
                            conversation_id = %current.id,
                            limit = self.max_iterations,
                            "Iteration limit reached without a final answer"
                        );
                        return Err(Error::IterationLimit {
                            limit: self.max_iterations,
                            conversation: Box::new(current),
                        });
                    }
                    steps += 1;
                    debug!(conversation_id = %current.id, iteration = steps, "Agent step");
                    LoopState::Route(self.step.step(&current, media.as_ref()).await?)
                }
                LoopState::Route(current) => match route(&current) {
                    Route::Continue(calls) => {
                        debug!(calls = calls.len(), "Dispatching capability calls");
                        LoopState::Step(self.dispatcher.dispatch(current, &calls).await)
                    }
                    Route::Stop => LoopState::Done(current),
                },
                LoopState::Done(conversation) => {
                    let reply = conversation
                        .last()
                        .map(|turn| turn.content.clone())
                        .unwrap_or_default();
                    info!(conversation_id = %conversation.id, steps, "Interaction complete");
                    return Ok(Interaction {
                        reply,
                        conversation,
                        steps,
                    });
                }
            };
        }
    }
}
