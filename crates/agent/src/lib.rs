//! The agent decision loop for Despensa.
//!
//! One interaction runs a **Step → Route** cycle:
//!
//! 1. **Step**: assemble the turns (system instruction, media directive,
//!    history), offer the capabilities allowed this step, and append the
//!    oracle's answer as one Agent turn
//! 2. **Route**: if that turn requests capabilities, execute them, append
//!    their results and step again; otherwise the interaction is done
//!
//! The cycle is bounded by a maximum number of steps.

pub mod dispatcher;
pub mod loop_runner;
pub mod prompt;
pub mod step;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{Dispatcher, Route, route};
pub use loop_runner::{AgentLoop, DEFAULT_MAX_ITERATIONS, Interaction, UserInput};
pub use prompt::SYSTEM_INSTRUCTION;
pub use step::AgentStep;
