//! Oracle and perception backends for Despensa.
//!
//! The oracle implements `despensa_core::Provider`; the perception backend
//! implements `despensa_core::Perception`. Both speak the OpenAI HTTP API.

pub mod openai_compat;
pub mod openai_perception;
pub mod setup;

pub use openai_compat::OpenAiCompatProvider;
pub use openai_perception::OpenAiPerception;
pub use setup::{Backends, build_from_config};
