//! Shared test helpers: a scripted oracle and a counting perception stub.

use async_trait::async_trait;
use despensa_core::error::{PerceptionError, ProviderError};
use despensa_core::message::{Message, MessageToolCall};
use despensa_core::perception::Perception;
use despensa_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A mock oracle that returns a sequence of scripted responses and records
/// every request it receives.
///
/// Panics if more calls are made than responses provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that returns a single text response (no tool calls).
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![make_text_response(text)])
    }

    /// A provider that first requests calls, then answers.
    pub fn tool_then_answer(calls: Vec<MessageToolCall>, answer: &str) -> Self {
        Self::new(vec![make_tool_call_response(calls), make_text_response(answer)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The requests received so far, in order.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        let index = requests.len();

        if index >= responses.len() {
            panic!(
                "SequentialMockProvider: no more responses (call #{index}, have {})",
                responses.len()
            );
        }

        requests.push(request);
        Ok(responses[index].clone())
    }
}

/// An oracle that always fails at the network level.
pub struct UnreachableProvider;

#[async_trait]
impl Provider for UnreachableProvider {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::Network("connection refused".into()))
    }
}

/// A perception backend that counts calls and answers with fixed text.
pub struct CountingPerception {
    pub transcript: String,
    pub description: String,
    calls: AtomicUsize,
}

impl CountingPerception {
    pub fn new(transcript: &str, description: &str) -> Self {
        Self {
            transcript: transcript.into(),
            description: description.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Perception for CountingPerception {
    fn name(&self) -> &str {
        "counting"
    }

    async fn transcribe(&self, _path: &Path, _language: &str) -> Result<String, PerceptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcript.clone())
    }

    async fn describe_image(
        &self,
        _path: &Path,
        _mime_type: &str,
        _instruction: &str,
    ) -> Result<String, PerceptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.description.clone())
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// A final-answer response.
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::agent(text),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// A response requesting capability calls.
pub fn make_tool_call_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::agent_with_calls("", calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// Build a capability call with id `call_<name>`.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}
