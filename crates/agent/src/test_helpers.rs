//! Scripted collaborators for agent and session tests.

use async_trait::async_trait;
use heimdall_core::approval::{ApprovalDecision, ApprovalRequest, Approver};
use heimdall_core::error::ProviderError;
use heimdall_core::message::{Message, MessageToolCall};
use heimdall_core::operator::{Operator, OperatorEvent};
use heimdall_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next result in the queue and records
/// the request. Panics if more calls are made than results provided.
pub struct SequentialMockProvider {
    results: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies given as raw decision JSON strings.
    pub fn replies(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| make_text_response(t)).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

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
        let call = requests.len();
        requests.push(request);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("SequentialMockProvider: no more responses (call #{call})"))
    }
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response carrying native tool calls.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>, thought: &str) -> ProviderResponse {
    let mut response = make_text_response(thought);
    response.message.tool_calls = tool_calls;
    response
}

/// Helper to create a tool call.
pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// Decision JSON that invokes a tool.
pub fn invoke_json(tool: &str, parameters: serde_json::Value, thought: &str) -> String {
    serde_json::json!({
        "thought": thought,
        "tool_to_use": tool,
        "tool_parameters": parameters,
        "response_to_user": null,
    })
    .to_string()
}

/// Decision JSON that answers the operator.
pub fn answer_json(text: &str) -> String {
    serde_json::json!({
        "thought": "answering",
        "tool_to_use": null,
        "tool_parameters": null,
        "response_to_user": text,
    })
    .to_string()
}

/// An operator driven by queued input lines and approval decisions.
///
/// Input runs out with `None` (end of input). When the decision queue is
/// empty every request is approved.
#[derive(Default)]
pub struct ScriptedOperator {
    inputs: Mutex<VecDeque<String>>,
    decisions: Mutex<VecDeque<ApprovalDecision>>,
    requests: Mutex<Vec<ApprovalRequest>>,
    events: Mutex<Vec<OperatorEvent>>,
}

impl ScriptedOperator {
    pub fn new(inputs: &[&str]) -> Self {
        Self {
            inputs: Mutex::new(inputs.iter().map(|s| s.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn with_decisions(self, decisions: Vec<ApprovalDecision>) -> Self {
        *self.decisions.lock().unwrap() = decisions.into();
        self
    }

    pub fn approval_requests(&self) -> Vec<ApprovalRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<OperatorEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OperatorEvent::Answer(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Approver for ScriptedOperator {
    async fn review(&self, request: &ApprovalRequest) -> ApprovalDecision {
        self.requests.lock().unwrap().push(request.clone());
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ApprovalDecision::Approve)
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn read_input(&self) -> Option<String> {
        self.inputs.lock().unwrap().pop_front()
    }

    fn notify(&self, event: &OperatorEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
