//! The decision step: one structured next action from the session log.
//!
//! The model is asked for a JSON object in the format described by
//! [`prompt::OUTPUT_FORMAT`](crate::prompt::OUTPUT_FORMAT). A reply that does
//! not parse, names an unknown tool or carries arguments that fail the tool's
//! schema is sent back to the model with the error, up to
//! `max_parse_attempts` times. Backend errors are returned straight away.

use crate::prompt;
use async_trait::async_trait;
use heimdall_config::AppConfig;
use heimdall_core::agent::Decision;
use heimdall_core::error::DecisionError;
use heimdall_core::memory::MemoryEntry;
use heimdall_core::message::Message;
use heimdall_core::provider::{Provider, ProviderRequest};
use heimdall_core::tool::ToolSchema;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Produces the next [`Decision`] for a session.
///
/// Implementations hold no per-session state: the same history and catalog
/// always describe the whole question.
#[async_trait]
pub trait Decider: Send + Sync {
    async fn decide(
        &self,
        history: &[MemoryEntry],
        catalog: &[&ToolSchema],
    ) -> Result<Decision, DecisionError>;
}

/// [`Decider`] backed by a reasoning provider.
pub struct DecisionStep {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_parse_attempts: u32,
}

impl DecisionStep {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.5,
            max_tokens: None,
            max_parse_attempts: 3,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, config.resolved_model())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_max_parse_attempts(config.agent.max_parse_attempts)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_parse_attempts(mut self, attempts: u32) -> Self {
        self.max_parse_attempts = attempts.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Decider for DecisionStep {
    async fn decide(
        &self,
        history: &[MemoryEntry],
        catalog: &[&ToolSchema],
    ) -> Result<Decision, DecisionError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(prompt::system_prompt(catalog)));
        messages.extend(prompt::render_history(history));

        let mut last_error = String::new();
        for attempt in 1..=self.max_parse_attempts {
            let mut request = ProviderRequest::new(self.model.clone(), messages.clone());
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;
            request.json_mode = true;

            debug!(
                provider = self.provider.name(),
                model = %self.model,
                attempt,
                messages = request.messages.len(),
                "Requesting decision"
            );
            let response = self.provider.complete(request).await?;

            match parse_decision(&response.message, catalog) {
                Ok(decision) => return Ok(decision),
                Err(reason) => {
                    warn!(attempt, error = %reason, "Model returned a malformed decision");
                    messages.push(Message::assistant(response.message.content.clone()));
                    messages.push(Message::user(format!(
                        "Your previous reply was rejected: {reason}. Reply again with a single \
                         JSON object in the required output format."
                    )));
                    last_error = reason;
                }
            }
        }
        Err(DecisionError::Malformed(last_error))
    }
}

/// The reply format from the model.
#[derive(Debug, Deserialize)]
struct WireDecision {
    #[serde(default)]
    thought: Option<String>,
    #[serde(default)]
    tool_to_use: Option<String>,
    #[serde(default)]
    tool_parameters: Option<Value>,
    #[serde(default)]
    response_to_user: Option<String>,
}

/// Turn a model reply into a validated [`Decision`].
pub fn parse_decision(message: &Message, catalog: &[&ToolSchema]) -> Result<Decision, String> {
    match message.tool_calls.as_slice() {
        [] => {}
        [call] => {
            let arguments = if call.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.arguments)
                    .map_err(|e| format!("tool call arguments are not valid JSON: {e}"))?
            };
            let rationale = Some(message.content.trim())
                .filter(|s| !s.is_empty())
                .map(String::from);
            return invoke(&call.name, arguments, rationale, catalog);
        }
        calls => return Err(format!("expected one tool call, got {}", calls.len())),
    }

    let body = json_body(&message.content);
    if body.is_empty() {
        return Err("empty reply".into());
    }
    let wire: WireDecision =
        serde_json::from_str(body).map_err(|e| format!("reply is not the expected JSON object: {e}"))?;

    let tool = wire.tool_to_use.filter(|t| !t.trim().is_empty());
    let response = wire.response_to_user.filter(|r| !r.trim().is_empty());
    match (tool, response) {
        (Some(_), Some(_)) => Err("set either tool_to_use or response_to_user, not both".into()),
        (None, None) => Err("neither tool_to_use nor response_to_user is set".into()),
        (None, Some(text)) => Ok(Decision::FinalAnswer { text }),
        (Some(name), None) => {
            let arguments = match wire.tool_parameters {
                None | Some(Value::Null) => Value::Object(Default::default()),
                Some(args) => args,
            };
            let rationale = wire.thought.filter(|t| !t.trim().is_empty());
            invoke(name.trim(), arguments, rationale, catalog)
        }
    }
}

fn invoke(
    tool_name: &str,
    arguments: Value,
    rationale: Option<String>,
    catalog: &[&ToolSchema],
) -> Result<Decision, String> {
    let Some(schema) = catalog.iter().find(|s| s.name == tool_name) else {
        let known: Vec<&str> = catalog.iter().map(|s| s.name.as_str()).collect();
        return Err(format!(
            "unknown tool '{tool_name}' (available: {})",
            known.join(", ")
        ));
    };
    schema
        .validate(&arguments)
        .map_err(|e| format!("invalid arguments for '{tool_name}': {e}"))?;
    Ok(Decision::Invoke {
        tool_name: tool_name.to_string(),
        arguments,
        rationale,
    })
}

/// The JSON object inside a reply: everything from the first `{` to the
/// last `}`. Code fences, info strings and surrounding prose are dropped.
fn json_body(text: &str) -> &str {
    let trimmed = text.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}
