//! The orchestration loop.
//!
//! A [`Session`] owns the agent memory and walks the loop states:
//!
//! ```text
//! AwaitingInput ──input──▶ Deciding ──FinalAnswer──▶ Responding ──▶ AwaitingInput
//!       │                    │  ▲
//!    exit/quit            Invoke│
//!       ▼                    ▼  │
//!   Terminated      AwaitingApproval ──▶ ExecutingTool
//! ```
//!
//! Every tool call is resolved by exactly one outcome before the next
//! decision. Only a broken invariant or a decision naming a tool missing
//! from the registry ends a session with an error.

use crate::decision::Decider;
use heimdall_config::AgentConfig;
use heimdall_core::agent::{Decision, LoopState};
use heimdall_core::approval::ApprovalDecision;
use heimdall_core::error::{Error, ToolError};
use heimdall_core::memory::MemoryEntry;
use heimdall_core::message::SessionId;
use heimdall_core::operator::{Operator, OperatorEvent};
use heimdall_core::tool::{Tool, ToolRegistry, ToolResult, ToolSchema};
use heimdall_memory::AgentMemory;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One operator session.
pub struct Session {
    id: SessionId,
    state: LoopState,
    visited: Vec<LoopState>,
    memory: AgentMemory,
    decider: Box<dyn Decider>,
    tools: ToolRegistry,
    operator: Arc<dyn Operator>,
    max_steps_per_turn: u32,
    history_window: Option<usize>,
}

impl Session {
    pub fn new(
        decider: impl Decider + 'static,
        tools: ToolRegistry,
        operator: Arc<dyn Operator>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            state: LoopState::AwaitingInput,
            visited: vec![LoopState::AwaitingInput],
            memory: AgentMemory::new(),
            decider: Box::new(decider),
            tools,
            operator,
            max_steps_per_turn: 25,
            history_window: None,
        }
    }

    /// Apply `[agent]` limits.
    pub fn with_agent_config(self, config: &AgentConfig) -> Self {
        self.with_max_steps(config.max_steps_per_turn)
            .with_history_window(config.history_window)
    }

    pub fn with_max_steps(mut self, steps: u32) -> Self {
        self.max_steps_per_turn = steps.max(1);
        self
    }

    /// Show the decision step only the last `window` entries.
    pub fn with_history_window(mut self, window: Option<usize>) -> Self {
        self.history_window = window;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn visited(&self) -> &[LoopState] {
        &self.visited
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Read and handle operator input until the session terminates.
    pub async fn run(&mut self) -> Result<(), Error> {
        info!(session = %self.id, tools = ?self.tools.names(), "Session started");
        while self.state != LoopState::Terminated {
            match self.operator.read_input().await {
                Some(line) => self.handle_input(&line).await?,
                None => {
                    debug!(session = %self.id, "Operator input closed");
                    self.transition(LoopState::Terminated);
                }
            }
        }
        info!(session = %self.id, entries = self.memory.len(), "Session terminated");
        Ok(())
    }

    /// Handle one line of operator input, running the turn to completion.
    ///
    /// Blank lines are ignored; `exit` and `quit` terminate the session.
    pub async fn handle_input(&mut self, input: &str) -> Result<(), Error> {
        if self.state != LoopState::AwaitingInput {
            return Err(Error::Internal(format!(
                "input received while {}",
                self.state
            )));
        }

        let text = input.trim();
        if text.is_empty() {
            return Ok(());
        }
        if is_exit(text) {
            info!(session = %self.id, "Operator ended the session");
            self.transition(LoopState::Terminated);
            return Ok(());
        }

        let result = self.turn(text).await;
        if let Err(e) = &result {
            error!(session = %self.id, error = %e, "Session aborted");
            self.transition(LoopState::Terminated);
        }
        result
    }

    async fn turn(&mut self, text: &str) -> Result<(), Error> {
        self.memory.append(MemoryEntry::user(text))?;
        self.transition(LoopState::Deciding);

        for step in 1..=self.max_steps_per_turn {
            debug!(session = %self.id, step, "Deciding next action");
            let decision = {
                let catalog: Vec<&ToolSchema> = self.tools.schemas().collect();
                let history = self.memory.snapshot(self.history_window);
                self.decider.decide(history, &catalog).await
            };

            match decision {
                Ok(Decision::FinalAnswer { text }) => return self.respond(text),
                Ok(Decision::Invoke {
                    tool_name,
                    arguments,
                    rationale,
                }) => self.invoke(tool_name, arguments, rationale).await?,
                Err(e) => {
                    warn!(session = %self.id, error = %e, "Decision failed");
                    self.operator
                        .notify(&OperatorEvent::Notice(format!("decision failed: {e}")));
                    return self.respond(format!(
                        "I could not work out a next step ({e}). Please rephrase or try again."
                    ));
                }
            }
        }

        warn!(
            session = %self.id,
            max_steps = self.max_steps_per_turn,
            "Step limit reached for this turn"
        );
        self.operator.notify(&OperatorEvent::Notice(format!(
            "step limit of {} reached",
            self.max_steps_per_turn
        )));
        self.respond(format!(
            "I have taken {} steps on this request without finishing. \
             Tell me how you would like to continue.",
            self.max_steps_per_turn
        ))
    }

    /// Record and emit an utterance, then wait for input again.
    fn respond(&mut self, text: String) -> Result<(), Error> {
        self.memory.append(MemoryEntry::utterance(text.clone()))?;
        self.transition(LoopState::Responding);
        self.operator.notify(&OperatorEvent::Answer(text));
        self.transition(LoopState::AwaitingInput);
        Ok(())
    }

    async fn invoke(
        &mut self,
        tool_name: String,
        arguments: Value,
        rationale: Option<String>,
    ) -> Result<(), Error> {
        let approval = self.tool(&tool_name)?.approval_request(&arguments);

        if let Some(thought) = &rationale {
            self.operator.notify(&OperatorEvent::Thought(thought.clone()));
        }
        self.memory
            .append(MemoryEntry::call(&tool_name, arguments.clone(), rationale))?;
        self.operator.notify(&OperatorEvent::ToolInvoked {
            tool_name: tool_name.clone(),
            arguments: arguments.clone(),
        });

        let result = match approval {
            Some(request) => {
                self.transition(LoopState::AwaitingApproval);
                let decision = self.operator.review(&request).await;
                info!(
                    session = %self.id,
                    tool = %tool_name,
                    command = %request.command,
                    decision = decision_label(&decision),
                    "Approval decided"
                );
                if !decision.is_denied() {
                    self.transition(LoopState::ExecutingTool);
                }
                self.tool(&tool_name)?
                    .execute_approved(&arguments, &decision)
                    .await
            }
            None => {
                self.transition(LoopState::ExecutingTool);
                self.tool(&tool_name)?.execute(&arguments).await
            }
        };

        match &result {
            ToolResult::Success { .. } => debug!(session = %self.id, tool = %tool_name, "Tool succeeded"),
            ToolResult::Failure { reason } => {
                info!(session = %self.id, tool = %tool_name, reason = %reason, "Tool failed")
            }
        }
        self.memory
            .append(MemoryEntry::outcome(&tool_name, result.clone()))?;
        self.operator.notify(&OperatorEvent::ToolFinished { tool_name, result });
        self.transition(LoopState::Deciding);
        Ok(())
    }

    fn tool(&self, name: &str) -> Result<&dyn Tool, Error> {
        self.tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()).into())
    }

    fn transition(&mut self, next: LoopState) {
        debug!(session = %self.id, from = %self.state, to = %next, "State transition");
        self.state = next;
        self.visited.push(next);
    }
}

fn is_exit(text: &str) -> bool {
    text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit")
}

fn decision_label(decision: &ApprovalDecision) -> &'static str {
    match decision {
        ApprovalDecision::Approve => "approve",
        ApprovalDecision::Deny { .. } => "deny",
        ApprovalDecision::Amend { .. } => "amend",
    }
}
