//! The human at the other end of a session.

use crate::approval::Approver;
use crate::tool::ToolResult;
use async_trait::async_trait;
use serde_json::Value;

/// Things the loop reports to the operator while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorEvent {
    /// The agent's reasoning for its next tool call.
    Thought(String),
    ToolInvoked { tool_name: String, arguments: Value },
    ToolFinished { tool_name: String, result: ToolResult },
    /// A final answer for the operator.
    Answer(String),
    /// Informational message from the loop itself.
    Notice(String),
}

/// Operator I/O: free-text input, approvals and notifications.
#[async_trait]
pub trait Operator: Approver {
    /// Next line of input, or `None` once input is exhausted.
    async fn read_input(&self) -> Option<String>;

    fn notify(&self, event: &OperatorEvent);
}
