//! Session memory entries.
//!
//! The agent's memory is a chronological log of these entries. Entries are
//! never edited once appended; the ordering rules live in `heimdall-memory`.

use crate::tool::ToolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single turn-level event in the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryEntry {
    /// Text typed by the operator.
    UserMessage { text: String },

    /// Natural-language text produced by the agent.
    AgentUtterance { text: String },

    /// A validated tool invocation chosen by the decision step.
    ToolCall {
        tool_name: String,
        arguments: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rationale: Option<String>,
    },

    /// What came back from the most recent tool call.
    ToolOutcome { tool_name: String, result: ToolResult },
}

impl MemoryEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self::UserMessage { text: text.into() }
    }

    pub fn utterance(text: impl Into<String>) -> Self {
        Self::AgentUtterance { text: text.into() }
    }

    pub fn call(tool_name: impl Into<String>, arguments: Value, rationale: Option<String>) -> Self {
        Self::ToolCall {
            tool_name: tool_name.into(),
            arguments,
            rationale,
        }
    }

    pub fn outcome(tool_name: impl Into<String>, result: ToolResult) -> Self {
        Self::ToolOutcome {
            tool_name: tool_name.into(),
            result,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserMessage { .. } => "user_message",
            Self::AgentUtterance { .. } => "agent_utterance",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolOutcome { .. } => "tool_outcome",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_serialize_with_kind_tag() {
        let entry = MemoryEntry::call("file_manager", json!({"action": "list", "path": "."}), None);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["kind"], "tool_call");
        assert!(value.get("rationale").is_none());

        let outcome = MemoryEntry::outcome("file_manager", ToolResult::failure("not found"));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["result"]["status"], "failure");
    }

    #[test]
    fn kind_labels() {
        assert_eq!(MemoryEntry::user("hi").kind(), "user_message");
        assert_eq!(MemoryEntry::utterance("hi").kind(), "agent_utterance");
    }
}
