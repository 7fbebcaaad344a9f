//! Agent decision and loop-state types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single next action chosen by the decision step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// Reply to the operator and wait for new input.
    FinalAnswer { text: String },

    /// Invoke a catalog tool with arguments already checked against its schema.
    Invoke {
        tool_name: String,
        arguments: Value,
        rationale: Option<String>,
    },
}

/// States of the orchestration loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    AwaitingInput,
    Deciding,
    AwaitingApproval,
    ExecutingTool,
    Responding,
    /// Absorbing: no further input is read.
    Terminated,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitingInput => "awaiting_input",
            Self::Deciding => "deciding",
            Self::AwaitingApproval => "awaiting_approval",
            Self::ExecutingTool => "executing_tool",
            Self::Responding => "responding",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_state_display_matches_serde() {
        for state in [LoopState::AwaitingApproval, LoopState::Terminated] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }

    #[test]
    fn decision_round_trips_as_tagged_json() {
        let decision = Decision::FinalAnswer { text: "done".into() };
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["type"], "final_answer");
    }
}
