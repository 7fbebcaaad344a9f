//! Human approval of side-effecting tool invocations.
//!
//! A request lives only between the decision to invoke a tool and the
//! operator's answer; memory records the resulting outcome, never the
//! request itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the operator is asked to approve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    pub tool_name: String,

    /// The exact action to be performed (a shell command, or a file action).
    pub command: String,
    pub working_directory: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        tool_name: impl Into<String>,
        command: impl Into<String>,
        working_directory: impl Into<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tool_name: tool_name.into(),
            command: command.into(),
            working_directory: working_directory.into(),
            reason,
            created_at: Utc::now(),
        }
    }
}

/// The operator's answer to an [`ApprovalRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Deny {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Approve a replacement for the proposed command.
    Amend { command: String },
}

impl ApprovalDecision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }
}

/// Anything that can answer approval requests.
#[async_trait]
pub trait Approver: Send + Sync {
    /// Block until the request is approved, denied or amended.
    async fn review(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// Approves everything. Only for unattended runs the operator opted into.
pub struct AutoApprove;

#[async_trait]
impl Approver for AutoApprove {
    async fn review(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Approve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_serde_shape() {
        let json = serde_json::to_value(ApprovalDecision::Deny {
            reason: Some("no".into()),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"decision": "deny", "reason": "no"}));

        let parsed: ApprovalDecision = serde_json::from_str(r#"{"decision":"deny"}"#).unwrap();
        assert_eq!(parsed, ApprovalDecision::Deny { reason: None });
    }

    #[test]
    fn requests_get_distinct_ids() {
        let a = ApprovalRequest::new("console", "ls", "/ws", None);
        let b = ApprovalRequest::new("console", "ls", "/ws", None);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn auto_approve_approves() {
        let request = ApprovalRequest::new("console", "id", "/ws", Some("check user".into()));
        assert_eq!(AutoApprove.review(&request).await, ApprovalDecision::Approve);
    }
}
