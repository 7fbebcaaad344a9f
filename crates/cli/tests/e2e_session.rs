//! End-to-end session tests.
//!
//! These run the real tools against a temporary workspace, with a scripted
//! reasoning provider and a scripted operator standing in for the model and
//! the human.

use std::sync::Arc;

use async_trait::async_trait;
use heimdall_agent::test_helpers::{
    ScriptedOperator, SequentialMockProvider, answer_json, invoke_json, make_text_response,
};
use heimdall_agent::{DecisionStep, Session};
use heimdall_config::AppConfig;
use heimdall_core::agent::LoopState;
use heimdall_core::approval::ApprovalDecision;
use heimdall_core::error::SearchError;
use heimdall_core::memory::MemoryEntry;
use heimdall_core::tool::{ToolRegistry, ToolResult};
use heimdall_memory::AgentMemory;
use heimdall_tools::{SearchBackend, SearchCategory, SearchHit, WebSearchTool};
use serde_json::{Value, json};

// ── Fixtures ─────────────────────────────────────────────────────────────

struct Fixture {
    workspace: tempfile::TempDir,
    operator: Arc<ScriptedOperator>,
    provider: Arc<SequentialMockProvider>,
    session: Session,
}

fn fixture(replies: &[String], inputs: &[&str], decisions: Vec<ApprovalDecision>) -> Fixture {
    let workspace = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.workspace.dir = workspace.path().to_path_buf();

    let operator = Arc::new(ScriptedOperator::new(inputs).with_decisions(decisions));
    let provider = Arc::new(SequentialMockProvider::new(
        replies.iter().map(|r| make_text_response(r)).collect(),
    ));
    let tools = heimdall_tools::default_registry(&config, operator.clone(), None).unwrap();
    let session = Session::new(DecisionStep::new(provider.clone(), "mock-model"), tools, operator.clone())
        .with_agent_config(&config.agent);

    Fixture {
        workspace,
        operator,
        provider,
        session,
    }
}

fn outcomes(memory: &AgentMemory) -> Vec<(String, ToolResult)> {
    memory
        .iter()
        .filter_map(|entry| match entry {
            MemoryEntry::ToolOutcome { tool_name, result } => Some((tool_name.clone(), result.clone())),
            _ => None,
        })
        .collect()
}

fn success_output(result: &ToolResult) -> &Value {
    match result {
        ToolResult::Success { output } => output,
        ToolResult::Failure { reason } => panic!("unexpected failure: {reason}"),
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_files_in_workspace() {
    let mut f = fixture(
        &[
            invoke_json("file_manager", json!({"action": "list", "path": "."}), "see the workspace"),
            answer_json("The workspace holds notes.txt and a scans directory."),
        ],
        &["list files in the workspace", "exit"],
        vec![],
    );
    std::fs::write(f.workspace.path().join("notes.txt"), "target: 10.0.0.5").unwrap();
    std::fs::create_dir(f.workspace.path().join("scans")).unwrap();

    f.session.run().await.unwrap();

    let outcomes = outcomes(f.session.memory());
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].0, "file_manager");
    assert_eq!(success_output(&outcomes[0].1)["entries"], json!(["notes.txt", "scans/"]));

    assert_eq!(
        f.session.visited(),
        &[
            LoopState::AwaitingInput,
            LoopState::Deciding,
            LoopState::ExecutingTool,
            LoopState::Deciding,
            LoopState::Responding,
            LoopState::AwaitingInput,
            LoopState::Terminated,
        ]
    );
    assert_eq!(
        f.operator.answers(),
        vec!["The workspace holds notes.txt and a scans directory."]
    );
    assert_eq!(f.provider.call_count(), 2);

    // The second decision saw the tool outcome.
    let second = &f.provider.requests()[1];
    let last = second.messages.last().unwrap();
    assert!(last.content.starts_with("Tool 'file_manager' output:"));
    assert!(last.content.contains("notes.txt"));
}

#[tokio::test]
async fn exit_ends_session_without_a_decision() {
    let mut f = fixture(&[], &["quit"], vec![]);
    f.session.run().await.unwrap();

    assert_eq!(f.session.state(), LoopState::Terminated);
    assert!(f.session.memory().is_empty());
    assert_eq!(f.provider.call_count(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn denied_console_command_never_runs() {
    let mut f = fixture(
        &[
            invoke_json("console", json!({"command": "touch pwned", "reason": "test write access"}), "probe"),
            answer_json("Understood. I will not touch the filesystem."),
        ],
        &["check write access"],
        vec![ApprovalDecision::Deny {
            reason: Some("not authorized".into()),
        }],
    );

    f.session.run().await.unwrap();

    assert!(!f.workspace.path().join("pwned").exists());
    let outcomes = outcomes(f.session.memory());
    assert_eq!(
        outcomes[0],
        ("console".to_string(), ToolResult::failure("denied by operator: not authorized"))
    );

    let requests = f.operator.approval_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].command, "touch pwned");
    assert_eq!(requests[0].reason.as_deref(), Some("test write access"));
    assert!(!f.session.visited().contains(&LoopState::ExecutingTool));
}

#[cfg(unix)]
#[tokio::test]
async fn approved_and_amended_console_commands_run() {
    let mut f = fixture(
        &[
            invoke_json("console", json!({"command": "echo recon"}), "first"),
            invoke_json("console", json!({"command": "cat /etc/shadow"}), "second"),
            answer_json("Both commands finished."),
        ],
        &["run recon"],
        vec![
            ApprovalDecision::Approve,
            ApprovalDecision::Amend {
                command: "echo amended".into(),
            },
        ],
    );

    f.session.run().await.unwrap();

    let outcomes = outcomes(f.session.memory());
    assert_eq!(success_output(&outcomes[0].1)["stdout"], "recon\n");
    let amended = success_output(&outcomes[1].1);
    assert_eq!(amended["command"], "echo amended");
    assert_eq!(amended["stdout"], "amended\n");
    assert_eq!(amended["exit_code"], 0);
}

#[tokio::test]
async fn report_is_written_then_read_back() {
    let mut f = fixture(
        &[
            invoke_json(
                "file_manager",
                json!({"action": "write", "path": "reports/host.md", "content": "# 10.0.0.5\n"}),
                "start report",
            ),
            invoke_json(
                "file_manager",
                json!({"action": "append", "path": "reports/host.md", "content": "- 22/tcp open\n"}),
                "add finding",
            ),
            invoke_json("file_manager", json!({"action": "read", "path": "reports/host.md"}), "verify"),
            answer_json("Report saved."),
        ],
        &["write up the host"],
        vec![],
    );

    f.session.run().await.unwrap();

    let outcomes = outcomes(f.session.memory());
    assert_eq!(outcomes.len(), 3);
    assert_eq!(
        success_output(&outcomes[2].1)["content"],
        "# 10.0.0.5\n- 22/tcp open\n"
    );
    assert_eq!(
        std::fs::read_to_string(f.workspace.path().join("reports/host.md")).unwrap(),
        "# 10.0.0.5\n- 22/tcp open\n"
    );
}

#[tokio::test]
async fn path_escape_is_an_outcome_not_a_crash() {
    let mut f = fixture(
        &[
            invoke_json("file_manager", json!({"action": "read", "path": "../../etc/passwd"}), "peek"),
            answer_json("That file is outside the workspace."),
        ],
        &["read /etc/passwd"],
        vec![],
    );

    f.session.run().await.unwrap();

    let outcomes = outcomes(f.session.memory());
    assert_eq!(outcomes[0].1, ToolResult::failure("path outside workspace"));
    assert_eq!(f.session.state(), LoopState::Terminated);
}

#[tokio::test]
async fn malformed_decision_is_retried_within_a_turn() {
    let mut f = fixture(
        &[
            "I think we should list the files.".to_string(),
            invoke_json("file_manager", json!({"action": "shred", "path": "."}), "oops"),
            answer_json("Here is what I found."),
        ],
        &["what's here?"],
        vec![],
    );

    f.session.run().await.unwrap();

    assert_eq!(f.provider.call_count(), 3);
    assert!(outcomes(f.session.memory()).is_empty());
    assert_eq!(f.operator.answers(), vec!["Here is what I found."]);
}

// ── Web search against a deterministic backend ───────────────────────────

struct FixedBackend;

#[async_trait]
impl SearchBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(
        &self,
        query: &str,
        _category: SearchCategory,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        Ok((1..=5)
            .map(|i| SearchHit {
                title: format!("{query} result {i}"),
                url: format!("https://example.org/{i}"),
                snippet: format!("snippet {i}"),
            })
            .take(max_results)
            .collect())
    }
}

#[tokio::test]
async fn identical_searches_give_identical_results() {
    let search = json!({"query": "CVE-2024-6387", "category": "text", "max_results": 2});
    let operator = Arc::new(ScriptedOperator::new(&["look it up"]));
    let provider = Arc::new(SequentialMockProvider::new(vec![
        make_text_response(&invoke_json("web_search", search.clone(), "first")),
        make_text_response(&invoke_json("web_search", search, "again")),
        make_text_response(&answer_json("Same results both times.")),
    ]));
    let mut tools = ToolRegistry::new();
    tools
        .register(Box::new(WebSearchTool::new(Arc::new(FixedBackend))))
        .unwrap();
    let mut session = Session::new(DecisionStep::new(provider, "m"), tools, operator);

    session.run().await.unwrap();

    let outcomes = outcomes(session.memory());
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].1, outcomes[1].1);
    let results = success_output(&outcomes[0].1)["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["url"], "https://example.org/1");
}
