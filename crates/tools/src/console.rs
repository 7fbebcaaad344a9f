//! Console tool: shell commands gated by operator approval.
//!
//! Nothing runs until the operator approves the exact command. The operator
//! may also amend the command, in which case the amended text runs instead.

use async_trait::async_trait;
use heimdall_core::approval::{ApprovalDecision, ApprovalRequest, Approver};
use heimdall_core::tool::{FieldSpec, FieldType, Tool, ToolResult, ToolSchema};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const NAME: &str = "console";

/// Execute shell commands after human approval.
pub struct ConsoleTool {
    schema: ToolSchema,
    workspace: PathBuf,
    approver: Arc<dyn Approver>,
    timeout: Duration,
    max_output_bytes: usize,
}

/// A validated invocation.
struct Invocation {
    command: String,
    cwd: PathBuf,
    reason: Option<String>,
}

impl ConsoleTool {
    pub fn new(workspace: impl Into<PathBuf>, approver: Arc<dyn Approver>) -> Self {
        Self {
            schema: schema(),
            workspace: workspace.into(),
            approver,
            timeout: Duration::from_secs(300),
            max_output_bytes: 64 * 1024,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    fn parse(&self, arguments: &Value) -> Result<Invocation, ToolResult> {
        self.schema
            .validate(arguments)
            .map_err(ToolResult::invalid_arguments)?;

        let command = arguments["command"].as_str().unwrap_or_default().trim();
        if command.is_empty() {
            return Err(ToolResult::invalid_arguments("command must not be empty"));
        }

        let cwd = match arguments["working_directory"].as_str() {
            Some(dir) if !dir.trim().is_empty() => self.workspace.join(dir.trim()),
            _ => self.workspace.clone(),
        };
        if !cwd.is_dir() {
            return Err(ToolResult::invalid_arguments(format!(
                "working directory '{}' does not exist",
                cwd.display()
            )));
        }

        Ok(Invocation {
            command: command.to_string(),
            cwd,
            reason: arguments["reason"].as_str().map(String::from),
        })
    }

    async fn decided(&self, invocation: Invocation, decision: &ApprovalDecision) -> ToolResult {
        match decision {
            ApprovalDecision::Deny { reason } => {
                info!(command = %invocation.command, "Command denied by operator");
                ToolResult::denied(reason.as_deref())
            }
            ApprovalDecision::Approve => self.run(&invocation.command, &invocation.cwd).await,
            ApprovalDecision::Amend { command } => {
                let command = command.trim();
                if command.is_empty() {
                    return ToolResult::failure("amended command is empty");
                }
                info!(original = %invocation.command, amended = %command, "Running amended command");
                self.run(command, &invocation.cwd).await
            }
        }
    }

    async fn run(&self, command: &str, cwd: &Path) -> ToolResult {
        debug!(command = %command, cwd = %cwd.display(), "Executing console command");

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout reaches everything the shell forked.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return ToolResult::failure(format!("failed to start command: {e}")),
        };
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = tokio::time::timeout(self.timeout, async {
            tokio::join!(child.wait(), read_stream(stdout), read_stream(stderr))
        })
        .await;

        match finished {
            Err(_) => {
                warn!(command = %command, timeout_secs = self.timeout.as_secs(), "Command timed out");
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Timed-out command already exited");
                }
                ToolResult::failure(format!(
                    "command timed out after {} s",
                    self.timeout.as_secs()
                ))
            }
            Ok((Err(e), _, _)) => ToolResult::failure(format!("failed to wait for command: {e}")),
            Ok((Ok(status), stdout, stderr)) => {
                let exit_code = status.code();
                if !status.success() {
                    warn!(command = %command, exit_code, "Command exited unsuccessfully");
                }
                ToolResult::success(json!({
                    "command": command,
                    "exit_code": exit_code,
                    "stdout": truncate_bytes(&stdout, self.max_output_bytes),
                    "stderr": truncate_bytes(&stderr, self.max_output_bytes),
                }))
            }
        }
    }
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream
        && let Err(e) = stream.read_to_end(&mut buf).await
    {
        debug!(error = %e, "Failed to read command output");
    }
    buf
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    // SAFETY: killpg takes plain integers and touches no memory.
    let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(pgid, error = %std::io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

fn schema() -> ToolSchema {
    ToolSchema {
        name: NAME.into(),
        description: "Run a shell command on the operator's machine. Every command is shown to \
                      the operator, who approves, denies or edits it before it runs. Use for \
                      scanners and system utilities (nmap, whois, dig, curl, ls, ...)."
            .into(),
        input_fields: vec![
            FieldSpec::required("command", FieldType::String, "The exact shell command to run"),
            FieldSpec::optional(
                "working_directory",
                FieldType::String,
                "Directory to run in, relative to the workspace (default: workspace root)",
            ),
            FieldSpec::optional(
                "reason",
                FieldType::String,
                "Why this command is needed, shown to the operator",
            ),
        ],
        output_fields: vec![
            FieldSpec::required("command", FieldType::String, "The command that actually ran"),
            FieldSpec::optional("exit_code", FieldType::Integer, "Exit code (absent if killed by a signal)"),
            FieldSpec::required("stdout", FieldType::String, "Captured standard output"),
            FieldSpec::required("stderr", FieldType::String, "Captured standard error"),
        ],
        requires_approval: true,
    }
}

fn truncate_bytes(bytes: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= max {
        return text.into_owned();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n[output truncated at {max} bytes]", &text[..end])
}

#[async_trait]
impl Tool for ConsoleTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn approval_request(&self, arguments: &Value) -> Option<ApprovalRequest> {
        let invocation = self.parse(arguments).ok()?;
        Some(ApprovalRequest::new(
            NAME,
            invocation.command,
            invocation.cwd.display().to_string(),
            invocation.reason,
        ))
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let invocation = match self.parse(arguments) {
            Ok(invocation) => invocation,
            Err(failure) => return failure,
        };
        let request = ApprovalRequest::new(
            NAME,
            invocation.command.clone(),
            invocation.cwd.display().to_string(),
            invocation.reason.clone(),
        );
        let decision = self.approver.review(&request).await;
        self.decided(invocation, &decision).await
    }

    async fn execute_approved(&self, arguments: &Value, decision: &ApprovalDecision) -> ToolResult {
        match self.parse(arguments) {
            Ok(invocation) => self.decided(invocation, decision).await,
            Err(failure) => failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedApprover {
        decision: ApprovalDecision,
        seen: Mutex<Vec<ApprovalRequest>>,
    }

    impl ScriptedApprover {
        fn new(decision: ApprovalDecision) -> Arc<Self> {
            Arc::new(Self {
                decision,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<ApprovalRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Approver for ScriptedApprover {
        async fn review(&self, request: &ApprovalRequest) -> ApprovalDecision {
            self.seen.lock().unwrap().push(request.clone());
            self.decision.clone()
        }
    }

    fn tool(dir: &Path, approver: Arc<ScriptedApprover>) -> ConsoleTool {
        ConsoleTool::new(dir, approver)
    }

    #[tokio::test]
    async fn approved_command_runs() {
        let dir = tempfile::tempdir().unwrap();
        let approver = ScriptedApprover::new(ApprovalDecision::Approve);
        let console = tool(dir.path(), approver.clone());

        let result = console
            .execute(&json!({"command": "echo hello", "reason": "smoke test"}))
            .await;
        let ToolResult::Success { output } = result else {
            panic!("expected success");
        };
        assert_eq!(output["exit_code"], 0);
        assert!(output["stdout"].as_str().unwrap().contains("hello"));

        let seen = approver.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].command, "echo hello");
        assert_eq!(seen[0].reason.as_deref(), Some("smoke test"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn denied_command_never_runs() {
        let dir = tempfile::tempdir().unwrap();
        let approver = ScriptedApprover::new(ApprovalDecision::Deny {
            reason: Some("destructive".into()),
        });
        let console = tool(dir.path(), approver);

        let result = console.execute(&json!({"command": "touch marker"})).await;
        assert_eq!(result, ToolResult::failure("denied by operator: destructive"));
        assert!(!dir.path().join("marker").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn amended_command_runs_instead() {
        let dir = tempfile::tempdir().unwrap();
        let approver = ScriptedApprover::new(ApprovalDecision::Amend {
            command: "echo safer".into(),
        });
        let console = tool(dir.path(), approver);

        let result = console.execute(&json!({"command": "rm -rf /"})).await;
        let ToolResult::Success { output } = result else {
            panic!("expected success");
        };
        assert_eq!(output["command"], "echo safer");
        assert_eq!(output["stdout"], "safer\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_reported_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let console = tool(dir.path(), ScriptedApprover::new(ApprovalDecision::Approve));

        let result = console
            .execute(&json!({"command": "echo oops >&2; exit 3"}))
            .await;
        let ToolResult::Success { output } = result else {
            panic!("expected success");
        };
        assert_eq!(output["exit_code"], 3);
        assert_eq!(output["stderr"], "oops\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_command() {
        let dir = tempfile::tempdir().unwrap();
        let console = tool(dir.path(), ScriptedApprover::new(ApprovalDecision::Approve))
            .with_timeout(Duration::from_secs(1));

        let result = console.execute(&json!({"command": "sleep 5"})).await;
        assert_eq!(result, ToolResult::failure("command timed out after 1 s"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_forked_work() {
        let dir = tempfile::tempdir().unwrap();
        let console = tool(dir.path(), ScriptedApprover::new(ApprovalDecision::Approve))
            .with_timeout(Duration::from_secs(1));

        let result = console
            .execute(&json!({"command": "(sleep 2; touch marker); true"}))
            .await;
        assert_eq!(result, ToolResult::failure("command timed out after 1 s"));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!dir.path().join("marker").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_relative_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("scans")).unwrap();
        let console = tool(dir.path(), ScriptedApprover::new(ApprovalDecision::Approve));

        let result = console
            .execute(&json!({"command": "pwd", "working_directory": "scans"}))
            .await;
        let ToolResult::Success { output } = result else {
            panic!("expected success");
        };
        assert!(output["stdout"].as_str().unwrap().trim_end().ends_with("scans"));
    }

    #[tokio::test]
    async fn invalid_arguments_fail_before_approval() {
        let dir = tempfile::tempdir().unwrap();
        let approver = ScriptedApprover::new(ApprovalDecision::Approve);
        let console = tool(dir.path(), approver.clone());

        for args in [
            json!({}),
            json!({"command": 42}),
            json!({"command": "   "}),
            json!({"command": "ls", "working_directory": "missing"}),
            json!({"command": "ls", "shell": "bash"}),
        ] {
            let result = console.execute(&args).await;
            assert!(
                matches!(&result, ToolResult::Failure { reason } if reason.starts_with("invalid arguments")),
                "{args} -> {result:?}"
            );
            assert!(console.approval_request(&args).is_none());
        }
        assert!(approver.seen().is_empty());
    }

    #[tokio::test]
    async fn approval_request_describes_command() {
        let dir = tempfile::tempdir().unwrap();
        let console = tool(dir.path(), ScriptedApprover::new(ApprovalDecision::Approve));
        let request = console
            .approval_request(&json!({"command": "nmap -sV 10.0.0.5", "reason": "service scan"}))
            .unwrap();
        assert_eq!(request.tool_name, "console");
        assert_eq!(request.command, "nmap -sV 10.0.0.5");
        assert_eq!(request.working_directory, dir.path().display().to_string());
    }

    #[test]
    fn truncation_marks_output() {
        assert_eq!(truncate_bytes(b"short", 10), "short");
        let long = truncate_bytes("ééé".as_bytes(), 3);
        assert!(long.starts_with("é\n[output truncated"));
    }
}
