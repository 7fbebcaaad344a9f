//! File manager tool: read, write, append and list inside the workspace.
//!
//! Every path is resolved through [`WorkspaceRoot`], so nothing outside the
//! workspace is ever touched. Writes land in a temporary file first and are
//! renamed into place, leaving the target untouched if anything fails.

use async_trait::async_trait;
use heimdall_core::approval::{ApprovalDecision, ApprovalRequest, Approver};
use heimdall_core::tool::{FieldSpec, FieldType, Tool, ToolResult, ToolSchema};
use heimdall_security::{PathValidationError, WorkspaceRoot};
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const NAME: &str = "file_manager";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Read,
    Write,
    Append,
    List,
}

impl Action {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "append" => Some(Self::Append),
            "list" => Some(Self::List),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Append => "append",
            Self::List => "list",
        }
    }

    fn mutates(&self) -> bool {
        matches!(self, Self::Write | Self::Append)
    }
}

struct FileRequest {
    action: Action,
    path: PathBuf,
    display: String,
    content: Option<String>,
    reason: Option<String>,
}

/// Workspace file access for the agent.
pub struct FileManagerTool {
    schema: ToolSchema,
    workspace: WorkspaceRoot,
    confirm: Option<Arc<dyn Approver>>,
}

impl FileManagerTool {
    pub fn new(workspace: WorkspaceRoot) -> Self {
        Self {
            schema: schema(false),
            workspace,
            confirm: None,
        }
    }

    /// Require operator approval for write and append.
    pub fn with_confirmation(mut self, approver: Arc<dyn Approver>) -> Self {
        self.schema = schema(true);
        self.confirm = Some(approver);
        self
    }

    fn parse(&self, arguments: &Value) -> Result<FileRequest, ToolResult> {
        self.schema
            .validate(arguments)
            .map_err(ToolResult::invalid_arguments)?;

        let action = arguments["action"]
            .as_str()
            .and_then(Action::parse)
            .ok_or_else(|| ToolResult::invalid_arguments("unknown action"))?;
        let raw_path = arguments["path"].as_str().unwrap_or_default();
        let content = arguments["content"].as_str().map(String::from);
        if action.mutates() && content.is_none() {
            return Err(ToolResult::invalid_arguments(format!(
                "'content' is required for {}",
                action.as_str()
            )));
        }

        let path = self.workspace.resolve(raw_path).map_err(|e| match e {
            PathValidationError::OutsideWorkspace { .. } => {
                warn!(path = raw_path, "Rejected path outside workspace");
                ToolResult::failure("path outside workspace")
            }
            other => ToolResult::failure(other.to_string()),
        })?;

        Ok(FileRequest {
            action,
            display: self.workspace.display_relative(&path),
            path,
            content,
            reason: arguments["reason"].as_str().map(String::from),
        })
    }

    fn needs_confirmation(&self, request: &FileRequest) -> bool {
        self.confirm.is_some() && request.action.mutates()
    }

    fn approval_for(&self, request: &FileRequest) -> ApprovalRequest {
        let bytes = request.content.as_deref().map_or(0, str::len);
        ApprovalRequest::new(
            NAME,
            format!("{} {} ({bytes} bytes)", request.action.as_str(), request.display),
            self.workspace.path().display().to_string(),
            request.reason.clone(),
        )
    }

    async fn perform(&self, request: FileRequest) -> ToolResult {
        debug!(action = request.action.as_str(), path = %request.display, "File manager action");
        match request.action {
            Action::Read => read(&request).await,
            Action::List => self.list(&request).await,
            Action::Write | Action::Append => write(&request).await,
        }
    }

    async fn list(&self, request: &FileRequest) -> ToolResult {
        let dir = if request.path.is_file() {
            request.path.parent().map(Path::to_path_buf).unwrap_or_else(|| request.path.clone())
        } else {
            request.path.clone()
        };

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return ToolResult::failure("not found"),
            Err(e) => return ToolResult::failure(format!("list failed: {e}")),
        };

        let mut entries = Vec::new();
        loop {
            match reader.next_entry().await {
                Ok(Some(entry)) => {
                    let mut name = entry.file_name().to_string_lossy().into_owned();
                    if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                        name.push('/');
                    }
                    entries.push(name);
                }
                Ok(None) => break,
                Err(e) => return ToolResult::failure(format!("list failed: {e}")),
            }
        }
        entries.sort();

        ToolResult::success(json!({
            "path": self.workspace.display_relative(&dir),
            "entries": entries,
        }))
    }
}

async fn read(request: &FileRequest) -> ToolResult {
    if request.path.is_dir() {
        return ToolResult::failure(format!("'{}' is a directory", request.display));
    }
    match tokio::fs::read_to_string(&request.path).await {
        Ok(content) => ToolResult::success(json!({
            "path": request.display,
            "content": content,
        })),
        Err(e) if e.kind() == ErrorKind::NotFound => ToolResult::failure("not found"),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            ToolResult::failure(format!("'{}' is not a UTF-8 text file", request.display))
        }
        Err(e) => ToolResult::failure(format!("read failed: {e}")),
    }
}

async fn write(request: &FileRequest) -> ToolResult {
    let content = request.content.as_deref().unwrap_or_default();
    if request.path.is_dir() {
        return ToolResult::failure(format!("'{}' is a directory", request.display));
    }

    let mut data = Vec::new();
    if request.action == Action::Append {
        match tokio::fs::read(&request.path).await {
            Ok(existing) => data = existing,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return ToolResult::failure(format!("append failed: {e}")),
        }
    }
    data.extend_from_slice(content.as_bytes());

    if let Some(parent) = request.path.parent()
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        return ToolResult::failure(format!("could not create directory: {e}"));
    }

    match atomic_write(&request.path, &data).await {
        Ok(()) => ToolResult::success(json!({
            "path": request.display,
            "action": request.action.as_str(),
            "bytes_written": content.len(),
            "size": data.len(),
        })),
        Err(e) => ToolResult::failure(format!("{} failed: {e}", request.action.as_str())),
    }
}

/// Write `data` to a sibling temp file, then rename it over `path`.
async fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    if let Err(e) = tokio::fs::write(&tmp, data).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

fn schema(requires_approval: bool) -> ToolSchema {
    ToolSchema {
        name: NAME.into(),
        description: "Read, write, append to or list files inside the Heimdall workspace. Paths \
                      are relative to the workspace root and cannot leave it. Use it to keep \
                      notes, scan output and reports."
            .into(),
        input_fields: vec![
            FieldSpec::required(
                "action",
                FieldType::one_of(&["read", "write", "append", "list"]),
                "Operation to perform",
            ),
            FieldSpec::required("path", FieldType::String, "Path relative to the workspace ('.' for the root)"),
            FieldSpec::optional("content", FieldType::String, "Text to write or append (required for write/append)"),
            FieldSpec::optional("reason", FieldType::String, "Why this operation is needed"),
        ],
        output_fields: vec![
            FieldSpec::required("path", FieldType::String, "Workspace-relative path acted on"),
            FieldSpec::optional("content", FieldType::String, "File content (read)"),
            FieldSpec::optional("entries", FieldType::Array, "Sorted entries, directories end with '/' (list)"),
            FieldSpec::optional("bytes_written", FieldType::Integer, "Bytes written (write/append)"),
        ],
        requires_approval,
    }
}

#[async_trait]
impl Tool for FileManagerTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn approval_request(&self, arguments: &Value) -> Option<ApprovalRequest> {
        let request = self.parse(arguments).ok()?;
        self.needs_confirmation(&request)
            .then(|| self.approval_for(&request))
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let request = match self.parse(arguments) {
            Ok(request) => request,
            Err(failure) => return failure,
        };
        if let Some(approver) = &self.confirm
            && request.action.mutates()
        {
            let decision = approver.review(&self.approval_for(&request)).await;
            if let ApprovalDecision::Deny { reason } = decision {
                return ToolResult::denied(reason.as_deref());
            }
        }
        self.perform(request).await
    }

    async fn execute_approved(&self, arguments: &Value, decision: &ApprovalDecision) -> ToolResult {
        let request = match self.parse(arguments) {
            Ok(request) => request,
            Err(failure) => return failure,
        };
        match decision {
            ApprovalDecision::Deny { reason } => ToolResult::denied(reason.as_deref()),
            _ => self.perform(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heimdall_core::approval::AutoApprove;

    struct DenyAll;

    #[async_trait]
    impl Approver for DenyAll {
        async fn review(&self, _request: &ApprovalRequest) -> ApprovalDecision {
            ApprovalDecision::Deny {
                reason: Some("not now".into()),
            }
        }
    }

    fn setup() -> (tempfile::TempDir, FileManagerTool) {
        let dir = tempfile::tempdir().unwrap();
        let tool = FileManagerTool::new(WorkspaceRoot::new(dir.path()).unwrap());
        (dir, tool)
    }

    fn output(result: ToolResult) -> Value {
        match result {
            ToolResult::Success { output } => output,
            ToolResult::Failure { reason } => panic!("unexpected failure: {reason}"),
        }
    }

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let (_dir, fm) = setup();
        let written = output(
            fm.execute(&json!({"action": "write", "path": "notes/target.txt", "content": "10.0.0.5"}))
                .await,
        );
        assert_eq!(written["path"], "notes/target.txt");
        assert_eq!(written["bytes_written"], 8);

        let read = output(fm.execute(&json!({"action": "read", "path": "notes/target.txt"})).await);
        assert_eq!(read["content"], "10.0.0.5");
    }

    #[tokio::test]
    async fn append_concatenates() {
        let (_dir, fm) = setup();
        fm.execute(&json!({"action": "append", "path": "log.txt", "content": "a"})).await;
        fm.execute(&json!({"action": "append", "path": "log.txt", "content": "b\n"})).await;
        let read = output(fm.execute(&json!({"action": "read", "path": "log.txt"})).await);
        assert_eq!(read["content"], "ab\n");
    }

    #[tokio::test]
    async fn write_overwrites() {
        let (dir, fm) = setup();
        std::fs::write(dir.path().join("f.txt"), "old contents").unwrap();
        fm.execute(&json!({"action": "write", "path": "f.txt", "content": "new"})).await;
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn escape_rejected_before_io() {
        let (_dir, fm) = setup();
        for path in ["../../etc/passwd", "/etc/passwd", "a/../../b"] {
            let result = fm.execute(&json!({"action": "read", "path": path})).await;
            assert_eq!(result, ToolResult::failure("path outside workspace"));
        }
        let result = fm
            .execute(&json!({"action": "write", "path": "../evil.txt", "content": "x"}))
            .await;
        assert_eq!(result, ToolResult::failure("path outside workspace"));
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let (_dir, fm) = setup();
        let result = fm.execute(&json!({"action": "read", "path": "nope.txt"})).await;
        assert_eq!(result, ToolResult::failure("not found"));
    }

    #[tokio::test]
    async fn list_sorts_and_marks_directories() {
        let (dir, fm) = setup();
        std::fs::create_dir(dir.path().join("scans")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();

        let listed = output(fm.execute(&json!({"action": "list", "path": "."})).await);
        assert_eq!(listed["path"], ".");
        assert_eq!(listed["entries"], json!(["a.txt", "b.txt", "scans/"]));

        let listed = output(fm.execute(&json!({"action": "list", "path": "a.txt"})).await);
        assert_eq!(listed["path"], ".");

        let empty = output(fm.execute(&json!({"action": "list", "path": "scans"})).await);
        assert_eq!(empty["entries"], json!([]));
    }

    #[tokio::test]
    async fn list_missing_directory_is_not_found() {
        let (_dir, fm) = setup();
        let result = fm.execute(&json!({"action": "list", "path": "missing"})).await;
        assert_eq!(result, ToolResult::failure("not found"));
    }

    #[tokio::test]
    async fn invalid_arguments_rejected() {
        let (dir, fm) = setup();
        for args in [
            json!({"action": "delete", "path": "x"}),
            json!({"action": "write", "path": "x"}),
            json!({"path": "x"}),
        ] {
            let result = fm.execute(&args).await;
            assert!(matches!(result, ToolResult::Failure { reason } if reason.starts_with("invalid arguments")));
        }
        assert!(!dir.path().join("x").exists());
    }

    #[tokio::test]
    async fn write_to_directory_leaves_it_intact() {
        let (dir, fm) = setup();
        std::fs::create_dir(dir.path().join("scans")).unwrap();
        let result = fm
            .execute(&json!({"action": "write", "path": "scans", "content": "x"}))
            .await;
        assert!(!result.is_success());
        assert!(dir.path().join("scans").is_dir());
    }

    #[tokio::test]
    async fn confirmation_gates_writes_only() {
        let dir = tempfile::tempdir().unwrap();
        let fm = FileManagerTool::new(WorkspaceRoot::new(dir.path()).unwrap())
            .with_confirmation(Arc::new(DenyAll));
        assert!(fm.schema().requires_approval);

        let args = json!({"action": "write", "path": "r.md", "content": "report"});
        let request = fm.approval_request(&args).unwrap();
        assert_eq!(request.command, "write r.md (6 bytes)");
        assert!(fm.approval_request(&json!({"action": "list", "path": "."})).is_none());

        let result = fm.execute(&args).await;
        assert_eq!(result, ToolResult::failure("denied by operator: not now"));
        assert!(!dir.path().join("r.md").exists());

        let approved = fm.execute_approved(&args, &ApprovalDecision::Approve).await;
        assert!(approved.is_success());
    }

    #[tokio::test]
    async fn approved_confirmation_writes() {
        let dir = tempfile::tempdir().unwrap();
        let fm = FileManagerTool::new(WorkspaceRoot::new(dir.path()).unwrap())
            .with_confirmation(Arc::new(AutoApprove));
        let result = fm
            .execute(&json!({"action": "write", "path": "ok.txt", "content": "fine"}))
            .await;
        assert!(result.is_success());
        assert_eq!(std::fs::read_to_string(dir.path().join("ok.txt")).unwrap(), "fine");
    }
}
