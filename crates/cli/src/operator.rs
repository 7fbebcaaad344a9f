//! Terminal operator: reads the chat and approval answers from one input
//! stream and prints session events to stdout.

use async_trait::async_trait;
use heimdall_core::approval::{ApprovalDecision, ApprovalRequest, Approver};
use heimdall_core::operator::{Operator, OperatorEvent};
use heimdall_core::tool::ToolResult;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Longest tool output echoed to the terminal.
const PREVIEW_CHARS: usize = 600;

/// What the operator typed at an approval prompt.
#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Yes,
    No,
    Edit,
}

fn parse_choice(answer: &str) -> Option<Choice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(Choice::Yes),
        "n" | "no" => Some(Choice::No),
        "e" | "edit" => Some(Choice::Edit),
        _ => None,
    }
}

pub struct ConsoleOperator<R> {
    lines: Mutex<Lines<R>>,
}

impl ConsoleOperator<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> ConsoleOperator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    async fn prompt(&self, label: &str) -> Option<String> {
        print!("{label}");
        let _ = std::io::stdout().flush();
        match self.lines.lock().await.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read operator input");
                None
            }
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Approver for ConsoleOperator<R> {
    async fn review(&self, request: &ApprovalRequest) -> ApprovalDecision {
        println!();
        println!("  ┌─ Approval required: {}", request.tool_name);
        println!("  │ Command:   {}", request.command);
        println!("  │ Directory: {}", request.working_directory);
        if let Some(reason) = &request.reason {
            println!("  │ Reason:    {reason}");
        }
        println!("  └─");

        loop {
            let Some(answer) = self.prompt("  Approve? [y]es / [n]o / [e]dit: ").await else {
                return ApprovalDecision::Deny {
                    reason: Some("no operator input".into()),
                };
            };
            match parse_choice(&answer) {
                Some(Choice::Yes) => return ApprovalDecision::Approve,
                Some(Choice::No) => {
                    let reason = self
                        .prompt("  Reason (optional): ")
                        .await
                        .map(|r| r.trim().to_string())
                        .filter(|r| !r.is_empty());
                    return ApprovalDecision::Deny { reason };
                }
                Some(Choice::Edit) => {
                    let command = self.prompt("  New command: ").await.unwrap_or_default();
                    let command = command.trim();
                    if command.is_empty() {
                        println!("  Empty command, try again.");
                        continue;
                    }
                    return ApprovalDecision::Amend {
                        command: command.to_string(),
                    };
                }
                None => println!("  Please answer y, n or e."),
            }
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Operator for ConsoleOperator<R> {
    async fn read_input(&self) -> Option<String> {
        println!();
        self.prompt("  You > ").await
    }

    fn notify(&self, event: &OperatorEvent) {
        for line in render_event(event) {
            println!("{line}");
        }
    }
}

fn render_event(event: &OperatorEvent) -> Vec<String> {
    match event {
        OperatorEvent::Thought(text) => vec![format!("  Thought > {text}")],
        OperatorEvent::ToolInvoked {
            tool_name,
            arguments,
        } => vec![format!("  Tool    > {tool_name} {arguments}")],
        OperatorEvent::ToolFinished { tool_name, result } => match result {
            ToolResult::Success { output } => vec![format!(
                "  Result  > {tool_name} ok: {}",
                preview(&output.to_string())
            )],
            ToolResult::Failure { reason } => {
                vec![format!("  Result  > {tool_name} failed: {reason}")]
            }
        },
        OperatorEvent::Answer(text) => {
            let mut lines = vec![String::new()];
            lines.extend(text.lines().map(|l| format!("  Heimdall > {l}")));
            lines
        }
        OperatorEvent::Notice(text) => vec![format!("  [{text}]")],
    }
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
