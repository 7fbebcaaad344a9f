//! System prompt, tool catalog and history rendering.
//!
//! The decision step sends the model one system message (persona, rules,
//! catalog, output format) followed by the session log rendered as chat
//! messages.

use heimdall_core::memory::MemoryEntry;
use heimdall_core::message::Message;
use heimdall_core::tool::{FieldSpec, ToolSchema};
use serde_json::{Value, json};
use std::fmt::Write;

/// Who Heimdall is and how it works.
pub const PERSONA: &str = "\
You are Heimdall, an AI assistant that helps a human operator carry out ethical, \
authorized penetration tests.

You work in a loop: read the operator's request and any tool results, think, then \
choose exactly one next action. Either call one tool, or reply to the operator.

## Methodology
1. Analyze the request and any previous tool output.
2. Recall what the conversation has already established.
3. Plan the next step following a standard methodology: reconnaissance, scanning \
and enumeration, gaining access, maintaining access, reporting. Enumerate before \
you suggest exploitation.
4. If you are unsure, search the web or ask the operator a clarifying question.

## Safety rules
- Console commands (and file writes, when confirmation is on) are shown to the \
operator, who approves, denies or edits them. Propose the action; never claim it \
ran before you see its output.
- Give the reason for every tool call in your thought, and pass it as the tool's \
`reason` argument where the tool has one.
- Stay within the operator's authorized scope. Never suggest illegal or harmful \
actions.
- A denied action is final. Adapt your plan instead of retrying the same thing.
- Keep notes, scan output and reports in the workspace with the file manager.";

/// How the model must format every reply.
pub const OUTPUT_FORMAT: &str = "\
## Output format
Reply with a single JSON object and nothing else:
{\"thought\": string, \"tool_to_use\": string|null, \"tool_parameters\": object|null, \"response_to_user\": string|null}
- `thought`: your reasoning for this step.
- To use a tool: set `tool_to_use` to the exact tool name and `tool_parameters` to its \
arguments. Set `response_to_user` to null.
- To reply to the operator: set `response_to_user` and leave `tool_to_use` and \
`tool_parameters` null.
- Use exactly one mode per reply.";

/// The full system message for a decision.
pub fn system_prompt(catalog: &[&ToolSchema]) -> String {
    format!("{PERSONA}\n\n{}\n{OUTPUT_FORMAT}", render_catalog(catalog))
}

/// Describe every tool's name, purpose and fields.
pub fn render_catalog(catalog: &[&ToolSchema]) -> String {
    let mut out = String::from("## Tools\n");
    if catalog.is_empty() {
        out.push_str("No tools are available. Reply to the operator directly.\n");
        return out;
    }
    for schema in catalog {
        let _ = writeln!(out, "\n### {}\n{}", schema.name, schema.description);
        if schema.requires_approval {
            out.push_str("Requires operator approval before it runs.\n");
        }
        out.push_str("Input:\n");
        render_fields(&mut out, &schema.input_fields);
        if !schema.output_fields.is_empty() {
            out.push_str("Output:\n");
            render_fields(&mut out, &schema.output_fields);
        }
    }
    out
}

fn render_fields(out: &mut String, fields: &[FieldSpec]) {
    for field in fields {
        let presence = if field.required { "required" } else { "optional" };
        let _ = writeln!(
            out,
            "- {} ({}, {presence}): {}",
            field.name,
            field.field_type.describe(),
            field.description
        );
    }
}

/// The assistant-side JSON for a tool call, in the output format above.
pub fn tool_call_json(tool_name: &str, arguments: &Value, rationale: Option<&str>) -> String {
    json!({
        "thought": rationale,
        "tool_to_use": tool_name,
        "tool_parameters": arguments,
        "response_to_user": null,
    })
    .to_string()
}

/// Render the session log as chat messages, oldest first.
pub fn render_history(history: &[MemoryEntry]) -> Vec<Message> {
    history
        .iter()
        .map(|entry| match entry {
            MemoryEntry::UserMessage { text } => Message::user(text.as_str()),
            MemoryEntry::AgentUtterance { text } => Message::assistant(text.as_str()),
            MemoryEntry::ToolCall {
                tool_name,
                arguments,
                rationale,
            } => Message::assistant(tool_call_json(tool_name, arguments, rationale.as_deref())),
            MemoryEntry::ToolOutcome { tool_name, result } => {
                let body = serde_json::to_string_pretty(result).unwrap_or_default();
                Message::user(format!("Tool '{tool_name}' output:\n{body}"))
            }
        })
        .collect()
}
