//! Tool contract: typed schemas, results and the registry.
//!
//! Every capability the agent can invoke (console commands, workspace files,
//! web search) implements [`Tool`]. The orchestration loop and the decision
//! step only ever see a tool's [`ToolSchema`]; concrete types are resolved
//! once at bootstrap through the [`ToolRegistry`].

use crate::approval::{ApprovalDecision, ApprovalRequest};
use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The type a single schema field accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    /// A string restricted to a fixed set of values.
    Enum { values: Vec<String> },
    Array,
    Object,
}

impl FieldType {
    pub fn one_of(values: &[&str]) -> Self {
        Self::Enum {
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Enum { values } => value
                .as_str()
                .is_some_and(|s| values.iter().any(|v| v == s)),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }

    /// Human-readable type name, as shown in validation errors and the catalog.
    pub fn describe(&self) -> String {
        match self {
            Self::Enum { values } => format!("one of [{}]", values.join(", ")),
            Self::String => "string".into(),
            Self::Integer => "integer".into(),
            Self::Boolean => "boolean".into(),
            Self::Array => "array".into(),
            Self::Object => "object".into(),
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            Self::Enum { values } => serde_json::json!({ "type": "string", "enum": values }),
            Self::String => serde_json::json!({ "type": "string" }),
            Self::Integer => serde_json::json!({ "type": "integer" }),
            Self::Boolean => serde_json::json!({ "type": "boolean" }),
            Self::Array => serde_json::json!({ "type": "array" }),
            Self::Object => serde_json::json!({ "type": "object" }),
        }
    }
}

/// One named field of a tool's input or output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
}

impl FieldSpec {
    pub fn required(name: &str, field_type: FieldType, description: &str) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: &str, field_type: FieldType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type, description)
        }
    }
}

/// The immutable description of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_fields: Vec<FieldSpec>,
    pub output_fields: Vec<FieldSpec>,

    /// Whether invocations pass through operator approval before running
    #[serde(default)]
    pub requires_approval: bool,
}

impl ToolSchema {
    /// Check `arguments` against `input_fields`.
    ///
    /// Arguments must be a JSON object. Every required field must be present
    /// and non-null, every present field must have the declared type, and
    /// fields the schema does not declare are rejected.
    pub fn validate(&self, arguments: &Value) -> Result<(), String> {
        let Some(object) = arguments.as_object() else {
            return Err("arguments must be a JSON object".into());
        };

        if let Some(unknown) = object
            .keys()
            .find(|key| !self.input_fields.iter().any(|f| &f.name == *key))
        {
            return Err(format!("unknown field '{unknown}'"));
        }

        for field in &self.input_fields {
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(format!("missing required field '{}'", field.name));
                    }
                }
                Some(value) => {
                    if !field.field_type.accepts(value) {
                        return Err(format!(
                            "field '{}' must be {}",
                            field.name,
                            field.field_type.describe()
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// JSON Schema for the input fields, as sent to providers.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for field in &self.input_fields {
            let mut schema = field.field_type.json_schema();
            schema["description"] = Value::String(field.description.clone());
            properties.insert(field.name.clone(), schema);
        }
        let required: Vec<&str> = self
            .input_fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }
}

/// The result of a tool execution: exactly one of output or reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success { output: Value },
    Failure { reason: String },
}

impl ToolResult {
    pub fn success(output: Value) -> Self {
        Self::Success { output }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn invalid_arguments(detail: impl std::fmt::Display) -> Self {
        Self::failure(format!("invalid arguments: {detail}"))
    }

    pub fn denied(reason: Option<&str>) -> Self {
        match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => Self::failure(format!("denied by operator: {reason}")),
            None => Self::failure("denied by operator"),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// The core Tool trait.
///
/// `execute` never fails across this boundary: bad arguments, denials and
/// backend trouble all come back as [`ToolResult::Failure`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> &ToolSchema;

    fn name(&self) -> &str {
        &self.schema().name
    }

    /// The approval this invocation needs before it may run, if any.
    ///
    /// Returns `None` for invocations that can run straight away, including
    /// ones whose arguments are invalid (execution reports those).
    fn approval_request(&self, _arguments: &Value) -> Option<ApprovalRequest> {
        None
    }

    /// Validate and run an invocation, including any approval it needs.
    async fn execute(&self, arguments: &Value) -> ToolResult;

    /// Run an invocation whose approval has already been decided.
    async fn execute_approved(&self, arguments: &Value, decision: &ApprovalDecision) -> ToolResult {
        match decision {
            ApprovalDecision::Deny { reason } => ToolResult::denied(reason.as_deref()),
            _ => self.execute(arguments).await,
        }
    }

    fn to_definition(&self) -> ToolDefinition {
        let schema = self.schema();
        ToolDefinition {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.to_json_schema(),
        }
    }
}

/// The session's tool catalog, in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Names must be unique within the catalog.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    pub fn schema(&self, name: &str) -> Option<&ToolSchema> {
        self.get(name).map(|t| t.schema())
    }

    pub fn schemas(&self) -> impl Iterator<Item = &ToolSchema> {
        self.tools.iter().map(|t| t.schema())
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool by name, approval included.
    pub async fn execute(&self, name: &str, arguments: &Value) -> Result<ToolResult, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        Ok(tool.execute(arguments).await)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
