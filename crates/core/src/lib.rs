//! # Heimdall Core
//!
//! Domain types, traits, and error definitions for the Heimdall pentest
//! assistant. This crate has **no framework dependencies**; it defines the
//! model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here: the reasoning
//! [`Provider`], each [`Tool`], the [`Approver`] and the [`Operator`].
//! Implementations live in their own crates, and tests swap in scripted ones.

pub mod agent;
pub mod approval;
pub mod error;
pub mod memory;
pub mod message;
pub mod operator;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{Decision, LoopState};
pub use approval::{ApprovalDecision, ApprovalRequest, Approver, AutoApprove};
pub use error::{DecisionError, Error, MemoryError, ProviderError, Result, SearchError, ToolError};
pub use memory::MemoryEntry;
pub use message::{Message, MessageToolCall, Role, SessionId};
pub use operator::{Operator, OperatorEvent};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{FieldSpec, FieldType, Tool, ToolRegistry, ToolResult, ToolSchema};
