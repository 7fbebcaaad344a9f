//! Security module for Heimdall: workspace path confinement.
//!
//! Shell commands are gated by operator approval, not here; this crate only
//! keeps file access inside the workspace directory.

pub mod path;

pub use path::{PathValidationError, WorkspaceRoot};
