//! Agent memory for Heimdall sessions.
//!
//! Memory lives only as long as the process; nothing is persisted.

pub mod in_memory;

pub use in_memory::AgentMemory;
