//! Vec-backed agent memory for one session.

use heimdall_core::error::MemoryError;
use heimdall_core::memory::MemoryEntry;
use tracing::debug;

/// The append-only session log.
///
/// Owned by the orchestration loop; the decision step only ever receives a
/// borrowed [`snapshot`](AgentMemory::snapshot). A `ToolCall` must be
/// resolved by a `ToolOutcome` for the same tool before anything else may be
/// appended.
#[derive(Debug, Default)]
pub struct AgentMemory {
    entries: Vec<MemoryEntry>,
    pending: Option<String>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, returning its index.
    pub fn append(&mut self, entry: MemoryEntry) -> Result<usize, MemoryError> {
        match (&entry, self.pending.as_deref()) {
            (MemoryEntry::ToolOutcome { tool_name, .. }, None) => {
                return Err(MemoryError::OrphanOutcome {
                    tool_name: tool_name.clone(),
                });
            }
            (MemoryEntry::ToolOutcome { tool_name, .. }, Some(expected)) => {
                if tool_name != expected {
                    return Err(MemoryError::OutcomeMismatch {
                        expected: expected.to_string(),
                        got: tool_name.clone(),
                    });
                }
                self.pending = None;
            }
            (_, Some(pending)) => {
                return Err(MemoryError::CallPending {
                    pending: pending.to_string(),
                });
            }
            (MemoryEntry::ToolCall { tool_name, .. }, None) => {
                self.pending = Some(tool_name.clone());
            }
            (_, None) => {}
        }

        let index = self.entries.len();
        debug!(index, kind = entry.kind(), "Memory append");
        self.entries.push(entry);
        Ok(index)
    }

    /// The most recent `max` entries in chronological order, or all of them.
    pub fn snapshot(&self, max: Option<usize>) -> &[MemoryEntry] {
        let start = max.map_or(0, |m| self.entries.len().saturating_sub(m));
        &self.entries[start..]
    }

    /// Name of the tool whose call still awaits an outcome.
    pub fn pending_call(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn get(&self, index: usize) -> Option<&MemoryEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
