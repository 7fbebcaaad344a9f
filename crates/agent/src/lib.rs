//! The Heimdall agent: decision step and orchestration loop.
//!
//! Each operator turn runs a **Decide → Approve → Execute → Observe** cycle:
//!
//! 1. **Receive** a line from the operator and record it in memory
//! 2. **Decide** the next action from the memory snapshot and tool catalog
//! 3. **Approve** side-effecting tool calls with the operator
//! 4. **Execute** the tool and record its outcome, then decide again
//! 5. **Respond** with a final answer and wait for the next line
//!
//! The turn ends on a final answer, a decision failure or the step limit.

pub mod decision;
pub mod prompt;
pub mod session;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use decision::{Decider, DecisionStep, parse_decision};
pub use session::Session;
