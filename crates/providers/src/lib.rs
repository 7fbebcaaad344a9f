//! LLM Provider implementations for Heimdall.
//!
//! All providers implement the `heimdall_core::Provider` trait.
//! `build_from_config` selects the one the configuration names.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, default_base_url};
