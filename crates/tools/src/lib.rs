//! Built-in tools for Heimdall.
//!
//! Three tools give the agent its reach: the approval-gated console, the
//! workspace-confined file manager and web search.

pub mod console;
pub mod duckduckgo;
pub mod file_manager;
pub mod scraper;
pub mod search;
pub mod web_search;

pub use console::ConsoleTool;
pub use duckduckgo::DuckDuckGoBackend;
pub use file_manager::FileManagerTool;
pub use scraper::HttpPageFetcher;
pub use search::{PageFetcher, SearchBackend, SearchCategory, SearchHit};
pub use web_search::WebSearchTool;

use heimdall_config::AppConfig;
use heimdall_core::approval::Approver;
use heimdall_core::error::Error;
use heimdall_core::provider::Provider;
use heimdall_core::tool::ToolRegistry;
use heimdall_security::WorkspaceRoot;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Characters kept from each fetched page.
const FETCH_MAX_CHARS: usize = 4_000;

fn setup_error(message: impl std::fmt::Display) -> Error {
    Error::Config {
        message: message.to_string(),
    }
}

/// Build the registry with the console, file manager and web search tools.
///
/// Creates the workspace directory if needed. `summarizer` is only used when
/// `[tools.web_search] summarize` is on and pages are fetched.
pub fn default_registry(
    config: &AppConfig,
    approver: Arc<dyn Approver>,
    summarizer: Option<Arc<dyn Provider>>,
) -> Result<ToolRegistry, Error> {
    std::fs::create_dir_all(&config.workspace.dir).map_err(|e| {
        setup_error(format!(
            "cannot create workspace {}: {e}",
            config.workspace.dir.display()
        ))
    })?;
    let workspace = WorkspaceRoot::new(&config.workspace.dir).map_err(setup_error)?;

    let console = ConsoleTool::new(workspace.path(), approver.clone())
        .with_timeout(Duration::from_secs(config.tools.console.timeout_secs))
        .with_max_output(config.tools.console.max_output_bytes);

    let mut file_manager = FileManagerTool::new(workspace.clone());
    if config.tools.file_manager.confirm_writes {
        file_manager = file_manager.with_confirmation(approver);
    }

    let search = &config.tools.web_search;
    let backend = DuckDuckGoBackend::new(&search.region, &search.safesearch).map_err(setup_error)?;
    let mut web_search = WebSearchTool::new(Arc::new(backend)).with_default_results(search.max_results);
    if search.fetch_top > 0 {
        let fetcher = HttpPageFetcher::new(FETCH_MAX_CHARS).map_err(setup_error)?;
        web_search = web_search.with_fetcher(Arc::new(fetcher), search.fetch_top);
        if search.summarize
            && let Some(provider) = summarizer
        {
            web_search = web_search.with_summarizer(provider, config.resolved_model());
        }
    }

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(console))?;
    registry.register(Box::new(file_manager))?;
    registry.register(Box::new(web_search))?;
    info!(
        workspace = %workspace.path().display(),
        tools = ?registry.names(),
        "Tool registry ready"
    );
    Ok(registry)
}
