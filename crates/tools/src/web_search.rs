//! Web search tool.
//!
//! Ranked results come from a [`SearchBackend`]. When a [`PageFetcher`] is
//! attached the top pages are pulled as text, and when a summarizer model is
//! attached as well those pages are condensed into a short summary.

use crate::search::{PageFetcher, SearchBackend, SearchCategory, SearchHit, dedup_by_url};
use async_trait::async_trait;
use heimdall_core::message::Message;
use heimdall_core::provider::{Provider, ProviderRequest};
use heimdall_core::tool::{FieldSpec, FieldType, Tool, ToolResult, ToolSchema};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

pub const NAME: &str = "web_search";

/// Hard cap on `max_results`.
pub const MAX_RESULTS_CAP: usize = 10;

const SUMMARY_PROMPT: &str = "You condense web pages for a penetration tester. Using only the \
    page extracts provided, write a factual summary of at most 200 words that answers the \
    query. Mention versions, CVE identifiers and commands verbatim when present. If the \
    extracts do not answer the query, say so.";

struct Summarizer {
    provider: Arc<dyn Provider>,
    model: String,
}

pub struct WebSearchTool {
    schema: ToolSchema,
    backend: Arc<dyn SearchBackend>,
    default_results: usize,
    fetcher: Option<(Arc<dyn PageFetcher>, usize)>,
    summarizer: Option<Summarizer>,
}

impl WebSearchTool {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            schema: schema(),
            backend,
            default_results: 3,
            fetcher: None,
            summarizer: None,
        }
    }

    pub fn with_default_results(mut self, n: usize) -> Self {
        self.default_results = n.clamp(1, MAX_RESULTS_CAP);
        self
    }

    /// Fetch the text of the top `top` hits after each search.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>, top: usize) -> Self {
        if top > 0 {
            self.fetcher = Some((fetcher, top));
        }
        self
    }

    /// Summarize fetched pages with `provider`. Has no effect without a fetcher.
    pub fn with_summarizer(mut self, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        self.summarizer = Some(Summarizer {
            provider,
            model: model.into(),
        });
        self
    }

    async fn fetch_pages(&self, hits: &[SearchHit]) -> Vec<(String, String)> {
        let Some((fetcher, top)) = &self.fetcher else {
            return Vec::new();
        };
        let fetches = hits.iter().take(*top).map(|hit| async move {
            match fetcher.fetch(&hit.url).await {
                Ok(text) if !text.trim().is_empty() => Some((hit.url.clone(), text)),
                Ok(_) => None,
                Err(e) => {
                    warn!(url = %hit.url, error = %e, "Page fetch failed");
                    None
                }
            }
        });
        futures::future::join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn summarize(&self, query: &str, pages: &[(String, String)]) -> Option<String> {
        let summarizer = self.summarizer.as_ref()?;
        if pages.is_empty() {
            return None;
        }

        let mut extracts = format!("Query: {query}\n");
        for (url, text) in pages {
            extracts.push_str(&format!("\n--- {url} ---\n{text}\n"));
        }
        let request = ProviderRequest::new(
            summarizer.model.clone(),
            vec![Message::system(SUMMARY_PROMPT), Message::user(extracts)],
        );

        match summarizer.provider.complete(request).await {
            Ok(response) => {
                let summary = response.message.content.trim().to_string();
                (!summary.is_empty()).then_some(summary)
            }
            Err(e) => {
                warn!(error = %e, "Search summary failed");
                None
            }
        }
    }
}

fn schema() -> ToolSchema {
    ToolSchema {
        name: NAME.into(),
        description: "Search the web with DuckDuckGo. Use it for CVE details, exploit \
                      references, tool documentation and recent security news."
            .into(),
        input_fields: vec![
            FieldSpec::required("query", FieldType::String, "What to search for"),
            FieldSpec::required(
                "category",
                FieldType::one_of(&SearchCategory::ALL),
                "Kind of results",
            ),
            FieldSpec::optional(
                "max_results",
                FieldType::Integer,
                "Number of results, at most 10",
            ),
        ],
        output_fields: vec![
            FieldSpec::required("results", FieldType::Array, "Ranked {title, url, snippet} entries"),
            FieldSpec::optional("summary", FieldType::String, "Summary of the top pages"),
        ],
        requires_approval: false,
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        if let Err(e) = self.schema.validate(arguments) {
            return ToolResult::invalid_arguments(e);
        }
        let query = arguments["query"].as_str().unwrap_or_default().trim();
        if query.is_empty() {
            return ToolResult::invalid_arguments("query must not be empty");
        }
        let Some(category) = arguments["category"].as_str().and_then(SearchCategory::parse) else {
            return ToolResult::invalid_arguments("unknown category");
        };
        let max_results = match arguments["max_results"].as_i64() {
            Some(n) if n < 1 => return ToolResult::invalid_arguments("max_results must be at least 1"),
            Some(n) => (n as usize).min(MAX_RESULTS_CAP),
            None => self.default_results,
        };

        debug!(backend = self.backend.name(), query, category = category.as_str(), "Web search");
        let hits = match self.backend.search(query, category, max_results).await {
            Ok(hits) => dedup_by_url(hits)
                .into_iter()
                .take(max_results)
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "Search backend failed");
                return ToolResult::failure(format!("search backend unavailable: {e}"));
            }
        };

        let mut output = json!({ "results": hits });
        if !hits.is_empty() {
            let pages = self.fetch_pages(&hits).await;
            if let Some(summary) = self.summarize(query, &pages).await {
                output["summary"] = Value::String(summary);
            }
        }
        ToolResult::success(output)
    }
}
