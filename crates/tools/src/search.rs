//! Search and page-fetch capabilities used by the web search tool.
//!
//! Both are traits so the tool can run against DuckDuckGo and plain HTTP in
//! production and against deterministic stubs in tests.

use async_trait::async_trait;
use heimdall_core::error::SearchError;
use serde::{Deserialize, Serialize};

/// Kind of search to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchCategory {
    Text,
    Images,
    News,
}

impl SearchCategory {
    pub const ALL: [&'static str; 3] = ["text", "images", "news"];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "images" => Some(Self::Images),
            "news" => Some(Self::News),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Images => "images",
            Self::News => "news",
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Something that turns a query into ranked results.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        category: SearchCategory,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;
}

/// Something that downloads a page and returns its readable text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, SearchError>;
}

/// Keep the first occurrence of every URL, preserving rank.
pub fn dedup_by_url(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = std::collections::HashSet::new();
    hits.into_iter()
        .filter(|hit| seen.insert(hit.url.clone()))
        .collect()
}
