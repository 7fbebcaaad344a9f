//! DuckDuckGo search backend.
//!
//! Text search scrapes the keyless HTML endpoint. Image and news search use
//! the JSON endpoints behind the main site, which need a `vqd` token taken
//! from a first request for the query.

use crate::scraper::{USER_AGENT, decode_entities, strip_tags};
use crate::search::{SearchBackend, SearchCategory, SearchHit, dedup_by_url};
use async_trait::async_trait;
use heimdall_core::error::SearchError;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

const HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const SITE: &str = "https://duckduckgo.com";

static RESULT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("valid pattern")
});
static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|div|td)>"#).expect("valid pattern")
});
static VQD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"vqd=["']?([0-9-]+)"#).expect("valid pattern"));

/// DuckDuckGo backend; needs no API key.
pub struct DuckDuckGoBackend {
    client: reqwest::Client,
    region: String,
    safesearch: String,
}

impl DuckDuckGoBackend {
    pub fn new(region: impl Into<String>, safesearch: impl Into<String>) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            region: region.into(),
            safesearch: safesearch.into(),
        })
    }

    /// Value of the `p` parameter of the JSON endpoints.
    fn safesearch_param(&self) -> &'static str {
        match self.safesearch.as_str() {
            "on" => "1",
            "moderate" => "-1",
            _ => "-2",
        }
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, SearchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }
        response
            .text()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))
    }

    async fn text_search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let html = self
            .get_text(
                HTML_ENDPOINT,
                &[("q", query), ("kl", self.region.as_str()), ("kp", self.safesearch_param())],
            )
            .await?;
        Ok(parse_html_results(&html, max_results))
    }

    async fn vqd(&self, query: &str) -> Result<String, SearchError> {
        let page = self.get_text(SITE, &[("q", query)]).await?;
        extract_vqd(&page).ok_or_else(|| SearchError::Parse("no vqd token in response".into()))
    }

    async fn json_search(
        &self,
        query: &str,
        category: SearchCategory,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let vqd = self.vqd(query).await?;
        let (endpoint, extra) = match category {
            SearchCategory::Images => ("i.js", ("f", ",,,,,")),
            _ => ("news.js", ("noamp", "1")),
        };
        let url = format!("{SITE}/{endpoint}");
        let body = self
            .get_text(
                &url,
                &[
                    ("l", self.region.as_str()),
                    ("o", "json"),
                    ("q", query),
                    ("vqd", vqd.as_str()),
                    ("p", self.safesearch_param()),
                    extra,
                ],
            )
            .await?;

        let hits = match category {
            SearchCategory::Images => parse_image_results(&body)?,
            _ => parse_news_results(&body)?,
        };
        Ok(hits.into_iter().take(max_results).collect())
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoBackend {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        category: SearchCategory,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        debug!(query, category = category.as_str(), max_results, "DuckDuckGo search");
        let hits = match category {
            SearchCategory::Text => self.text_search(query, max_results).await?,
            other => self.json_search(query, other, max_results).await?,
        };
        Ok(dedup_by_url(hits))
    }
}

/// Parse results from the HTML endpoint, ads excluded.
pub fn parse_html_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    html.split("result__body")
        .skip(1)
        .filter_map(|chunk| {
            let link = RESULT_LINK_RE.captures(chunk)?;
            let url = resolve_redirect(&decode_entities(&link[1]))?;
            let title = strip_tags(&link[2]);
            if title.is_empty() {
                return None;
            }
            let snippet = SNIPPET_RE
                .captures(chunk)
                .map(|c| strip_tags(&c[1]))
                .unwrap_or_default();
            Some(SearchHit { title, url, snippet })
        })
        .take(max_results)
        .collect()
}

/// Result links go through `/l/?uddg=<target>`; recover the target.
/// Ad links (`y.js`) yield `None`.
fn resolve_redirect(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else if href.starts_with('/') {
        format!("{SITE}{href}")
    } else {
        href.to_string()
    };
    let parsed = reqwest::Url::parse(&absolute).ok()?;

    if parsed.domain().is_some_and(|d| d.ends_with("duckduckgo.com")) {
        if parsed.path().ends_with("y.js") {
            return None;
        }
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned());
    }
    Some(absolute)
}

pub fn extract_vqd(page: &str) -> Option<String> {
    VQD_RE.captures(page).map(|c| c[1].to_string())
}

#[derive(Debug, Deserialize)]
struct JsonResults<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    url: String,
    width: Option<u64>,
    height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct NewsResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    excerpt: String,
    #[serde(default)]
    url: String,
    source: Option<String>,
    date: Option<i64>,
}

fn parse_image_results(body: &str) -> Result<Vec<SearchHit>, SearchError> {
    let parsed: JsonResults<ImageResult> =
        serde_json::from_str(body).map_err(|e| SearchError::Parse(e.to_string()))?;
    Ok(parsed
        .results
        .into_iter()
        .filter(|r| !r.url.is_empty())
        .map(|r| {
            let size = match (r.width, r.height) {
                (Some(w), Some(h)) => format!(" ({w}x{h})"),
                _ => String::new(),
            };
            SearchHit {
                title: decode_entities(&r.title),
                url: r.url,
                snippet: format!("image: {}{size}", r.image),
            }
        })
        .collect())
}

fn parse_news_results(body: &str) -> Result<Vec<SearchHit>, SearchError> {
    let parsed: JsonResults<NewsResult> =
        serde_json::from_str(body).map_err(|e| SearchError::Parse(e.to_string()))?;
    Ok(parsed
        .results
        .into_iter()
        .filter(|r| !r.url.is_empty())
        .map(|r| {
            let date = r
                .date
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                .map(|d| d.format("%Y-%m-%d").to_string());
            let prefix = match (r.source, date) {
                (Some(source), Some(date)) => format!("{source}, {date}: "),
                (Some(source), None) => format!("{source}: "),
                (None, Some(date)) => format!("{date}: "),
                (None, None) => String::new(),
            };
            SearchHit {
                title: decode_entities(&r.title),
                url: r.url,
                snippet: format!("{prefix}{}", strip_tags(&r.excerpt)),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <div class="result results_links result--ad">
          <div class="links_main links_deep result__body">
            <a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_domain=x">Sponsored</a>
          </div>
        </div>
        <div class="result results_links">
          <div class="links_main links_deep result__body">
            <h2 class="result__title">
              <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fnmap.org%2Fbook%2Fman.html&amp;rut=abc">Nmap <b>Reference</b> Guide</a>
            </h2>
            <a class="result__snippet" href="x">The <b>Nmap</b> reference &amp; options.</a>
          </div>
        </div>
        <div class="result results_links">
          <div class="links_main links_deep result__body">
            <a rel="nofollow" class="result__a" href="https://example.org/direct">Direct</a>
          </div>
        </div>"#;

    #[test]
    fn html_results_parsed_and_ads_skipped() {
        let hits = parse_html_results(HTML, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Nmap Reference Guide");
        assert_eq!(hits[0].url, "https://nmap.org/book/man.html");
        assert_eq!(hits[0].snippet, "The Nmap reference & options.");
        assert_eq!(hits[1].url, "https://example.org/direct");
        assert_eq!(hits[1].snippet, "");
    }

    #[test]
    fn html_results_respect_limit() {
        assert_eq!(parse_html_results(HTML, 1).len(), 1);
        assert!(parse_html_results("<html>no results</html>", 5).is_empty());
    }

    #[test]
    fn vqd_extraction() {
        assert_eq!(
            extract_vqd(r#"...vqd="4-1234567890123456789012345678",..."#).as_deref(),
            Some("4-1234567890123456789012345678")
        );
        assert_eq!(extract_vqd("&vqd=4-99&p=1").as_deref(), Some("4-99"));
        assert!(extract_vqd("nothing here").is_none());
    }

    #[test]
    fn news_results_parsed() {
        let body = r#"{"results":[
            {"title":"Patch &amp; pray","excerpt":"<b>Critical</b> flaw","url":"https://news.example/a","source":"Example","date":1700000000},
            {"title":"No url","excerpt":"x","url":""}
        ]}"#;
        let hits = parse_news_results(body).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Patch & pray");
        assert_eq!(hits[0].snippet, "Example, 2023-11-14: Critical flaw");
    }

    #[test]
    fn image_results_parsed() {
        let body = r#"{"results":[{"title":"Diagram","image":"https://img.example/d.png","url":"https://site.example/page","width":640,"height":480}]}"#;
        let hits = parse_image_results(body).unwrap();
        assert_eq!(hits[0].url, "https://site.example/page");
        assert_eq!(hits[0].snippet, "image: https://img.example/d.png (640x480)");
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_news_results("<html>"), Err(SearchError::Parse(_))));
    }

    #[test]
    fn safesearch_mapping() {
        let backend = DuckDuckGoBackend::new("wt-wt", "moderate").unwrap();
        assert_eq!(backend.safesearch_param(), "-1");
        let backend = DuckDuckGoBackend::new("wt-wt", "off").unwrap();
        assert_eq!(backend.safesearch_param(), "-2");
    }
}
