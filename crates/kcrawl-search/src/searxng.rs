//! Web retrieval through a SearxNG-compatible JSON search API

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use kcrawl_core::{KcError, Result, Retriever, SearchConfig};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use crate::TextAggregator;

/// SearxNG web retriever
pub struct SearxngRetriever {
    client: Client,
    base_url: String,
    language: Option<String>,
    max_results_per_query: usize,
    max_text_chars: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl SearxngRetriever {
    /// Create from config
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KcError::RetrievalError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.searxng_url.trim_end_matches('/').to_string(),
            language: config.language.clone(),
            max_results_per_query: config.max_results_per_query,
            max_text_chars: config.max_text_chars,
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let mut params = vec![("q", query), ("format", "json")];
        if let Some(language) = &self.language {
            params.push(("language", language.as_str()));
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| KcError::RetrievalError(format!("Search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(KcError::RetrievalError(format!(
                "Search engine returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| KcError::RetrievalError(format!("Failed to parse search response: {e}")))?;

        Ok(body.results)
    }

    /// Fold the hits of one query into the aggregate
    fn collect_hits(&self, hits: Vec<SearchHit>, agg: &mut TextAggregator) {
        for hit in hits.into_iter().take(self.max_results_per_query) {
            let content = strip_html(&hit.content);
            if content.is_empty() {
                continue;
            }
            let snippet = format!("{}\n{}\n(source: {})", strip_html(&hit.title), content, hit.url);
            if !agg.push(&snippet) {
                break;
            }
        }
    }
}

fn strip_html(text: &str) -> String {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").ok());

    let stripped = match tag {
        Some(re) => re.replace_all(text, ""),
        None => text.into(),
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Retriever for SearxngRetriever {
    async fn retrieve(&self, queries: &[String]) -> Result<String> {
        let mut agg = TextAggregator::new(self.max_text_chars);

        for query in queries {
            match self.search(query).await {
                Ok(hits) => {
                    tracing::debug!(query = %query, hits = hits.len(), "Search results");
                    self.collect_hits(hits, &mut agg);
                }
                Err(e) => tracing::warn!(query = %query, error = %e, "Search query failed"),
            }
            if agg.is_full() {
                break;
            }
        }

        Ok(agg.finish())
    }

    fn name(&self) -> &str {
        "searxng"
    }
}
