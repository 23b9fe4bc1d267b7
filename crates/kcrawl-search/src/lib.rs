//! KCrawl Search - Source-text retrieval
//!
//! Every backend takes the augmented query list for one entity and returns
//! one aggregated block of raw text. An empty block means nothing was found;
//! the pipeline then skips the entity.
//!
//! Author: hephaex@gmail.com

use std::collections::HashSet;
use std::sync::Arc;

use kcrawl_core::{KcError, Result, Retriever, SearchConfig, SearchProvider};

pub mod corpus;
pub mod searxng;
pub mod simulated;

pub use corpus::CorpusRetriever;
pub use searxng::SearxngRetriever;
pub use simulated::SimulatedRetriever;

/// Create a retriever from config
pub fn create_retriever(config: &SearchConfig) -> Result<Arc<dyn Retriever>> {
    match config.provider {
        SearchProvider::Searxng => Ok(Arc::new(SearxngRetriever::from_config(config)?)),
        SearchProvider::Corpus => {
            let dir = config.corpus_dir.as_ref().ok_or_else(|| {
                KcError::ConfigError("corpus_dir is required for corpus retrieval".to_string())
            })?;
            Ok(Arc::new(
                CorpusRetriever::open(dir)?.with_max_text_chars(config.max_text_chars),
            ))
        }
        SearchProvider::Simulated => Ok(Arc::new(SimulatedRetriever::new())),
    }
}

// ============================================================================
// Text aggregation
// ============================================================================

/// Collects text snippets, dropping duplicates and stopping at a size cap
#[derive(Debug)]
pub struct TextAggregator {
    max_chars: usize,
    chars: usize,
    seen: HashSet<String>,
    parts: Vec<String>,
}

impl TextAggregator {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            chars: 0,
            seen: HashSet::new(),
            parts: Vec::new(),
        }
    }

    /// Add a snippet; returns false once the cap has been reached
    pub fn push(&mut self, snippet: &str) -> bool {
        if self.is_full() {
            return false;
        }

        let snippet = snippet.trim();
        if snippet.is_empty() || !self.seen.insert(snippet.to_string()) {
            return true;
        }

        let remaining = self.max_chars - self.chars;
        let taken: String = snippet.chars().take(remaining).collect();
        self.chars += taken.chars().count();
        self.parts.push(taken);
        !self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.chars >= self.max_chars
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Join snippets with blank lines
    pub fn finish(self) -> String {
        self.parts.join("\n\n")
    }
}
