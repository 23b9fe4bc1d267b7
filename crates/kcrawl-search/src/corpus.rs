//! Offline retrieval over a local directory of text documents
//!
//! Paragraphs are ranked by how many distinct query terms they contain.

use std::path::Path;

use async_trait::async_trait;
use kcrawl_core::{KcError, Result, Retriever};
use kcrawl_parser::{read_corpus, CorpusDocument};

use crate::TextAggregator;

/// Terms shorter than this (in characters) are ignored
const MIN_TERM_CHARS: usize = 2;

/// Keyword retriever over local `.txt`/`.md` documents
pub struct CorpusRetriever {
    documents: Vec<CorpusDocument>,
    max_text_chars: usize,
}

impl CorpusRetriever {
    /// Read every document under `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let documents =
            read_corpus(dir).map_err(|e| KcError::RetrievalError(e.to_string()))?;
        tracing::info!(dir = %dir.display(), documents = documents.len(), "Opened corpus");
        Ok(Self::from_documents(documents))
    }

    pub fn from_documents(documents: Vec<CorpusDocument>) -> Self {
        Self {
            documents,
            max_text_chars: 20_000,
        }
    }

    pub fn with_max_text_chars(mut self, max_chars: usize) -> Self {
        self.max_text_chars = max_chars;
        self
    }

    /// Matching paragraphs, best first; ties keep corpus order
    fn rank(&self, terms: &[String]) -> Vec<&str> {
        let mut scored: Vec<(usize, &str)> = self
            .documents
            .iter()
            .flat_map(|doc| doc.paragraphs())
            .filter_map(|paragraph| {
                let lower = paragraph.to_lowercase();
                let score = terms.iter().filter(|t| lower.contains(t.as_str())).count();
                (score > 0).then_some((score, paragraph))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, p)| p).collect()
    }
}

/// Distinct lower-cased query terms
fn query_terms(queries: &[String]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for term in queries.iter().flat_map(|q| q.split_whitespace()) {
        let term = term.to_lowercase();
        if term.chars().count() >= MIN_TERM_CHARS && !terms.contains(&term) {
            terms.push(term);
        }
    }
    terms
}

#[async_trait]
impl Retriever for CorpusRetriever {
    async fn retrieve(&self, queries: &[String]) -> Result<String> {
        let terms = query_terms(queries);
        let mut agg = TextAggregator::new(self.max_text_chars);

        for paragraph in self.rank(&terms) {
            if !agg.push(paragraph) {
                break;
            }
        }

        Ok(agg.finish())
    }

    fn name(&self) -> &str {
        "corpus"
    }
}
