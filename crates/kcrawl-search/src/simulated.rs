//! Offline simulated retrieval

use async_trait::async_trait;
use kcrawl_core::{Result, Retriever};

/// Returns one canned passage per query; an empty query list yields no text
#[derive(Debug, Clone, Default)]
pub struct SimulatedRetriever;

impl SimulatedRetriever {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Retriever for SimulatedRetriever {
    async fn retrieve(&self, queries: &[String]) -> Result<String> {
        let passages: Vec<String> = queries
            .iter()
            .filter(|q| !q.trim().is_empty())
            .map(|q| format!("[simulated] Reference material retrieved for query: {q}"))
            .collect();
        Ok(passages.join("\n\n"))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_passages() {
        let text = tokio_test::block_on(
            SimulatedRetriever::new().retrieve(&["水库调度".to_string(), " ".to_string()]),
        )
        .unwrap();
        assert_eq!(text, "[simulated] Reference material retrieved for query: 水库调度");

        let empty = tokio_test::block_on(SimulatedRetriever::new().retrieve(&[])).unwrap();
        assert!(empty.is_empty());
    }
}
