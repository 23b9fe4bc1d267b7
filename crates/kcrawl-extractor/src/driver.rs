//! Multi-entity driver
//!
//! Loads the roster once and runs the pipeline for each entry in order. An
//! entity failure is logged and counted; only a missing or empty roster ends
//! the run.

use std::collections::HashMap;

use kcrawl_core::{canonicalize, KcError, RosterSource};
use thiserror::Error;

use crate::pipeline::StagePipeline;
use crate::report::{IdCollision, RunReport};

/// Run-fatal conditions
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to load roster: {0}")]
    Roster(#[source] KcError),

    #[error("Roster '{0}' contains no entities")]
    EmptyRoster(String),
}

/// Walks a roster through a [`StagePipeline`]
pub struct CrawlRunner {
    pipeline: StagePipeline,
    limit: Option<usize>,
}

impl CrawlRunner {
    pub fn new(pipeline: StagePipeline) -> Self {
        Self {
            pipeline,
            limit: None,
        }
    }

    /// Process only the first `limit` roster entries
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub async fn run(&self, source: &dyn RosterSource) -> Result<RunReport, RunError> {
        let roster = source.load_roster().map_err(RunError::Roster)?;
        if roster.is_empty() {
            return Err(RunError::EmptyRoster(roster.source_file));
        }

        let take = self.limit.unwrap_or(roster.len()).min(roster.len());
        tracing::info!(
            source = %roster.source_file,
            roster_size = roster.len(),
            processing = take,
            "Starting run"
        );

        let mut report = RunReport::new(roster.source_file.clone(), roster.len());
        let mut seen: HashMap<String, String> = HashMap::new();

        for (index, label) in roster.names.iter().take(take).enumerate() {
            tracing::info!(index = index + 1, total = take, label = %label, "Processing entity");

            let entity_id = canonicalize(label);
            if !entity_id.is_empty() {
                match seen.get(&entity_id) {
                    Some(first) if first != label => {
                        tracing::warn!(
                            entity_id = %entity_id,
                            first_label = %first,
                            label = %label,
                            "Identifier collision; later record overwrites the earlier one"
                        );
                        report.record_collision(IdCollision {
                            entity_id: entity_id.clone(),
                            first_label: first.clone(),
                            label: label.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(entity_id, label.clone());
                    }
                }
            }

            match self.pipeline.process(label, &roster).await {
                Ok(persisted) => report.record_persisted(&persisted),
                Err(failure) => report.record_failure(&failure),
            }
        }

        report.finish();
        tracing::info!("{}", report.summary());
        Ok(report)
    }
}
