//! Run report
//!
//! Collected by the driver while it walks the roster; printed as a summary
//! and optionally written as JSON.

use std::path::Path;

use chrono::{DateTime, Utc};
use kcrawl_core::{KcError, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::{EntityFailure, PersistedEntity, PipelineState};

#[derive(Debug, Clone, Serialize)]
pub struct PersistedSummary {
    pub label: String,
    pub entity_id: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub label: String,
    pub entity_id: String,
    pub failed_at: PipelineState,
    pub reason: String,
}

/// Two distinct labels that map to the same identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdCollision {
    pub entity_id: String,
    pub first_label: String,
    pub label: String,
}

/// Outcome of one pass over the roster
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub roster_source: String,
    pub roster_size: usize,
    pub persisted: Vec<PersistedSummary>,
    pub failures: Vec<FailureSummary>,
    pub collisions: Vec<IdCollision>,
}

impl RunReport {
    pub fn new(roster_source: impl Into<String>, roster_size: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            roster_source: roster_source.into(),
            roster_size,
            persisted: Vec::new(),
            failures: Vec::new(),
            collisions: Vec::new(),
        }
    }

    pub fn record_persisted(&mut self, entity: &PersistedEntity) {
        self.persisted.push(PersistedSummary {
            label: entity.label.clone(),
            entity_id: entity.entity_id.clone(),
            location: entity.location.clone(),
        });
    }

    pub fn record_failure(&mut self, failure: &EntityFailure) {
        self.failures.push(FailureSummary {
            label: failure.label.clone(),
            entity_id: failure.entity_id.clone(),
            failed_at: failure.failed_at,
            reason: failure.reason.to_string(),
        });
    }

    pub fn record_collision(&mut self, collision: IdCollision) {
        self.collisions.push(collision);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn processed(&self) -> usize {
        self.persisted.len() + self.failures.len()
    }

    pub fn persisted_count(&self) -> usize {
        self.persisted.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "Processed {} of {} entities from {}: {} persisted, {} aborted, {} id collisions",
            self.processed(),
            self.roster_size,
            self.roster_source,
            self.persisted_count(),
            self.failed_count(),
            self.collisions.len()
        )
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| KcError::StorageError(format!("Failed to serialize report: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                KcError::StorageError(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| KcError::StorageError(format!("Failed to write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FailureReason;

    #[test]
    fn test_counts_and_summary() {
        let mut report = RunReport::new("entities.xlsx", 3);
        report.record_failure(&EntityFailure {
            label: "重力坝".to_string(),
            entity_id: "ZhongLiBa".to_string(),
            failed_at: PipelineState::Retrieved,
            reason: FailureReason::InfoNotFound,
        });
        report.record_collision(IdCollision {
            entity_id: "ShuiKuDiaoDu".to_string(),
            first_label: "水库调度".to_string(),
            label: "水库·调度".to_string(),
        });

        assert_eq!(report.processed(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(
            report.summary(),
            "Processed 1 of 3 entities from entities.xlsx: 0 persisted, 1 aborted, 1 id collisions"
        );
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.json");

        let mut report = RunReport::new("entities.xlsx", 0);
        report.record_failure(&EntityFailure {
            label: "重力坝".to_string(),
            entity_id: "ZhongLiBa".to_string(),
            failed_at: PipelineState::Retrieved,
            reason: FailureReason::InfoNotFound,
        });
        report.finish();
        report.write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["failures"][0]["failed_at"], "retrieved");
        assert_eq!(value["roster_source"], "entities.xlsx");
        assert!(value["finished_at"].is_string());
    }
}
