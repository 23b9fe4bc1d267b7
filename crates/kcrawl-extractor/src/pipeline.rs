//! Per-entity stage pipeline
//!
//! One entity moves through query augmentation, retrieval, typing, attribute
//! extraction, relation inference, assembly, validation, correction and
//! persistence. Any failure ends the entity in `Aborted`; the error names the
//! state that could not be reached.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kcrawl_core::{
    assemble, canonicalize, EntityRecord, GenerationRequest, GenerationStage, KcError,
    PipelineConfig, RecordStore, Retriever, Roster, SchemaValidator, StageInfo, TextGenerator,
    ValidationReport, Violation,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::prompts::{PromptError, PromptSet};
use crate::response::{self, ResponseError};

// ============================================================================
// States and failures
// ============================================================================

/// Lifecycle of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    QueryAugmented,
    Retrieved,
    Typed,
    AttributesExtracted,
    RelationsInferred,
    Assembled,
    Validated,
    Corrected,
    Persisted,
    Aborted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::QueryAugmented => "query_augmented",
            Self::Retrieved => "retrieved",
            Self::Typed => "typed",
            Self::AttributesExtracted => "attributes_extracted",
            Self::RelationsInferred => "relations_inferred",
            Self::Assembled => "assembled",
            Self::Validated => "validated",
            Self::Corrected => "corrected",
            Self::Persisted => "persisted",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an entity was aborted
#[derive(Error, Debug)]
pub enum FailureReason {
    #[error("label has an empty identifier")]
    EmptyIdentifier,

    #[error("info not found: retrieval returned no text")]
    InfoNotFound,

    #[error("unparseable {stage} response: {source}")]
    Parse {
        stage: GenerationStage,
        #[source]
        source: ResponseError,
    },

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("schema validation failed: {report}")]
    SchemaInvalid { report: ValidationReport },

    #[error("failed to serialize record: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Collaborator(#[from] KcError),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },
}

/// Terminal failure of one entity
#[derive(Error, Debug)]
#[error("entity '{label}' aborted at {failed_at}: {reason}")]
pub struct EntityFailure {
    pub label: String,
    pub entity_id: String,
    /// State the pipeline was trying to reach
    pub failed_at: PipelineState,
    #[source]
    pub reason: FailureReason,
}

/// Successfully persisted entity
#[derive(Debug, Clone)]
pub struct PersistedEntity {
    pub label: String,
    pub entity_id: String,
    /// Where the store wrote the record
    pub location: String,
    pub record: EntityRecord,
}

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Upper bound for every collaborator call
    pub stage_timeout: Duration,

    /// Validate the corrected record (shape and identity) before persisting
    pub revalidate_correction: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            stage_timeout: Duration::from_secs(180),
            revalidate_correction: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            stage_timeout: Duration::from_secs(config.stage_timeout_secs),
            revalidate_correction: config.revalidate_correction,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Drives one entity from label to persisted record
pub struct StagePipeline {
    generator: Arc<dyn TextGenerator>,
    retriever: Arc<dyn Retriever>,
    store: Arc<dyn RecordStore>,
    prompts: PromptSet,
    validator: SchemaValidator,
    options: PipelineOptions,
}

impl StagePipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        retriever: Arc<dyn Retriever>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            generator,
            retriever,
            store,
            prompts: PromptSet::default(),
            validator: SchemaValidator::new(),
            options: PipelineOptions::default(),
        }
    }

    /// Replace the prompt templates
    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every stage for `label`, using `roster` as relation context
    #[tracing::instrument(skip(self, roster), fields(entity_id = tracing::field::Empty))]
    pub async fn process(
        &self,
        label: &str,
        roster: &Roster,
    ) -> Result<PersistedEntity, EntityFailure> {
        let entity_id = canonicalize(label);
        tracing::Span::current().record("entity_id", entity_id.as_str());

        let mut target = PipelineState::Start;
        match self.run_stages(label, &entity_id, roster, &mut target).await {
            Ok(persisted) => {
                tracing::info!(location = %persisted.location, "Entity persisted");
                Ok(persisted)
            }
            Err(reason) => {
                tracing::warn!(failed_at = %target, reason = %reason, "Entity aborted");
                Err(EntityFailure {
                    label: label.to_string(),
                    entity_id,
                    failed_at: target,
                    reason,
                })
            }
        }
    }

    async fn run_stages(
        &self,
        label: &str,
        entity_id: &str,
        roster: &Roster,
        target: &mut PipelineState,
    ) -> Result<PersistedEntity, FailureReason> {
        if entity_id.is_empty() {
            return Err(FailureReason::EmptyIdentifier);
        }

        // 1. Search queries
        *target = PipelineState::QueryAugmented;
        let prompt = self
            .prompts
            .query_augmentation
            .render(&[("entity_name", label)])?;
        let queries = self
            .generate_parsed(GenerationStage::QueryAugmentation, label, prompt, |text| {
                response::parse_string_list(text)
            })
            .await?;
        tracing::info!(state = %target, queries = queries.len(), "Stage complete");

        // 2. Source text
        *target = PipelineState::Retrieved;
        let raw_text = self
            .bounded("retrieval", self.retriever.retrieve(&queries))
            .await?;
        if raw_text.trim().is_empty() {
            return Err(FailureReason::InfoNotFound);
        }
        tracing::info!(state = %target, chars = raw_text.chars().count(), "Stage complete");

        // 3. Type, description, background
        *target = PipelineState::Typed;
        let prompt = self
            .prompts
            .typing
            .render(&[("entity_name", label), ("raw_text", &raw_text)])?;
        let mut info: StageInfo = self
            .generate_parsed(GenerationStage::Typing, label, prompt, response::parse_object)
            .await?;
        tracing::info!(state = %target, "Stage complete");

        // 4. Attributes
        *target = PipelineState::AttributesExtracted;
        let sub_type = info
            .get("entity_type")
            .and_then(|t| t.get("sub_type"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let prompt = self.prompts.attribute_extraction.render(&[
            ("entity_name", label),
            ("entity_type", &sub_type),
            ("raw_text", &raw_text),
        ])?;
        let attributes = self
            .generate_parsed(
                GenerationStage::AttributeExtraction,
                label,
                prompt,
                response::parse_object,
            )
            .await?;
        tracing::info!(state = %target, attributes = attributes.len(), "Stage complete");
        info.insert("attributes".to_string(), Value::Object(attributes));

        // 5. Relations against the full roster
        *target = PipelineState::RelationsInferred;
        let entities_list = roster_context(roster);
        let prompt = self.prompts.relation_inference.render(&[
            ("entity_name", label),
            ("all_entities_list", &entities_list),
            ("raw_text", &raw_text),
        ])?;
        let relations = self
            .generate_parsed(
                GenerationStage::RelationInference,
                label,
                prompt,
                response::parse_object_list,
            )
            .await?;
        tracing::info!(state = %target, relations = relations.len(), "Stage complete");

        // 6. Assemble and validate
        *target = PipelineState::Assembled;
        let record = assemble(label, &roster.source_file, &info, relations);

        *target = PipelineState::Validated;
        let report = self.validator.validate(&record);
        if !report.is_valid() {
            return Err(FailureReason::SchemaInvalid { report });
        }
        tracing::info!(state = %target, "Stage complete");

        // 7. Correction pass
        *target = PipelineState::Corrected;
        let json_data = record.to_pretty_json().map_err(FailureReason::Serialize)?;
        let prompt = self
            .prompts
            .correction
            .render(&[("entity_name", label), ("json_data", &json_data)])?;
        let corrected = self
            .generate_parsed(GenerationStage::Correction, label, prompt, response::parse_value)
            .await?;
        let record = self.accept_correction(corrected, entity_id, label)?;
        tracing::info!(state = %target, "Stage complete");

        // 8. Persist
        *target = PipelineState::Persisted;
        let location = self.bounded("persist", self.store.persist(&record)).await?;

        Ok(PersistedEntity {
            label: label.to_string(),
            entity_id: entity_id.to_string(),
            location,
            record,
        })
    }

    /// The corrected record replaces the assembled one
    fn accept_correction(
        &self,
        corrected: Value,
        entity_id: &str,
        label: &str,
    ) -> Result<EntityRecord, FailureReason> {
        if self.options.revalidate_correction {
            let mut report = self.validator.validate_value(&corrected);
            report.extend(self.validator.validate_identity(&corrected, entity_id, label));
            if !report.is_valid() {
                return Err(FailureReason::SchemaInvalid { report });
            }
        }

        EntityRecord::from_value(corrected).ok_or_else(|| FailureReason::SchemaInvalid {
            report: ValidationReport {
                violations: vec![Violation::NotAnObject],
            },
        })
    }

    /// Generate for one stage and parse the response
    async fn generate_parsed<T>(
        &self,
        stage: GenerationStage,
        label: &str,
        prompt: String,
        parse: impl FnOnce(&str) -> Result<T, ResponseError>,
    ) -> Result<T, FailureReason> {
        let request = GenerationRequest::new(stage, label, prompt);
        tracing::debug!(stage = %stage, prompt_chars = request.prompt.len(), "Calling generator");

        let text = self
            .bounded(stage.as_str(), self.generator.generate(&request))
            .await?;
        tracing::debug!(stage = %stage, response_chars = text.len(), "Generator responded");

        parse(&text).map_err(|source| FailureReason::Parse { stage, source })
    }

    /// Apply the stage timeout to a collaborator call
    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = kcrawl_core::Result<T>>,
    ) -> Result<T, FailureReason> {
        match tokio::time::timeout(self.options.stage_timeout, call).await {
            Ok(result) => result.map_err(FailureReason::Collaborator),
            Err(_) => Err(FailureReason::Timeout {
                operation: operation.to_string(),
                secs: self.options.stage_timeout.as_secs(),
            }),
        }
    }
}

/// Roster as `[{"label": ..., "entity_id": ...}]` for the relation prompt
fn roster_context(roster: &Roster) -> String {
    let entries: Vec<Value> = roster
        .names
        .iter()
        .map(|name| json!({"label": name, "entity_id": canonicalize(name)}))
        .collect();
    Value::Array(entries).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(PipelineState::Persisted.to_string(), "persisted");
        assert_eq!(PipelineState::AttributesExtracted.to_string(), "attributes_extracted");
    }

    #[test]
    fn test_roster_context() {
        let roster = Roster::new("entities.xlsx", vec!["水库调度".to_string()]);
        let value: Value = serde_json::from_str(&roster_context(&roster)).unwrap();
        assert_eq!(value, json!([{"label": "水库调度", "entity_id": "ShuiKuDiaoDu"}]));
    }

    #[test]
    fn test_options_from_config() {
        let config = PipelineConfig {
            stage_timeout_secs: 5,
            revalidate_correction: false,
            ..Default::default()
        };
        let options = PipelineOptions::from_config(&config);
        assert_eq!(options.stage_timeout, Duration::from_secs(5));
        assert!(!options.revalidate_correction);
    }
}
