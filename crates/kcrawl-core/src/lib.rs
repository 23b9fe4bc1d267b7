//! KCrawl Core - Record model, identifiers, schema, and shared traits
//!
//! This crate defines the core abstractions used throughout KCrawl:
//! - The canonical entity record and its assembler
//! - Deterministic entity identifiers (pinyin camel case)
//! - Structural schema validation of records
//! - Collaborator traits (text generation, retrieval, roster, storage)
//! - Configuration management
//!
//! Author: hephaex@gmail.com

pub mod config;
pub mod id;
pub mod record;
pub mod schema;

pub use config::{
    AppConfig, ConfigError, LlmConfig, LlmProvider, LoggingConfig, OutputConfig, PipelineConfig,
    SearchConfig, SearchProvider,
};
pub use id::canonicalize;
pub use record::{assemble, EntityRecord, EntityType, Relation, StageInfo};
pub use schema::{FieldKind, SchemaValidator, ValidationReport, Violation};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for collaborator operations
#[derive(Error, Debug)]
pub enum KcError {
    #[error("Roster error: {0}")]
    RosterError(String),

    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, KcError>;

// ============================================================================
// Generation stages
// ============================================================================

/// Stage tag attached to every text-generation request.
///
/// Backends that need to shape their answer per stage (the simulated
/// generator, request logging) dispatch on this tag instead of inspecting
/// prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStage {
    /// Search query list for the retrieval backend
    QueryAugmentation,
    /// Entity type, description and background context
    Typing,
    /// Open attribute mapping
    AttributeExtraction,
    /// Relation entries against the roster
    RelationInference,
    /// Review of the complete record
    Correction,
}

impl GenerationStage {
    /// All stages in pipeline order
    pub const ALL: [GenerationStage; 5] = [
        Self::QueryAugmentation,
        Self::Typing,
        Self::AttributeExtraction,
        Self::RelationInference,
        Self::Correction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueryAugmentation => "query_augmentation",
            Self::Typing => "typing",
            Self::AttributeExtraction => "attribute_extraction",
            Self::RelationInference => "relation_inference",
            Self::Correction => "correction",
        }
    }
}

impl std::fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single prompt sent to a text-generation backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub stage: GenerationStage,
    /// Label of the entity the prompt is about
    pub entity: String,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(stage: GenerationStage, entity: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            stage,
            entity: entity.into(),
            prompt: prompt.into(),
        }
    }
}

// ============================================================================
// Roster
// ============================================================================

/// Ordered entity names plus the provenance recorded on every record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// File name the roster was read from (no directory part)
    pub source_file: String,

    /// Entity names in source order
    pub names: Vec<String>,
}

impl Roster {
    pub fn new(source_file: impl Into<String>, names: Vec<String>) -> Self {
        Self {
            source_file: source_file.into(),
            names,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for text-generation backends
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for a staged prompt
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Trait for retrieval backends
#[async_trait::async_trait]
pub trait Retriever: Send + Sync {
    /// Aggregate raw source text for a set of queries; may be empty
    async fn retrieve(&self, queries: &[String]) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Trait for entity roster sources
pub trait RosterSource: Send + Sync {
    /// Load the complete ordered roster
    fn load_roster(&self) -> Result<Roster>;
}

/// Trait for record storage writers
///
/// Writes are keyed by `entity_id`; persisting the same id again overwrites.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record and return where it was written
    async fn persist(&self, record: &EntityRecord) -> Result<String>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(GenerationStage::Typing.to_string(), "typing");
        assert_eq!(
            serde_json::to_string(&GenerationStage::RelationInference).unwrap(),
            "\"relation_inference\""
        );
        assert_eq!(GenerationStage::ALL.len(), 5);
    }

    #[test]
    fn test_roster_helpers() {
        let roster = Roster::new("entities.xlsx", vec!["水库调度".to_string()]);
        assert_eq!(roster.len(), 1);
        assert!(!roster.is_empty());
        assert!(Roster::default().is_empty());
    }
}
