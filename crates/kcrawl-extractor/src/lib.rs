//! KCrawl Extractor - Staged entity record extraction
//!
//! Turns one entity name plus the roster into a validated record:
//! query augmentation, retrieval, typing, attribute extraction, relation
//! inference, assembly, validation, correction and persistence.
//!
//! Author: hephaex@gmail.com

pub mod driver;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod response;
pub mod store;

pub use driver::{CrawlRunner, RunError};
pub use pipeline::{
    EntityFailure, FailureReason, PersistedEntity, PipelineOptions, PipelineState, StagePipeline,
};
pub use prompts::{PromptError, PromptSet, PromptTemplate};
pub use report::{FailureSummary, IdCollision, PersistedSummary, RunReport};
pub use response::ResponseError;
pub use store::JsonFileStore;
