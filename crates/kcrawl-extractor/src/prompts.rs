//! Prompt templates
//!
//! Templates are immutable text with named `{placeholder}` slots. Defaults
//! are compiled in; a prompt directory may override any of them with a file
//! named after the stage (`typing.txt`, `correction.txt`, ...).

use std::path::Path;
use std::sync::OnceLock;

use kcrawl_core::GenerationStage;
use regex::{Captures, Regex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Failed to read prompt template {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Prompt template '{template}' has no value for placeholder '{placeholder}'")]
    MissingValue {
        template: String,
        placeholder: String,
    },
}

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\{([a-z_]+)\}").ok())
        .as_ref()
}

/// A named prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    text: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<String> {
        let Some(pattern) = placeholder_pattern() else {
            return Vec::new();
        };
        let mut names: Vec<String> = Vec::new();
        for cap in pattern.captures_iter(&self.text) {
            let name = cap[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Substitute placeholders in a single pass.
    ///
    /// Values are inserted verbatim and never re-scanned, so retrieved text
    /// containing `{...}` cannot inject further substitutions. Braces that do
    /// not form a placeholder (JSON examples) are left untouched.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String, PromptError> {
        for placeholder in self.placeholders() {
            if !values.iter().any(|(k, _)| *k == placeholder) {
                return Err(PromptError::MissingValue {
                    template: self.name.clone(),
                    placeholder,
                });
            }
        }

        let Some(pattern) = placeholder_pattern() else {
            return Ok(self.text.clone());
        };

        let rendered = pattern.replace_all(&self.text, |cap: &Captures| {
            values
                .iter()
                .find(|(k, _)| *k == &cap[1])
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| cap[0].to_string())
        });

        Ok(rendered.into_owned())
    }
}

/// One template per generation stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub query_augmentation: PromptTemplate,
    pub typing: PromptTemplate,
    pub attribute_extraction: PromptTemplate,
    pub relation_inference: PromptTemplate,
    pub correction: PromptTemplate,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            query_augmentation: PromptTemplate::new(
                "query_augmentation",
                include_str!("prompts/query_augmentation.txt"),
            ),
            typing: PromptTemplate::new("typing", include_str!("prompts/typing.txt")),
            attribute_extraction: PromptTemplate::new(
                "attribute_extraction",
                include_str!("prompts/attribute_extraction.txt"),
            ),
            relation_inference: PromptTemplate::new(
                "relation_inference",
                include_str!("prompts/relation_inference.txt"),
            ),
            correction: PromptTemplate::new("correction", include_str!("prompts/correction.txt")),
        }
    }
}

impl PromptSet {
    /// Defaults with any `<stage>.txt` file in `dir` taking precedence
    pub fn with_overrides(dir: &Path) -> Result<Self, PromptError> {
        let mut set = Self::default();

        for stage in GenerationStage::ALL {
            let path = dir.join(format!("{}.txt", stage.as_str()));
            if !path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(|e| PromptError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            tracing::info!(stage = %stage, path = %path.display(), "Using prompt override");
            *set.get_mut(stage) = PromptTemplate::new(stage.as_str(), text);
        }

        Ok(set)
    }

    pub fn get(&self, stage: GenerationStage) -> &PromptTemplate {
        match stage {
            GenerationStage::QueryAugmentation => &self.query_augmentation,
            GenerationStage::Typing => &self.typing,
            GenerationStage::AttributeExtraction => &self.attribute_extraction,
            GenerationStage::RelationInference => &self.relation_inference,
            GenerationStage::Correction => &self.correction,
        }
    }

    fn get_mut(&mut self, stage: GenerationStage) -> &mut PromptTemplate {
        match stage {
            GenerationStage::QueryAugmentation => &mut self.query_augmentation,
            GenerationStage::Typing => &mut self.typing,
            GenerationStage::AttributeExtraction => &mut self.attribute_extraction,
            GenerationStage::RelationInference => &mut self.relation_inference,
            GenerationStage::Correction => &mut self.correction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_placeholders() {
        let set = PromptSet::default();
        assert_eq!(set.query_augmentation.placeholders(), vec!["entity_name"]);
        assert_eq!(set.typing.placeholders(), vec!["entity_name", "raw_text"]);
        assert_eq!(
            set.attribute_extraction.placeholders(),
            vec!["entity_name", "entity_type", "raw_text"]
        );
        assert_eq!(
            set.relation_inference.placeholders(),
            vec!["entity_name", "all_entities_list", "raw_text"]
        );
        assert_eq!(set.correction.placeholders(), vec!["entity_name", "json_data"]);
    }

    #[test]
    fn test_render_single_pass() {
        let template = PromptTemplate::new("t", "About {entity_name}: {raw_text} {\"k\": 1}");
        let out = template
            .render(&[("entity_name", "水库调度"), ("raw_text", "{entity_name}")])
            .unwrap();
        assert_eq!(out, "About 水库调度: {entity_name} {\"k\": 1}");
    }

    #[test]
    fn test_render_missing_value() {
        let template = PromptTemplate::new("t", "{entity_name} {raw_text}");
        let err = template.render(&[("entity_name", "x")]).unwrap_err();
        assert!(matches!(err, PromptError::MissingValue { placeholder, .. } if placeholder == "raw_text"));
    }

    #[test]
    fn test_relation_prompt_keeps_json_example() {
        let set = PromptSet::default();
        let out = set
            .relation_inference
            .render(&[
                ("entity_name", "水库调度"),
                ("all_entities_list", "[]"),
                ("raw_text", "text"),
            ])
            .unwrap();
        assert!(out.contains("{ \"target_entity_id\": \"...\""));
    }

    #[test]
    fn test_overrides_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("typing.txt"), "Type {entity_name}").unwrap();

        let set = PromptSet::with_overrides(dir.path()).unwrap();
        assert_eq!(set.get(GenerationStage::Typing).text(), "Type {entity_name}");
        assert_eq!(set.correction, PromptSet::default().correction);
    }
}
