//! Offline simulated generator
//!
//! Returns canned, well-formed answers for every stage so the whole pipeline
//! can run without a model. The answer shape is chosen from the request's
//! stage tag.

use async_trait::async_trait;
use kcrawl_core::{canonicalize, GenerationRequest, GenerationStage, KcError, Result, TextGenerator};
use serde_json::json;

/// Relation targets used for every simulated entity
const SIMULATED_TARGETS: [(&str, &str); 2] = [
    ("优化算法", "uses_method"),
    ("中华人民共和国防洪法", "governed_by"),
];

#[derive(Debug, Clone, Default)]
pub struct SimulatedGenerator;

impl SimulatedGenerator {
    pub fn new() -> Self {
        Self
    }

    fn respond(&self, request: &GenerationRequest) -> Result<String> {
        let entity = request.entity.as_str();

        let value = match request.stage {
            GenerationStage::QueryAugmentation => json!([
                format!("{entity} 优化算法 应用"),
                format!("{entity} principles and methods"),
                format!("{entity} 防洪兴利 联合调度"),
                format!("{entity} 工程案例"),
                format!("{entity} engineering application cases"),
            ]),
            GenerationStage::Typing => json!({
                "entity_type": {"primary_type": "DomainConcept", "sub_type": "EngineeringProcess"},
                "description": format!("这是对'{entity}'的模拟描述。"),
                "background_context": format!("这是关于'{entity}'的模拟背景信息。"),
            }),
            GenerationStage::AttributeExtraction => json!({
                "objectives": ["防洪", "发电", "灌溉"],
                "key_constraints": ["防洪限制水位", "下游最小生态流量"],
            }),
            GenerationStage::RelationInference => {
                let relations: Vec<_> = SIMULATED_TARGETS
                    .iter()
                    .map(|(label, kind)| {
                        json!({
                            "target_entity_id": canonicalize(label),
                            "target_label": label,
                            "relationship_type": kind,
                        })
                    })
                    .collect();
                json!(relations)
            }
            // The reviewer accepts the record unchanged
            GenerationStage::Correction => {
                return echo_json_object(&request.prompt).map(str::to_string);
            }
        };

        Ok(value.to_string())
    }
}

/// Outermost `{ ... }` span of the prompt
fn echo_json_object(prompt: &str) -> Result<&str> {
    match (prompt.find('{'), prompt.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&prompt[start..=end]),
        _ => Err(KcError::LlmError(
            "Correction prompt carries no JSON record".to_string(),
        )),
    }
}

#[async_trait]
impl TextGenerator for SimulatedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        tracing::debug!(stage = %request.stage, entity = %request.entity, "Simulated generation");
        self.respond(request)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
