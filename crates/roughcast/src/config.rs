use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens to a crisp primitive once its sketch has been inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourcePolicy {
    /// Keep the original in place with zero opacity (it can still be measured).
    Hide,
    /// Drop the original from the document.
    Remove,
    /// Hide for library-injected diagrams (their producer may re-measure them), remove otherwise.
    #[default]
    ByProvenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SketchOptions {
    pub poll_period_ms: u64,
    pub shape_roughness: f32,
    pub edge_roughness: f32,
    pub shape_bowing: f32,
    pub edge_bowing: f32,
    pub fill_weight: f32,
    pub hachure_gap: f32,
    /// Mixed into every per-element seed; `0` keeps the derived seeds as they are.
    pub seed: u64,
    pub source_policy: SourcePolicy,
    /// Attribute opting an `<svg>` (or one of its containers) into sketching.
    pub opt_in_attribute: String,
    /// Classes of the containers the external diagramming library renders into.
    pub library_container_classes: Vec<String>,
    pub filled_classes: Vec<String>,
    pub outline_classes: Vec<String>,
    pub edge_classes: Vec<String>,
    pub default_stroke: String,
}

impl Default for SketchOptions {
    fn default() -> Self {
        Self {
            poll_period_ms: 1500,
            shape_roughness: 1.4,
            edge_roughness: 0.7,
            shape_bowing: 1.0,
            edge_bowing: 0.6,
            fill_weight: 0.8,
            hachure_gap: 5.0,
            seed: 0,
            source_policy: SourcePolicy::ByProvenance,
            opt_in_attribute: "data-sketch".to_string(),
            library_container_classes: strings(&["mermaid", "mermaid-sketch-container"]),
            filled_classes: strings(&["filled", "sketch-filled"]),
            outline_classes: strings(&["outline", "sketch-outline"]),
            edge_classes: strings(&[
                "edge",
                "edgePath",
                "flowchart-link",
                "relation",
                "transition",
                "messageLine0",
                "messageLine1",
                "wire",
                "connector",
            ]),
            default_stroke: "currentColor".to_string(),
        }
    }
}

impl SketchOptions {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    pub fn with_source_policy(mut self, policy: SourcePolicy) -> Self {
        self.source_policy = policy;
        self
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let opts =
            SketchOptions::from_json(r#"{ "edgeRoughness": 0.2, "sourcePolicy": "hide" }"#)
                .unwrap();
        assert_eq!(opts.edge_roughness, 0.2);
        assert_eq!(opts.source_policy, SourcePolicy::Hide);
        assert_eq!(opts.poll_period_ms, 1500);
        assert_eq!(opts.opt_in_attribute, "data-sketch");
    }

    #[test]
    fn invalid_json_is_an_options_error() {
        let err = SketchOptions::from_json("{ nope").unwrap_err();
        assert!(matches!(err, crate::Error::Options(_)));
    }
}
