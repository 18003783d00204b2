//! Random-forest regressor exported to JSON.
//!
//! Each tree is a flat node array with the root at index 0. Splits follow the
//! scikit-learn convention: a row goes left when `x[feature] <= threshold`.
//! The forest output is `base_score` plus the mean of the tree outputs.

use std::path::Path;

use serde::Deserialize;

use super::{check_feature_schema, Predictor};
use crate::error::LoadError;
use crate::features::{FeatureVector, N_FEATURES};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Deserialize)]
struct TreeArtifact {
    nodes: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct ForestArtifact {
    #[serde(default = "default_name")]
    name: String,
    feature_names: Vec<String>,
    #[serde(default)]
    base_score: f64,
    trees: Vec<TreeArtifact>,
}

fn default_name() -> String {
    "Random Forest Regressor".to_string()
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Every child must sit after its parent, which rules out cycles and
    /// guarantees the walk in [`Tree::eval`] terminates.
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("node {idx}: leaf value is not finite"));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= N_FEATURES {
                        return Err(format!("node {idx}: feature index {feature} out of range"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx}: threshold is not finite"));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx}: invalid child index {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn eval(&self, row: &[f64; N_FEATURES]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// Tree ensemble scored in-process.
#[derive(Debug, Clone)]
pub struct ForestModel {
    name: String,
    base_score: f64,
    trees: Vec<Tree>,
}

impl ForestModel {
    /// Parse and validate an artifact. `path` is only used for error context.
    pub fn from_slice(path: &Path, bytes: &[u8]) -> Result<Self, LoadError> {
        let artifact: ForestArtifact = serde_json::from_slice(bytes)
            .map_err(|e| LoadError::corrupt(path, format!("invalid forest JSON: {e}")))?;

        check_feature_schema(path, &artifact.feature_names)?;

        if artifact.trees.is_empty() {
            return Err(LoadError::corrupt(path, "forest has no trees"));
        }
        if !artifact.base_score.is_finite() {
            return Err(LoadError::corrupt(path, "base_score is not finite"));
        }

        let trees: Vec<Tree> = artifact
            .trees
            .into_iter()
            .map(|t| Tree { nodes: t.nodes })
            .collect();
        for (i, tree) in trees.iter().enumerate() {
            tree.validate()
                .map_err(|reason| LoadError::corrupt(path, format!("tree {i}: {reason}")))?;
        }

        Ok(Self {
            name: artifact.name,
            base_score: artifact.base_score,
            trees,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Predictor for ForestModel {
    fn predict(&self, features: &FeatureVector) -> anyhow::Result<f64> {
        let row = features.values();
        let sum: f64 = self.trees.iter().map(|t| t.eval(&row)).sum();
        Ok(self.base_score + sum / self.trees.len() as f64)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{build_feature_vector, FEATURE_NAMES};
    use crate::types::RawInputs;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn artifact(trees: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "name": "test forest",
            "feature_names": FEATURE_NAMES,
            "base_score": 10.0,
            "trees": trees,
        }))
        .unwrap()
    }

    fn load(bytes: &[u8]) -> Result<ForestModel, LoadError> {
        ForestModel::from_slice(Path::new("test.json"), bytes)
    }

    #[test]
    fn averages_trees_and_adds_base_score() {
        // tree 0 splits on lag_1, tree 1 is a stump
        let bytes = artifact(json!([
            { "nodes": [
                { "feature": 5, "threshold": 7.0, "left": 1, "right": 2 },
                { "value": 100.0 },
                { "value": 300.0 }
            ]},
            { "nodes": [ { "value": 50.0 } ] }
        ]));
        let model = load(&bytes).unwrap();
        assert_eq!(model.num_trees(), 2);
        assert_eq!(model.name(), "test forest");

        // lag_1 == threshold goes left
        let row = build_feature_vector(&RawInputs::default()).unwrap();
        assert_relative_eq!(model.predict(&row).unwrap(), 10.0 + (100.0 + 50.0) / 2.0);

        let row = build_feature_vector(&RawInputs { prev_day: 8, ..RawInputs::default() }).unwrap();
        assert_relative_eq!(model.predict(&row).unwrap(), 10.0 + (300.0 + 50.0) / 2.0);
    }

    #[test]
    fn routes_on_dispatch_indicator() {
        let bytes = artifact(json!([
            { "nodes": [
                { "feature": 9, "threshold": 0.5, "left": 1, "right": 2 },
                { "value": 1.0 },
                { "value": 2.0 }
            ]}
        ]));
        let model = load(&bytes).unwrap();
        let hot = build_feature_vector(&RawInputs { dispatch: "B02682".into(), ..RawInputs::default() }).unwrap();
        let cold = build_feature_vector(&RawInputs::default()).unwrap();
        assert_relative_eq!(model.predict(&hot).unwrap(), 12.0);
        assert_relative_eq!(model.predict(&cold).unwrap(), 11.0);
    }

    #[test]
    fn rejects_backward_child_links() {
        let bytes = artifact(json!([
            { "nodes": [
                { "feature": 0, "threshold": 1.0, "left": 1, "right": 2 },
                { "feature": 0, "threshold": 1.0, "left": 0, "right": 2 },
                { "value": 1.0 }
            ]}
        ]));
        assert!(matches!(load(&bytes), Err(LoadError::ArtifactCorrupt { .. })));
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let bad_child = artifact(json!([
            { "nodes": [ { "feature": 0, "threshold": 1.0, "left": 1, "right": 9 }, { "value": 1.0 } ] }
        ]));
        assert!(matches!(load(&bad_child), Err(LoadError::ArtifactCorrupt { .. })));

        let bad_feature = artifact(json!([
            { "nodes": [ { "feature": 12, "threshold": 1.0, "left": 1, "right": 2 }, { "value": 1.0 }, { "value": 2.0 } ] }
        ]));
        assert!(matches!(load(&bad_feature), Err(LoadError::ArtifactCorrupt { .. })));
    }

    #[test]
    fn rejects_empty_forest_and_truncated_json() {
        assert!(matches!(load(&artifact(json!([]))), Err(LoadError::ArtifactCorrupt { .. })));
        assert!(matches!(
            load(&artifact(json!([ { "nodes": [] } ]))),
            Err(LoadError::ArtifactCorrupt { .. })
        ));

        let bytes = artifact(json!([ { "nodes": [ { "value": 1.0 } ] } ]));
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(load(truncated), Err(LoadError::ArtifactCorrupt { .. })));
    }

    #[test]
    fn rejects_foreign_feature_layout() {
        let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
        names.reverse();
        let bytes = serde_json::to_vec(&json!({
            "feature_names": names,
            "trees": [ { "nodes": [ { "value": 1.0 } ] } ],
        }))
        .unwrap();
        assert!(matches!(load(&bytes), Err(LoadError::FeatureSchemaMismatch { .. })));
    }
}
