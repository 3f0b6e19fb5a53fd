//! Gradient-boosted tree ensemble read from a LightGBM JSON model dump
//!
//! Only the parts of the dump needed for prediction are kept: per-tree
//! split structure, missing-value routing and leaf values.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use super::{ModelInfo, ModelKind, Regressor};
use crate::features::{FeatureColumn, FeatureVector};
use crate::{ForecastError, Result};

/// Values at or below this magnitude count as zero for `missing_type = "Zero"`
const ZERO_THRESHOLD: f64 = 1e-35;

#[derive(Debug, Deserialize)]
struct RawModel {
    #[serde(default)]
    objective: Option<String>,
    #[serde(default = "one")]
    num_tree_per_iteration: usize,
    max_feature_idx: usize,
    #[serde(default)]
    average_output: bool,
    #[serde(default)]
    feature_names: Vec<String>,
    tree_info: Vec<RawTree>,
}

fn one() -> usize {
    1
}

#[derive(Debug, Deserialize)]
struct RawTree {
    tree_structure: RawNode,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNode {
    Split {
        split_feature: usize,
        threshold: RawThreshold,
        decision_type: String,
        #[serde(default)]
        default_left: bool,
        #[serde(default)]
        missing_type: Option<String>,
        left_child: Box<RawNode>,
        right_child: Box<RawNode>,
    },
    Leaf {
        leaf_value: f64,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawThreshold {
    Value(f64),
    Categories(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingType {
    None,
    Zero,
    NaN,
}

#[derive(Debug, Clone)]
enum Decision {
    /// Go left when the value is <= threshold
    LessOrEqual(f64),
    /// Go left when the value is one of the listed categories
    InSet(HashSet<u32>),
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        decision: Decision,
        missing: MissingType,
        default_left: bool,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf(f64),
}

impl Node {
    fn from_raw(raw: RawNode, n_features: usize) -> Result<Self> {
        match raw {
            RawNode::Leaf { leaf_value } => Ok(Node::Leaf(leaf_value)),
            RawNode::Split {
                split_feature,
                threshold,
                decision_type,
                default_left,
                missing_type,
                left_child,
                right_child,
            } => {
                if split_feature >= n_features {
                    return Err(invalid(format!(
                        "split on feature {} but the model has {} features",
                        split_feature, n_features
                    )));
                }

                let decision = match (decision_type.as_str(), threshold) {
                    ("<=", RawThreshold::Value(t)) => Decision::LessOrEqual(t),
                    ("==", RawThreshold::Categories(set)) => Decision::InSet(parse_categories(&set)?),
                    ("==", RawThreshold::Value(t)) => Decision::InSet(HashSet::from([t as u32])),
                    (other, _) => {
                        return Err(invalid(format!("unsupported decision type {:?}", other)))
                    }
                };

                let missing = match missing_type.as_deref() {
                    None | Some("None") => MissingType::None,
                    Some("Zero") => MissingType::Zero,
                    Some("NaN") => MissingType::NaN,
                    Some(other) => {
                        return Err(invalid(format!("unsupported missing type {:?}", other)))
                    }
                };

                Ok(Node::Split {
                    feature: split_feature,
                    decision,
                    missing,
                    default_left,
                    left: Box::new(Node::from_raw(*left_child, n_features)?),
                    right: Box::new(Node::from_raw(*right_child, n_features)?),
                })
            }
        }
    }

    fn evaluate(&self, row: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    decision,
                    missing,
                    default_left,
                    left,
                    right,
                } => {
                    let go_left = goes_left(row[*feature], decision, *missing, *default_left);
                    node = if go_left { &**left } else { &**right };
                }
            }
        }
    }
}

fn goes_left(value: f64, decision: &Decision, missing: MissingType, default_left: bool) -> bool {
    match decision {
        Decision::LessOrEqual(threshold) => {
            if value.is_nan() && missing == MissingType::NaN {
                return default_left;
            }
            let value = if value.is_nan() { 0.0 } else { value };
            if missing == MissingType::Zero && value.abs() <= ZERO_THRESHOLD {
                return default_left;
            }
            value <= *threshold
        }
        Decision::InSet(categories) => {
            if value.is_nan() || value < 0.0 {
                return false;
            }
            categories.contains(&(value as u32))
        }
    }
}

fn parse_categories(set: &str) -> Result<HashSet<u32>> {
    set.split("||")
        .map(|c| {
            c.trim()
                .parse::<u32>()
                .map_err(|e| invalid(format!("bad category {:?} in threshold: {}", c, e)))
        })
        .collect()
}

fn invalid(message: String) -> ForecastError {
    ForecastError::artifact("tree ensemble", message)
}

/// Output transform implied by the training objective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Identity,
    Exp,
    /// `reg_sqrt`: the trees fit sqrt(label), so undo it keeping the sign
    SignedSquare,
}

/// Sum-of-trees regressor
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<Node>,
    n_features: usize,
    objective: String,
    link: Link,
    average_output: bool,
}

impl TreeEnsemble {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawModel = serde_json::from_str(content)
            .map_err(|e| ForecastError::artifact("tree ensemble", e))?;

        let n_features = raw.max_feature_idx + 1;
        if n_features != FeatureVector::DIM {
            return Err(invalid(format!(
                "model expects {} features, the feature row has {}",
                n_features,
                FeatureVector::DIM
            )));
        }
        if raw.num_tree_per_iteration != 1 {
            return Err(invalid(format!(
                "expected a single-output regressor, got {} trees per iteration",
                raw.num_tree_per_iteration
            )));
        }
        if raw.tree_info.is_empty() {
            return Err(invalid("model has no trees".to_string()));
        }

        check_feature_names(&raw.feature_names);

        let objective = raw.objective.unwrap_or_else(|| "regression".to_string());
        let link = link_for(&objective);

        let trees = raw
            .tree_info
            .into_iter()
            .map(|t| Node::from_raw(t.tree_structure, n_features))
            .collect::<Result<Vec<_>>>()?;

        Ok(TreeEnsemble {
            trees,
            n_features,
            objective,
            link,
            average_output: raw.average_output,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ForecastError::artifact(path.display(), e))?;
        Self::from_json_str(&content)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    fn predict_row(&self, row: &FeatureVector) -> f64 {
        let row = row.as_slice();
        let mut score: f64 = self.trees.iter().map(|t| t.evaluate(row)).sum();
        if self.average_output {
            score /= self.trees.len() as f64;
        }
        match self.link {
            Link::Identity => score,
            Link::Exp => score.exp(),
            Link::SignedSquare => score.signum() * score * score,
        }
    }
}

impl Regressor for TreeEnsemble {
    fn predict(&self, rows: &[FeatureVector]) -> Result<Vec<f64>> {
        Ok(rows.iter().map(|r| self.predict_row(r)).collect())
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            kind: ModelKind::TreeEnsemble,
            n_features: self.n_features,
            detail: format!("{} trees, objective {}", self.trees.len(), self.objective),
        }
    }
}

/// Objectives fitted on a log scale report exp(score); `reg_sqrt` adds a
/// `sqrt` token to the objective string and reports the signed square
fn link_for(objective: &str) -> Link {
    let mut tokens = objective.split_whitespace();
    let name = tokens.next().unwrap_or_default();
    match name {
        "poisson" | "gamma" | "tweedie" => Link::Exp,
        _ if tokens.any(|t| t == "sqrt") => Link::SignedSquare,
        _ => Link::Identity,
    }
}

/// Warn when the dump's column names disagree with the row layout
fn check_feature_names(names: &[String]) {
    if names.is_empty() {
        return;
    }
    for (column, name) in FeatureColumn::ALL.iter().zip(names) {
        if !column.name().eq_ignore_ascii_case(name) {
            log::warn!(
                "Model column {} is named {:?}, expected {:?}",
                column.index(),
                name,
                column.name()
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::encoding::tests::sample_registry;
    use crate::features::scenario::tests::pump_scenario;
    use crate::features::{assemble, FeatureColumn};

    /// Two trees: month <= 6 splits the first, channel in {0, 2} the second
    pub(crate) fn sample_model_json() -> String {
        let names: Vec<&str> = FeatureColumn::ALL.iter().map(|c| c.name()).collect();
        serde_json::json!({
            "name": "tree",
            "version": "v4",
            "num_class": 1,
            "num_tree_per_iteration": 1,
            "max_feature_idx": 26,
            "objective": "regression",
            "average_output": false,
            "feature_names": names,
            "tree_info": [
                {
                    "tree_index": 0,
                    "num_leaves": 2,
                    "shrinkage": 1,
                    "tree_structure": {
                        "split_index": 0,
                        "split_feature": FeatureColumn::Month.index(),
                        "threshold": 6.5,
                        "decision_type": "<=",
                        "default_left": true,
                        "missing_type": "None",
                        "left_child": {"leaf_index": 0, "leaf_value": 120.0},
                        "right_child": {"leaf_index": 1, "leaf_value": 80.0}
                    }
                },
                {
                    "tree_index": 1,
                    "num_leaves": 2,
                    "shrinkage": 0.1,
                    "tree_structure": {
                        "split_index": 0,
                        "split_feature": FeatureColumn::Channel.index(),
                        "threshold": "0||2",
                        "decision_type": "==",
                        "default_left": false,
                        "missing_type": "NaN",
                        "left_child": {"leaf_index": 0, "leaf_value": 7.9},
                        "right_child": {"leaf_index": 1, "leaf_value": -3.0}
                    }
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_sums_tree_outputs() {
        let model = TreeEnsemble::from_json_str(&sample_model_json()).unwrap();
        let vector = assemble(&sample_registry(), &pump_scenario()).unwrap();

        // January, Direct (code 0)
        let out = model.predict(&[vector]).unwrap();
        assert_eq!(out.len(), 1);
        assert!((out[0] - 127.9).abs() < 1e-9);
    }

    #[test]
    fn test_routes_by_threshold_and_category() {
        let model = TreeEnsemble::from_json_str(&sample_model_json()).unwrap();
        let registry = sample_registry();

        let mut input = pump_scenario();
        input.month = 9;
        input.channel = "Distributor".into();
        let vector = assemble(&registry, &input).unwrap();

        let out = model.predict(&[vector]).unwrap();
        assert!((out[0] - 77.0).abs() < 1e-9);
    }

    #[test]
    fn test_batch_keeps_row_order() {
        let model = TreeEnsemble::from_json_str(&sample_model_json()).unwrap();
        let registry = sample_registry();

        let mut summer = pump_scenario();
        summer.month = 7;
        let rows = [
            assemble(&registry, &pump_scenario()).unwrap(),
            assemble(&registry, &summer).unwrap(),
        ];

        let out = model.predict(&rows).unwrap();
        assert!(out[0] > out[1]);
    }

    #[test]
    fn test_missing_routing() {
        let categories = Decision::InSet(HashSet::from([1]));
        assert!(!goes_left(f64::NAN, &categories, MissingType::NaN, true));

        let split = Decision::LessOrEqual(-1.0);
        assert!(goes_left(f64::NAN, &split, MissingType::NaN, true));
        assert!(!goes_left(f64::NAN, &split, MissingType::None, true));
        assert!(goes_left(0.0, &split, MissingType::Zero, true));
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_model_json()).unwrap();
        value["max_feature_idx"] = serde_json::json!(25);

        let err = TreeEnsemble::from_json_str(&value.to_string()).unwrap_err();
        assert!(matches!(err, ForecastError::ArtifactLoad { .. }));
    }

    #[test]
    fn test_poisson_objective_exponentiates() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_model_json()).unwrap();
        value["objective"] = serde_json::json!("poisson max_delta_step:0.7");
        value["tree_info"] = serde_json::json!([
            {"tree_structure": {"leaf_value": 2.0}}
        ]);

        let model = TreeEnsemble::from_json_str(&value.to_string()).unwrap();
        let vector = assemble(&sample_registry(), &pump_scenario()).unwrap();
        let out = model.predict(&[vector]).unwrap();

        assert!((out[0] - 2.0f64.exp()).abs() < 1e-9);
    }

    #[test]
    fn test_sqrt_regression_squares_score() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_model_json()).unwrap();
        value["objective"] = serde_json::json!("regression sqrt");
        value["tree_info"] = serde_json::json!([
            {"tree_structure": {"leaf_value": 11.0}},
            {"tree_structure": {"leaf_value": 1.0}}
        ]);

        let model = TreeEnsemble::from_json_str(&value.to_string()).unwrap();
        let vector = assemble(&sample_registry(), &pump_scenario()).unwrap();
        let out = model.predict(&[vector]).unwrap();

        assert!((out[0] - 144.0).abs() < 1e-9);
        assert_eq!(link_for("regression_l1 sqrt"), Link::SignedSquare);
        assert_eq!(link_for("regression"), Link::Identity);
    }

    #[test]
    fn test_sqrt_link_keeps_sign() {
        let mut value: serde_json::Value = serde_json::from_str(&sample_model_json()).unwrap();
        value["objective"] = serde_json::json!("regression sqrt");
        value["tree_info"] = serde_json::json!([{"tree_structure": {"leaf_value": -3.0}}]);

        let model = TreeEnsemble::from_json_str(&value.to_string()).unwrap();
        let vector = assemble(&sample_registry(), &pump_scenario()).unwrap();

        assert!((model.predict(&[vector]).unwrap()[0] + 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_info_reports_tree_count() {
        let model = TreeEnsemble::from_json_str(&sample_model_json()).unwrap();
        let info = model.info();

        assert_eq!(model.num_trees(), 2);
        assert_eq!(info.n_features, 27);
        assert!(info.detail.contains("2 trees"));
    }
}
