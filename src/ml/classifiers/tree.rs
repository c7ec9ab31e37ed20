use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Estimator;
use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Go left when `x[feature] <= threshold`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        class: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeSpec {
    /// Flattened tree, root at index 0
    pub nodes: Vec<TreeNode>,
}

pub struct DecisionTreeClassifier {
    nodes: Vec<TreeNode>,
    width: usize,
    depth: usize,
}

impl DecisionTreeClassifier {
    pub fn from_spec(spec: DecisionTreeSpec, width: usize, n_classes: usize) -> ModelResult<Self> {
        if spec.nodes.is_empty() {
            return Err(ModelError::incompatible("decision tree has no nodes"));
        }

        let n = spec.nodes.len();
        for (i, node) in spec.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split { feature, threshold, left, right } => {
                    if feature >= width {
                        return Err(ModelError::incompatible(format!(
                            "tree node {} splits on feature {} of {}",
                            i, feature, width
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::incompatible(format!(
                            "tree node {} has non-finite threshold",
                            i
                        )));
                    }
                    // Children always come after their parent, which rules out cycles
                    if left <= i || right <= i || left >= n || right >= n {
                        return Err(ModelError::incompatible(format!(
                            "tree node {} has invalid children ({}, {})",
                            i, left, right
                        )));
                    }
                }
                TreeNode::Leaf { class } => {
                    if class >= n_classes {
                        return Err(ModelError::incompatible(format!(
                            "tree leaf {} predicts class {} of {}",
                            i, class, n_classes
                        )));
                    }
                }
            }
        }

        // Children have higher indices, so one reverse pass sees them first
        let mut depths = vec![0usize; n];
        for i in (0..n).rev() {
            if let TreeNode::Split { left, right, .. } = spec.nodes[i] {
                depths[i] = 1 + depths[left].max(depths[right]);
            }
        }
        let depth = depths[0];

        debug!("Decision tree with {} nodes, depth {}", n, depth);
        Ok(Self { nodes: spec.nodes, width, depth })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Estimator for DecisionTreeClassifier {
    fn kind(&self) -> &'static str {
        "decision_tree"
    }

    fn predict_class(&self, x: ArrayView1<f64>) -> ModelResult<usize> {
        if x.len() != self.width {
            return Err(ModelError::prediction(format!(
                "decision tree expects {} features, got {}",
                self.width,
                x.len()
            )));
        }

        let mut i = 0;
        loop {
            match self.nodes[i] {
                TreeNode::Leaf { class } => return Ok(class),
                TreeNode::Split { feature, threshold, left, right } => {
                    i = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump_spec() -> DecisionTreeSpec {
        serde_json::from_str(
            r#"{"nodes": [
                {"feature": 0, "threshold": 1.5, "left": 1, "right": 2},
                {"class": 1},
                {"feature": 1, "threshold": 0.5, "left": 3, "right": 4},
                {"class": 3},
                {"class": 5}
            ]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_walks_to_leaf() {
        let tree = DecisionTreeClassifier::from_spec(stump_spec(), 2, 6).unwrap();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.predict_class(array![1.0, 9.0].view()).unwrap(), 1);
        assert_eq!(tree.predict_class(array![1.5, 9.0].view()).unwrap(), 1);
        assert_eq!(tree.predict_class(array![2.0, 0.0].view()).unwrap(), 3);
        assert_eq!(tree.predict_class(array![2.0, 1.0].view()).unwrap(), 5);
    }

    #[test]
    fn test_deep_chain_loads_and_predicts() {
        // Each split sends values <= 0 left to a leaf and the rest further down
        let n_splits = 200_000;
        let mut nodes = Vec::with_capacity(2 * n_splits + 1);
        for i in 0..n_splits {
            let here = 2 * i;
            nodes.push(TreeNode::Split {
                feature: 0,
                threshold: 0.0,
                left: here + 1,
                right: here + 2,
            });
            nodes.push(TreeNode::Leaf { class: 1 });
        }
        nodes.push(TreeNode::Leaf { class: 2 });

        let spec = DecisionTreeSpec { nodes };
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let tree = tracing::subscriber::with_default(subscriber, || {
            DecisionTreeClassifier::from_spec(spec, 1, 3).unwrap()
        });

        assert_eq!(tree.depth(), n_splits);
        assert_eq!(tree.predict_class(array![0.0].view()).unwrap(), 1);
        assert_eq!(tree.predict_class(array![1.0].view()).unwrap(), 2);
    }

    #[test]
    fn test_rejects_backward_children() {
        let spec: DecisionTreeSpec = serde_json::from_str(
            r#"{"nodes": [{"feature": 0, "threshold": 0.0, "left": 0, "right": 1}, {"class": 0}]}"#,
        )
        .unwrap();
        assert!(DecisionTreeClassifier::from_spec(spec, 1, 6).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_feature_and_class() {
        assert!(DecisionTreeClassifier::from_spec(stump_spec(), 1, 6).is_err());
        assert!(DecisionTreeClassifier::from_spec(stump_spec(), 2, 5).is_err());
    }
}
