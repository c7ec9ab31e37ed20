use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::{to_matrix, Estimator};
use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnSpec {
    pub k: usize,
    #[serde(default)]
    pub metric: DistanceMetric,
    /// Encoded training points
    pub points: Vec<Vec<f64>>,
    /// Class index of each training point
    pub targets: Vec<usize>,
}

/// k-nearest-neighbours vote over stored training points
pub struct KnnClassifier {
    k: usize,
    metric: DistanceMetric,
    points: Array2<f64>,
    targets: Vec<usize>,
    n_classes: usize,
}

impl KnnClassifier {
    pub fn from_spec(spec: KnnSpec, width: usize, n_classes: usize) -> ModelResult<Self> {
        if spec.k == 0 {
            return Err(ModelError::incompatible("knn: k must be at least 1"));
        }
        let points = to_matrix(spec.points, width, "knn points")?;
        if spec.targets.len() != points.nrows() {
            return Err(ModelError::incompatible(format!(
                "knn: {} points but {} targets",
                points.nrows(),
                spec.targets.len()
            )));
        }
        if let Some(t) = spec.targets.iter().find(|&&t| t >= n_classes) {
            return Err(ModelError::incompatible(format!(
                "knn: target {} outside {} classes",
                t, n_classes
            )));
        }

        Ok(Self {
            k: spec.k,
            metric: spec.metric,
            points,
            targets: spec.targets,
            n_classes,
        })
    }

    fn distances(&self, x: ArrayView1<f64>) -> Vec<f64> {
        let diff = &self.points - &x;
        let dist = match self.metric {
            // Squared distance keeps the same ordering
            DistanceMetric::Euclidean => diff.mapv(|v| v * v).sum_axis(Axis(1)),
            DistanceMetric::Manhattan => diff.mapv(f64::abs).sum_axis(Axis(1)),
        };
        dist.to_vec()
    }
}

impl Estimator for KnnClassifier {
    fn kind(&self) -> &'static str {
        "knn"
    }

    fn predict_class(&self, x: ArrayView1<f64>) -> ModelResult<usize> {
        if x.len() != self.points.ncols() {
            return Err(ModelError::prediction(format!(
                "knn expects {} features, got {}",
                self.points.ncols(),
                x.len()
            )));
        }

        let dist = self.distances(x);
        let mut order: Vec<usize> = (0..dist.len()).collect();
        order.sort_by(|&a, &b| dist[a].total_cmp(&dist[b]));

        let mut votes = vec![0usize; self.n_classes];
        for &i in order.iter().take(self.k) {
            votes[self.targets[i]] += 1;
        }

        // max_by_key returns the last max, so scan for the first
        let top = votes.iter().copied().max().unwrap_or(0);
        votes
            .iter()
            .position(|&v| v == top)
            .ok_or_else(|| ModelError::prediction("knn: no neighbours"))
    }
}
