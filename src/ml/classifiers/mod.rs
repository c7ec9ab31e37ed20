pub mod knn;
pub mod tree;
pub mod naive_bayes;
pub mod svm;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::ml::encoder::FeatureEncoder;
use crate::types::{FeatureRow, RawPrediction};

pub use knn::{KnnClassifier, KnnSpec};
pub use naive_bayes::{GaussianNbClassifier, GaussianNbSpec};
pub use svm::{LinearSvmClassifier, LinearSvmSpec};
pub use tree::{DecisionTreeClassifier, DecisionTreeSpec};

/// A loaded model that turns records into raw predictions
#[cfg_attr(test, mockall::automock)]
pub trait Classifier: Send + Sync {
    fn kind(&self) -> &'static str;

    /// One prediction per input row
    fn predict(&self, rows: &[FeatureRow]) -> ModelResult<Vec<RawPrediction>>;
}

/// Core of a fitted model: maps an encoded vector to a class index
pub trait Estimator: Send + Sync {
    fn kind(&self) -> &'static str;
    fn predict_class(&self, x: ArrayView1<f64>) -> ModelResult<usize>;
}

/// Estimator section of an artifact, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EstimatorSpec {
    Knn(KnnSpec),
    DecisionTree(DecisionTreeSpec),
    GaussianNb(GaussianNbSpec),
    LinearSvm(LinearSvmSpec),
}

impl EstimatorSpec {
    /// Validate against the encoder width and class count, then build
    pub fn build(self, width: usize, n_classes: usize) -> ModelResult<Box<dyn Estimator>> {
        Ok(match self {
            EstimatorSpec::Knn(spec) => Box::new(KnnClassifier::from_spec(spec, width, n_classes)?),
            EstimatorSpec::DecisionTree(spec) => {
                Box::new(DecisionTreeClassifier::from_spec(spec, width, n_classes)?)
            }
            EstimatorSpec::GaussianNb(spec) => {
                Box::new(GaussianNbClassifier::from_spec(spec, width, n_classes)?)
            }
            EstimatorSpec::LinearSvm(spec) => {
                Box::new(LinearSvmClassifier::from_spec(spec, width, n_classes)?)
            }
        })
    }
}

/// Encoder + estimator + class values, as stored in one artifact
pub struct Pipeline {
    encoder: FeatureEncoder,
    estimator: Box<dyn Estimator>,
    classes: Vec<RawPrediction>,
}

impl Pipeline {
    pub fn new(encoder: FeatureEncoder, estimator: Box<dyn Estimator>, classes: Vec<RawPrediction>) -> Self {
        Self { encoder, estimator, classes }
    }
}

impl Classifier for Pipeline {
    fn kind(&self) -> &'static str {
        self.estimator.kind()
    }

    fn predict(&self, rows: &[FeatureRow]) -> ModelResult<Vec<RawPrediction>> {
        rows.iter()
            .map(|row| {
                let x = self.encoder.encode(row)?;
                let class = self.estimator.predict_class(x.view())?;
                self.classes.get(class).cloned().ok_or_else(|| {
                    ModelError::prediction(format!("class index {} outside class list", class))
                })
            })
            .collect()
    }
}

/// Dense matrix from nested rows, checking that every row has `width` columns
pub(crate) fn to_matrix(rows: Vec<Vec<f64>>, width: usize, name: &str) -> ModelResult<Array2<f64>> {
    if rows.is_empty() {
        return Err(ModelError::incompatible(format!("{} is empty", name)));
    }
    let n = rows.len();
    if let Some(bad) = rows.iter().position(|r| r.len() != width) {
        return Err(ModelError::incompatible(format!(
            "{} row {} has {} columns, encoder produces {}",
            name,
            bad,
            rows[bad].len(),
            width
        )));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    if flat.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::incompatible(format!("{} contains non-finite values", name)));
    }
    Array2::from_shape_vec((n, width), flat)
        .map_err(|e| ModelError::incompatible(format!("{}: {}", name, e)))
}

/// Index of the largest score; ties go to the lowest index
pub(crate) fn argmax(scores: ArrayView1<f64>) -> ModelResult<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            return Err(ModelError::prediction("decision score is NaN"));
        }
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| ModelError::prediction("no class scores"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax(array![0.1, 0.7, 0.7].view()).unwrap(), 1);
        assert_eq!(argmax(array![-3.0, -5.0].view()).unwrap(), 0);
        assert!(argmax(array![0.1, f64::NAN].view()).is_err());
    }

    #[test]
    fn test_to_matrix_rejects_ragged_rows() {
        let err = to_matrix(vec![vec![1.0, 2.0], vec![3.0]], 2, "points").unwrap_err();
        assert!(err.to_string().contains("points row 1"));
        assert!(to_matrix(Vec::new(), 2, "points").is_err());
        assert_eq!(to_matrix(vec![vec![1.0, 2.0]], 2, "points").unwrap().dim(), (1, 2));
    }
}
