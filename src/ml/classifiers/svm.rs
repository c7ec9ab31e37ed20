use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::{argmax, to_matrix, Estimator};
use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvmSpec {
    /// One weight row per class, or a single row for the binary case
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

/// Linear SVM with one-vs-rest decision functions
pub struct LinearSvmClassifier {
    coef: Array2<f64>,
    intercept: Array1<f64>,
}

impl LinearSvmClassifier {
    pub fn from_spec(spec: LinearSvmSpec, width: usize, n_classes: usize) -> ModelResult<Self> {
        let coef = to_matrix(spec.coef, width, "svm coef")?;
        let intercept = Array1::from(spec.intercept);

        if intercept.len() != coef.nrows() {
            return Err(ModelError::incompatible(format!(
                "svm: {} coef rows but {} intercepts",
                coef.nrows(),
                intercept.len()
            )));
        }
        let expected_rows = if n_classes == 2 { 1 } else { n_classes };
        if coef.nrows() != expected_rows && coef.nrows() != n_classes {
            return Err(ModelError::incompatible(format!(
                "svm: {} coef rows for {} classes",
                coef.nrows(),
                n_classes
            )));
        }
        if intercept.iter().any(|b| !b.is_finite()) {
            return Err(ModelError::incompatible("svm: non-finite intercept"));
        }

        Ok(Self { coef, intercept })
    }

    pub fn decision_function(&self, x: ArrayView1<f64>) -> Array1<f64> {
        self.coef.dot(&x) + &self.intercept
    }
}

impl Estimator for LinearSvmClassifier {
    fn kind(&self) -> &'static str {
        "linear_svm"
    }

    fn predict_class(&self, x: ArrayView1<f64>) -> ModelResult<usize> {
        if x.len() != self.coef.ncols() {
            return Err(ModelError::prediction(format!(
                "svm expects {} features, got {}",
                self.coef.ncols(),
                x.len()
            )));
        }

        let scores = self.decision_function(x);
        if scores.len() == 1 {
            let s = scores[0];
            if s.is_nan() {
                return Err(ModelError::prediction("decision score is NaN"));
            }
            return Ok(if s > 0.0 { 1 } else { 0 });
        }
        argmax(scores.view())
    }
}
