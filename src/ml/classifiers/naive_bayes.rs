use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use super::{argmax, to_matrix, Estimator};
use crate::error::{ModelError, ModelResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNbSpec {
    pub class_log_prior: Vec<f64>,
    /// Per-class feature means
    pub theta: Vec<Vec<f64>>,
    /// Per-class feature variances (already smoothed)
    pub var: Vec<Vec<f64>>,
}

/// Gaussian naive Bayes over the encoded feature vector
pub struct GaussianNbClassifier {
    class_log_prior: Array1<f64>,
    theta: Array2<f64>,
    var: Array2<f64>,
    /// -0.5 * sum(log(2*pi*var)) per class
    log_norm: Array1<f64>,
}

impl GaussianNbClassifier {
    pub fn from_spec(spec: GaussianNbSpec, width: usize, n_classes: usize) -> ModelResult<Self> {
        let theta = to_matrix(spec.theta, width, "naive bayes theta")?;
        let var = to_matrix(spec.var, width, "naive bayes var")?;
        let class_log_prior = Array1::from(spec.class_log_prior);

        let k = class_log_prior.len();
        if k == 0 || theta.nrows() != k || var.nrows() != k {
            return Err(ModelError::incompatible(format!(
                "naive bayes: {} priors, {} theta rows, {} var rows",
                k,
                theta.nrows(),
                var.nrows()
            )));
        }
        if k != n_classes {
            return Err(ModelError::incompatible(format!(
                "naive bayes: {} classes in model, {} in artifact",
                k, n_classes
            )));
        }
        if class_log_prior.iter().any(|p| !p.is_finite()) {
            return Err(ModelError::incompatible("naive bayes: non-finite class prior"));
        }
        if var.iter().any(|&v| v <= 0.0) {
            return Err(ModelError::incompatible("naive bayes: variances must be positive"));
        }

        let log_norm = var.mapv(|v| (2.0 * PI * v).ln()).sum_axis(Axis(1)) * -0.5;

        Ok(Self {
            class_log_prior,
            theta,
            var,
            log_norm,
        })
    }

    /// Joint log-likelihood of `x` under each class
    pub fn joint_log_likelihood(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let diff = &self.theta - &x;
        let mahalanobis = (diff.mapv(|d| d * d) / &self.var).sum_axis(Axis(1));
        &self.class_log_prior + &self.log_norm - mahalanobis * 0.5
    }
}

impl Estimator for GaussianNbClassifier {
    fn kind(&self) -> &'static str {
        "gaussian_nb"
    }

    fn predict_class(&self, x: ArrayView1<f64>) -> ModelResult<usize> {
        if x.len() != self.theta.ncols() {
            return Err(ModelError::prediction(format!(
                "naive bayes expects {} features, got {}",
                self.theta.ncols(),
                x.len()
            )));
        }
        argmax(self.joint_log_likelihood(x).view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn spec() -> GaussianNbSpec {
        GaussianNbSpec {
            class_log_prior: vec![(0.5f64).ln(), (0.5f64).ln()],
            theta: vec![vec![0.0, 0.0], vec![4.0, 4.0]],
            var: vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        }
    }

    #[test]
    fn test_picks_closest_mean() {
        let nb = GaussianNbClassifier::from_spec(spec(), 2, 2).unwrap();
        assert_eq!(nb.predict_class(array![0.5, -0.2].view()).unwrap(), 0);
        assert_eq!(nb.predict_class(array![3.5, 4.4].view()).unwrap(), 1);
    }

    #[test]
    fn test_prior_shifts_decision() {
        let mut s = spec();
        s.class_log_prior = vec![(0.001f64).ln(), (0.999f64).ln()];
        let nb = GaussianNbClassifier::from_spec(s, 2, 2).unwrap();
        // midpoint is a tie on likelihood, so the prior decides
        assert_eq!(nb.predict_class(array![2.0, 2.0].view()).unwrap(), 1);
    }

    #[test]
    fn test_log_likelihood_value() {
        let nb = GaussianNbClassifier::from_spec(spec(), 2, 2).unwrap();
        let jll = nb.joint_log_likelihood(array![0.0, 0.0].view());
        let expected = (0.5f64).ln() - (2.0 * PI).ln();
        assert!((jll[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_variance_and_class_count() {
        let mut s = spec();
        s.var[1][0] = 0.0;
        assert!(GaussianNbClassifier::from_spec(s, 2, 2).is_err());
        assert!(GaussianNbClassifier::from_spec(spec(), 2, 6).is_err());
    }
}
