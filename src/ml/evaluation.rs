use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::ml::bands::{map_prediction, BAND_TABLE};
use crate::ml::ensemble::InferenceAggregator;
use crate::types::{FeatureRow, InputRecord, RawPrediction};

/// Minimum accuracy each model is expected to reach on held-out data
pub const DEFAULT_ACCURACY_THRESHOLD: f64 = 0.40;

/// Held-out record with its true band
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledRecord {
    #[serde(flatten)]
    pub record: InputRecord,
    pub target: RawPrediction,
}

pub fn load_dataset(path: &Path) -> Result<Vec<LabeledRecord>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    let records: Vec<LabeledRecord> = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse dataset {}", path.display()))?;
    if records.is_empty() {
        return Err(anyhow!("Dataset {} has no records", path.display()));
    }
    Ok(records)
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelEvaluation {
    pub model_id: String,
    pub accuracy: Option<f64>,
    pub error: Option<String>,
    pub labels: Vec<LabelMetrics>,
}

impl ModelEvaluation {
    pub fn passed(&self, threshold: f64) -> bool {
        self.accuracy.map(|a| a >= threshold).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub evaluated_at: DateTime<Utc>,
    pub threshold: f64,
    pub samples: usize,
    pub models: Vec<ModelEvaluation>,
}

impl EvaluationReport {
    pub fn all_passed(&self) -> bool {
        self.models.iter().all(|m| m.passed(self.threshold))
    }

    pub fn failing_models(&self) -> Vec<&str> {
        self.models
            .iter()
            .filter(|m| !m.passed(self.threshold))
            .map(|m| m.model_id.as_str())
            .collect()
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("                  MODEL EVALUATION");
        println!("{}", "=".repeat(60));
        println!("Samples:            {}", self.samples);
        println!("Threshold:          {:.3}", self.threshold);

        for model in &self.models {
            println!("{}", "-".repeat(60));
            match (model.accuracy, &model.error) {
                (Some(acc), _) => {
                    let mark = if acc >= self.threshold { "PASS" } else { "FAIL" };
                    println!("[{}] {}  accuracy {:.3}", mark, model.model_id, acc);
                    println!("  {:<16} {:>9} {:>9} {:>9} {:>8}", "label", "precision", "recall", "f1", "support");
                    for m in &model.labels {
                        println!(
                            "  {:<16} {:>9.2} {:>9.2} {:>9.2} {:>8}",
                            m.label, m.precision, m.recall, m.f1, m.support
                        );
                    }
                }
                (None, Some(err)) => println!("[FAIL] {}  Erro: {}", model.model_id, err),
                (None, None) => println!("[FAIL] {}", model.model_id),
            }
        }
        println!("{}", "=".repeat(60));
    }
}

/// Score every registered model against a labelled dataset
pub fn evaluate(
    aggregator: &InferenceAggregator,
    dataset: &[LabeledRecord],
    threshold: f64,
) -> EvaluationReport {
    let rows: Vec<FeatureRow> = dataset.iter().map(|r| r.record.to_row()).collect();
    let truth: Vec<String> = dataset.iter().map(|r| map_prediction(&r.target)).collect();

    let mut models = Vec::new();
    for (model_id, path) in aggregator.registry().handles() {
        let predicted = aggregator
            .classifier(model_id, &path)
            .and_then(|clf| clf.predict(&rows));

        let evaluation = match predicted {
            Ok(raw) if raw.len() == truth.len() => {
                let predicted: Vec<String> = raw.iter().map(map_prediction).collect();
                let accuracy = accuracy(&truth, &predicted);
                info!("Model '{}' accuracy: {:.3}", model_id, accuracy);
                ModelEvaluation {
                    model_id: model_id.to_string(),
                    accuracy: Some(accuracy),
                    error: None,
                    labels: label_metrics(&truth, &predicted),
                }
            }
            Ok(raw) => failed(
                model_id,
                format!("{} predictions for {} records", raw.len(), truth.len()),
            ),
            Err(e) => failed(model_id, e.to_string()),
        };
        models.push(evaluation);
    }

    EvaluationReport {
        evaluated_at: Utc::now(),
        threshold,
        samples: dataset.len(),
        models,
    }
}

fn failed(model_id: &str, error: String) -> ModelEvaluation {
    warn!("Model '{}' evaluation failed: {}", model_id, error);
    ModelEvaluation {
        model_id: model_id.to_string(),
        accuracy: None,
        error: Some(error),
        labels: Vec::new(),
    }
}

fn accuracy(truth: &[String], predicted: &[String]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

/// Bands sort in table order; any other label sorts after them
fn label_rank(label: &str) -> (usize, String) {
    let rank = BAND_TABLE
        .iter()
        .position(|b| *b == label)
        .unwrap_or(BAND_TABLE.len());
    (rank, label.to_string())
}

fn label_metrics(truth: &[String], predicted: &[String]) -> Vec<LabelMetrics> {
    // (true positives, predicted count, support)
    let mut counts: BTreeMap<(usize, String), (usize, usize, usize)> = BTreeMap::new();
    for (t, p) in truth.iter().zip(predicted) {
        counts.entry(label_rank(t)).or_default().2 += 1;
        let entry = counts.entry(label_rank(p)).or_default();
        entry.1 += 1;
        if t == p {
            entry.0 += 1;
        }
    }

    counts
        .into_iter()
        .map(|((_, label), (tp, predicted, support))| {
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            LabelMetrics {
                label,
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::artifact::fixtures::{constant_artifact, write};
    use crate::ml::registry::ModelRegistry;
    use crate::types::record::sample_record;
    use std::sync::Arc;

    fn labels(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn dataset(targets: &[i64]) -> Vec<LabeledRecord> {
        targets
            .iter()
            .map(|&t| LabeledRecord {
                record: sample_record(),
                target: RawPrediction::Integer(t),
            })
            .collect()
    }

    #[test]
    fn test_accuracy_and_label_metrics() {
        let truth = labels(&["Até 50k", "Até 50k", "50k–100k", "50k–100k"]);
        let predicted = labels(&["Até 50k", "50k–100k", "50k–100k", "50k–100k"]);

        assert!((accuracy(&truth, &predicted) - 0.75).abs() < 1e-12);

        let metrics = label_metrics(&truth, &predicted);
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].label, "Até 50k");
        assert!((metrics[0].precision - 1.0).abs() < 1e-12);
        assert!((metrics[0].recall - 0.5).abs() < 1e-12);
        assert_eq!(metrics[0].support, 2);
        assert!((metrics[1].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics[1].recall - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_labels_sort_after_bands() {
        let truth = labels(&["Acima de 300k", "7"]);
        let predicted = labels(&["7", "Até 50k"]);
        let order: Vec<String> = label_metrics(&truth, &predicted)
            .into_iter()
            .map(|m| m.label)
            .collect();
        assert_eq!(order, labels(&["Até 50k", "Acima de 300k", "7"]));
    }

    #[test]
    fn test_dataset_record_shape() {
        let json = r#"[{"experience_level":"SE","employment_type":"FT","job_title":"Data Scientist",
            "employee_residence":"BR","remote_ratio":100,"company_location":"BR","company_size":"M",
            "target":"100k–150k"}]"#;
        let records: Vec<LabeledRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records[0].record, sample_record());
        assert_eq!(records[0].target, RawPrediction::Label("100k–150k".to_string()));
    }

    #[test]
    fn test_evaluate_against_threshold() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "modelo_knn.json", &constant_artifact(2));
        write(dir.path(), "modelo_árvore.json", &constant_artifact(2));
        write(dir.path(), "modelo_naive_bayes.json", &constant_artifact(0));

        let registry = Arc::new(ModelRegistry::with_defaults(dir.path()).unwrap());
        let aggregator = InferenceAggregator::from_registry(registry);

        let report = evaluate(&aggregator, &dataset(&[2, 2, 1, 0]), DEFAULT_ACCURACY_THRESHOLD);

        assert_eq!(report.samples, 4);
        assert_eq!(report.models[0].accuracy, Some(0.5));
        assert!(report.models[0].passed(report.threshold));
        assert_eq!(report.models[2].accuracy, Some(0.25));
        assert!(report.models[3].error.as_deref().unwrap_or("").starts_with("artifact not found"));
        assert_eq!(report.failing_models(), vec!["naive_bayes", "svm"]);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_shipped_models_meet_threshold() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let dataset = load_dataset(&root.join("data").join("holdout.json")).unwrap();
        let registry = Arc::new(ModelRegistry::with_defaults(root.join("modelos")).unwrap());
        let aggregator = InferenceAggregator::from_registry(registry);

        let report = evaluate(&aggregator, &dataset, DEFAULT_ACCURACY_THRESHOLD);

        assert_eq!(report.models.len(), 4);
        assert!(report.models.iter().all(|m| m.error.is_none()));
        assert!(report.all_passed(), "below threshold: {:?}", report.failing_models());
    }
}
