use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::ClassifierCache;
use crate::error::{ModelError, ModelResult};
use crate::ml::artifact::{ArtifactLoader, JsonArtifactLoader};
use crate::ml::bands::map_prediction;
use crate::ml::classifiers::Classifier;
use crate::ml::registry::ModelRegistry;
use crate::types::{FeatureRow, InputRecord, ModelOutcome, PredictionResult};

/// Runs one record through every registered model. A failing model only
/// affects its own entry.
pub struct InferenceAggregator {
    registry: Arc<ModelRegistry>,
    loader: Arc<dyn ArtifactLoader>,
    cache: Option<ClassifierCache>,
}

impl InferenceAggregator {
    pub fn new(registry: Arc<ModelRegistry>, loader: Arc<dyn ArtifactLoader>) -> Self {
        Self {
            registry,
            loader,
            cache: None,
        }
    }

    /// Aggregator reading JSON artifacts from the registry's directory
    pub fn from_registry(registry: Arc<ModelRegistry>) -> Self {
        Self::new(registry, Arc::new(JsonArtifactLoader))
    }

    /// Keep loaded classifiers for later requests
    pub fn with_cache(mut self) -> Self {
        self.cache = Some(ClassifierCache::new());
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn cached_models(&self) -> usize {
        self.cache.as_ref().map(|c| c.len()).unwrap_or(0)
    }

    /// Evict cached classifiers; returns 0 when caching is off
    pub fn clear_cache(&self) -> usize {
        self.cache.as_ref().map(|c| c.clear()).unwrap_or(0)
    }

    /// Predict with every registered model, in registry order
    pub fn predict_all(&self, input: &InputRecord) -> PredictionResult {
        let started = Instant::now();
        let row = input.to_row();
        let mut result = PredictionResult::new();

        for (model_id, path) in self.registry.handles() {
            // A panicking loader or classifier only fails its own entry
            let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
                self.predict_one(model_id, &path, &row)
            }))
            .unwrap_or_else(|payload| Err(ModelError::Panicked(panic_message(payload.as_ref()))));

            let outcome = match attempt {
                Ok(band) => {
                    debug!("Model '{}' predicted {}", model_id, band);
                    ModelOutcome::Band(band)
                }
                Err(e) => {
                    warn!(model = %model_id, error = %e, "Model prediction failed");
                    ModelOutcome::Failed(e.to_string())
                }
            };
            result.insert(model_id, outcome);
        }

        info!(
            models = result.len(),
            failed = result.failure_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prediction complete"
        );
        result
    }

    /// Load (or reuse) a model by id
    pub fn classifier(&self, model_id: &str, path: &Path) -> ModelResult<Arc<dyn Classifier>> {
        match &self.cache {
            Some(cache) => cache.get_or_load(model_id, path, self.loader.as_ref()),
            None => self.loader.load(path),
        }
    }

    fn predict_one(&self, model_id: &str, path: &Path, row: &FeatureRow) -> ModelResult<String> {
        let clf = self.classifier(model_id, path)?;
        let raw = clf
            .predict(std::slice::from_ref(row))?
            .into_iter()
            .next()
            .ok_or(ModelError::EmptyPrediction)?;
        Ok(map_prediction(&raw))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
