use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::error::ModelResult;
use crate::ml::artifact::ArtifactLoader;
use crate::ml::classifiers::Classifier;

/// Process-wide cache of loaded classifiers keyed by model id.
/// Only successful loads are stored.
#[derive(Default)]
pub struct ClassifierCache {
    entries: RwLock<HashMap<String, Arc<dyn Classifier>>>,
}

impl ClassifierCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(
        &self,
        model_id: &str,
        path: &Path,
        loader: &dyn ArtifactLoader,
    ) -> ModelResult<Arc<dyn Classifier>> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(clf) = entries.get(model_id) {
                return Ok(Arc::clone(clf));
            }
        }

        let clf = loader.load(path)?;

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let clf = Arc::clone(entries.entry(model_id.to_string()).or_insert(clf));
        debug!("Cached classifier '{}' ({} cached)", model_id, entries.len());
        Ok(clf)
    }

    /// Drop every cached classifier, returning how many were evicted
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let evicted = entries.len();
        entries.clear();
        info!("Classifier cache cleared ({} entries)", evicted);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
