use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::ml::classifiers::{Classifier, EstimatorSpec, Pipeline};
use crate::ml::encoder::{EncoderSpec, FeatureEncoder};
use crate::types::RawPrediction;

pub const FORMAT_VERSION: u32 = 1;

/// Serialized classifier as stored in the models directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub format_version: u32,
    /// Value emitted for each class index
    pub classes: Vec<RawPrediction>,
    pub encoder: EncoderSpec,
    pub estimator: EstimatorSpec,
}

#[derive(Deserialize)]
struct ArtifactHeader {
    format_version: u32,
}

impl ClassifierArtifact {
    pub fn into_classifier(self) -> ModelResult<Pipeline> {
        if self.format_version != FORMAT_VERSION {
            return Err(ModelError::incompatible(format!(
                "format version {} (supported: {})",
                self.format_version, FORMAT_VERSION
            )));
        }
        if self.classes.is_empty() {
            return Err(ModelError::incompatible("artifact declares no classes"));
        }

        let encoder = FeatureEncoder::from_spec(self.encoder)?;
        let estimator = self.estimator.build(encoder.width(), self.classes.len())?;
        Ok(Pipeline::new(encoder, estimator, self.classes))
    }
}

/// Source of classifiers for the aggregator
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactLoader: Send + Sync {
    fn load(&self, path: &Path) -> ModelResult<Arc<dyn Classifier>>;
}

/// Reads JSON artifacts from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonArtifactLoader;

impl JsonArtifactLoader {
    pub fn parse(path: &Path, bytes: &[u8]) -> ModelResult<ClassifierArtifact> {
        let corrupt = |source| ModelError::Corrupt {
            path: path.to_path_buf(),
            source,
        };

        // Check the version first so newer layouts report as incompatible
        let header: ArtifactHeader = serde_json::from_slice(bytes).map_err(corrupt)?;
        if header.format_version != FORMAT_VERSION {
            return Err(ModelError::incompatible(format!(
                "{} has format version {} (supported: {})",
                path.display(),
                header.format_version,
                FORMAT_VERSION
            )));
        }

        serde_json::from_slice(bytes).map_err(corrupt)
    }
}

impl ArtifactLoader for JsonArtifactLoader {
    fn load(&self, path: &Path) -> ModelResult<Arc<dyn Classifier>> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ModelError::ArtifactNotFound {
                path: path.to_path_buf(),
            },
            _ => ModelError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let classifier = Self::parse(path, &bytes)?.into_classifier()?;
        debug!(
            "Loaded {} classifier from {} ({} bytes)",
            classifier.kind(),
            path.display(),
            bytes.len()
        );
        Ok(Arc::new(classifier))
    }
}
