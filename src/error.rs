use std::path::PathBuf;
use thiserror::Error;

/// Per-model failure. The `Display` text is what callers see after the
/// `Erro:` prefix in a prediction response.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("artifact not found: {}", path.display())]
    ArtifactNotFound { path: PathBuf },

    #[error("failed to read artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("incompatible artifact: {0}")]
    Incompatible(String),

    #[error("feature '{0}' not present in input record")]
    MissingColumn(String),

    #[error("feature '{column}' expects a {expected} value")]
    ColumnType { column: String, expected: &'static str },

    #[error("found unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("prediction failed: {0}")]
    Prediction(String),

    #[error("classifier produced no prediction")]
    EmptyPrediction,

    #[error("model panicked: {0}")]
    Panicked(String),
}

impl ModelError {
    pub fn incompatible(msg: impl Into<String>) -> Self {
        ModelError::Incompatible(msg.into())
    }

    pub fn prediction(msg: impl Into<String>) -> Self {
        ModelError::Prediction(msg.into())
    }
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_path() {
        let err = ModelError::ArtifactNotFound {
            path: PathBuf::from("modelos/modelo_svm.json"),
        };
        assert_eq!(err.to_string(), "artifact not found: modelos/modelo_svm.json");
    }

    #[test]
    fn test_unknown_category_message() {
        let err = ModelError::UnknownCategory {
            column: "job_title".to_string(),
            value: "Astronaut".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "found unknown category 'Astronaut' in column 'job_title'"
        );
    }
}
