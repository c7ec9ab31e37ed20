use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One registered model and the artifact file it is served from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    pub file: String,
}

impl ModelEntry {
    pub fn new(id: &str, file: &str) -> Self {
        Self {
            id: id.to_string(),
            file: file.to_string(),
        }
    }
}

/// Registry entries shipped with the service
pub fn default_entries() -> Vec<ModelEntry> {
    vec![
        ModelEntry::new("knn", "modelo_knn.json"),
        ModelEntry::new("árvore", "modelo_árvore.json"),
        ModelEntry::new("naive_bayes", "modelo_naive_bayes.json"),
        ModelEntry::new("svm", "modelo_svm.json"),
    ]
}

/// Storage status of a registered artifact
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactInfo {
    pub id: String,
    pub path: PathBuf,
    pub exists: bool,
    pub size_bytes: Option<u64>,
    pub sha256: Option<String>,
}

/// Fixed mapping from model id to artifact location, built once at startup
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    base_dir: PathBuf,
    entries: Vec<ModelEntry>,
}

impl ModelRegistry {
    pub fn new(base_dir: impl Into<PathBuf>, entries: Vec<ModelEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(anyhow!("Model registry has no entries"));
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.id.trim().is_empty() {
                return Err(anyhow!("Model registry entry with empty id"));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(anyhow!("Duplicate model id in registry: {}", entry.id));
            }
        }

        let base_dir = base_dir.into();
        info!("Model registry: {} models under {}", entries.len(), base_dir.display());

        Ok(Self { base_dir, entries })
    }

    #[cfg(test)]
    pub fn with_defaults(base_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(base_dir, default_entries())
    }

    /// Artifact location for a model id. Existence is not checked here.
    pub fn resolve(&self, model_id: &str) -> Option<PathBuf> {
        self.entries
            .iter()
            .find(|e| e.id == model_id)
            .map(|e| self.base_dir.join(&e.file))
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    /// (id, artifact path) pairs in registry order
    pub fn handles(&self) -> impl Iterator<Item = (&str, PathBuf)> {
        self.model_ids()
            .filter_map(|id| self.resolve(id).map(|path| (id, path)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn describe(&self) -> Vec<ArtifactInfo> {
        self.handles()
            .map(|(id, path)| {
                let (exists, size_bytes, sha256) = match std::fs::read(&path) {
                    Ok(bytes) => (true, Some(bytes.len() as u64), Some(fingerprint(&bytes))),
                    Err(e) => {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            warn!("Cannot read artifact {}: {}", path.display(), e);
                        }
                        (path.exists(), None, None)
                    }
                };
                ArtifactInfo {
                    id: id.to_string(),
                    path,
                    exists,
                    size_bytes,
                    sha256,
                }
            })
            .collect()
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_order() {
        let registry = ModelRegistry::with_defaults("modelos").unwrap();
        let ids: Vec<&str> = registry.model_ids().collect();
        assert_eq!(ids, vec!["knn", "árvore", "naive_bayes", "svm"]);
    }

    #[test]
    fn test_resolve_joins_base_dir() {
        let registry = ModelRegistry::with_defaults("modelos").unwrap();
        assert_eq!(
            registry.resolve("svm"),
            Some(PathBuf::from("modelos").join("modelo_svm.json"))
        );
        assert_eq!(registry.resolve("random_forest"), None);
    }

    #[test]
    fn test_handles_follow_resolve_in_registry_order() {
        let registry = ModelRegistry::with_defaults("modelos").unwrap();
        let handles: Vec<(&str, PathBuf)> = registry.handles().collect();
        let expected: Vec<(&str, PathBuf)> = registry
            .model_ids()
            .map(|id| (id, registry.resolve(id).unwrap()))
            .collect();
        assert_eq!(handles, expected);
        assert_eq!(handles[1].1, PathBuf::from("modelos").join("modelo_árvore.json"));
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(ModelRegistry::new("modelos", Vec::new()).is_err());

        let entries = vec![
            ModelEntry::new("knn", "a.json"),
            ModelEntry::new("knn", "b.json"),
        ];
        assert!(ModelRegistry::new("modelos", entries).is_err());
    }

    #[test]
    fn test_describe_reports_missing_and_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("modelo_knn.json"), b"abc").unwrap();

        let registry = ModelRegistry::with_defaults(dir.path()).unwrap();
        let infos = registry.describe();

        assert_eq!(infos.len(), 4);
        assert!(infos[0].exists);
        assert_eq!(infos[0].size_bytes, Some(3));
        assert_eq!(
            infos[0].sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert!(!infos[3].exists);
        assert!(infos[3].sha256.is_none());
    }
}
