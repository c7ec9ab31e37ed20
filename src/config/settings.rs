use anyhow::{anyhow, Context, Result};
use axum::http::HeaderValue;
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::ml::registry::{default_entries, ModelEntry};

pub const ENV_PREFIX: &str = "SALARY_BANDS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub models: ModelSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the API from a browser
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Directory holding the classifier artifacts
    pub dir: String,
    /// Keep loaded classifiers across requests
    pub cache: bool,
    pub registry: Vec<ModelEntry>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            dir: "modelos".to_string(),
            cache: false,
            registry: default_entries(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// TOML file if present, then SALARY_BANDS__* variables over the defaults
    pub fn load(path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        // Missing keys fall back to the serde defaults above
        let config = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|errors| anyhow!("Invalid configuration: {}", errors.join(", ")))?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port must be > 0".to_string());
        }
        for origin in &self.server.cors_origins {
            if HeaderValue::from_str(origin).is_err() {
                errors.push(format!("server.cors_origins: invalid origin '{}'", origin));
            }
        }

        if self.models.dir.trim().is_empty() {
            errors.push("models.dir must not be empty".to_string());
        }
        if self.models.registry.is_empty() {
            errors.push("models.registry must list at least one model".to_string());
        }
        let mut seen = HashSet::new();
        for entry in &self.models.registry {
            if !seen.insert(entry.id.as_str()) {
                errors.push(format!("models.registry: duplicate id '{}'", entry.id));
            }
            if entry.file.trim().is_empty() {
                errors.push(format!("models.registry: '{}' has no file", entry.id));
            }
        }

        if self.logging.level.trim().is_empty() {
            errors.push("logging.level must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.models.dir, "modelos");
        assert_eq!(config.models.registry.len(), 4);
        assert!(!config.models.cache);
    }

    #[test]
    fn test_validation_collects_errors() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        config.models.registry.push(ModelEntry::new("knn", "other.json"));

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("duplicate id 'knn'")));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9100

[models]
dir = "/srv/modelos"
cache = true

[[models.registry]]
id = "knn"
file = "modelo_knn.json"
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.models.dir, "/srv/modelos");
        assert!(config.models.cache);
        assert_eq!(config.models.registry, vec![ModelEntry::new("knn", "modelo_knn.json")]);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.models.registry.len(), 4);
        assert_eq!(config.models.registry[1].id, "árvore");
    }

    #[test]
    fn test_renders_as_toml() {
        let rendered = AppConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[server]"));
        assert!(rendered.contains("modelo_naive_bayes.json"));
    }
}
