use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::DEFAULT_API_URL;
use crate::form::{Feature, FeatureSelection, Scenario};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Failed to create config directory")]
    CreateDirError,

    #[error("Invalid feature in config: {0}")]
    InvalidFeature(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Overall request timeout; absent means the HTTP client default
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub default_scenario: Scenario,
    /// Feature keys that start unchecked
    pub disabled_features: Vec<String>,
}

impl FormConfig {
    pub fn initial_features(&self) -> Result<FeatureSelection, ConfigError> {
        let mut selection = FeatureSelection::default();
        for key in &self.disabled_features {
            let feature: Feature = key
                .parse()
                .map_err(|_| ConfigError::InvalidFeature(key.clone()))?;
            selection.set(feature, false);
        }
        Ok(selection)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UIConfig {
    pub download_dir: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            download_dir: "~/Downloads".to_string(),
        }
    }
}

impl UIConfig {
    pub fn download_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.download_dir).into_owned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub form: FormConfig,
    pub ui: UIConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let path = Path::new(path);

        // A missing file means defaults
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;

        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let path = Path::new(path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| ConfigError::CreateDirError)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn with_api_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.api.base_url = url;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let config = Config::load(path.to_str().unwrap()).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.api.base_url, "https://letsdoitagain.onrender.com");
        assert_eq!(config.api.timeout(), None);
        assert_eq!(config.form.default_scenario, Scenario::General);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mailscope").join("config.json");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.api.base_url = "http://localhost:5000".to_string();
        config.api.timeout_secs = Some(20);
        config.form.default_scenario = Scenario::BusinessProposal;
        config.form.disabled_features = vec!["tone".to_string()];
        config.save(path).unwrap();

        let loaded = Config::load(path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.api.timeout(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"form": {"default_scenario": "Customer Support"}}"#).unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();

        assert_eq!(config.form.default_scenario, Scenario::CustomerSupport);
        assert_eq!(config.api, ApiConfig::default());
        assert_eq!(config.ui.download_dir, "~/Downloads");
    }

    #[test]
    fn test_malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let err = Config::load(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_initial_features() {
        let form = FormConfig {
            default_scenario: Scenario::General,
            disabled_features: vec!["tone".to_string(), "argument_mining".to_string()],
        };
        let selection = form.initial_features().unwrap();
        assert!(!selection.is_enabled(Feature::Tone));
        assert!(!selection.is_enabled(Feature::ArgumentMining));
        assert_eq!(selection.enabled_count(), 13);

        let bad = FormConfig {
            default_scenario: Scenario::General,
            disabled_features: vec!["mood".to_string()],
        };
        assert!(matches!(bad.initial_features(), Err(ConfigError::InvalidFeature(k)) if k == "mood"));
    }

    #[test]
    fn test_api_url_override() {
        let config = Config::default().with_api_url(Some("http://127.0.0.1:8080".to_string()));
        assert_eq!(config.api.base_url, "http://127.0.0.1:8080");

        let config = Config::default().with_api_url(None);
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
    }
}
