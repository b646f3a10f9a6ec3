use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "calc-autocomplete";
const LEARNING_DATA_FILE: &str = "autocomplete_data.json";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutocompleteConfig {
    /// Inputs shorter than this (in chars) never trigger a search
    pub min_chars_trigger: usize,
    pub debounce_delay_ms: u64,
    pub max_results: usize,
    pub history_max_results: usize,
    pub min_history_similarity: f64,
    pub retention_days: u32,
    pub fuzzy_matching: bool,
    /// Pattern catalog file; `None` uses the bundled catalog
    pub patterns_path: Option<PathBuf>,
    pub learning_data_path: Option<PathBuf>,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            min_chars_trigger: 2,
            debounce_delay_ms: 150,
            max_results: 10,
            history_max_results: 5,
            min_history_similarity: 40.0,
            retention_days: 30,
            fuzzy_matching: true,
            patterns_path: None,
            learning_data_path: None,
        }
    }
}

impl AutocompleteConfig {
    /// Read a JSON config file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let parsed: AutocompleteConfig = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse JSON from {}", path.display()))?;
        Ok(parsed)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    /// Configured learning-data path, else the per-user data directory
    pub fn resolved_learning_data_path(&self) -> PathBuf {
        self.learning_data_path.clone().unwrap_or_else(default_learning_data_path)
    }
}

fn default_learning_data_path() -> PathBuf {
    match dirs::data_dir() {
        Some(base) => base.join(APP_DIR).join(LEARNING_DATA_FILE),
        None => PathBuf::from(LEARNING_DATA_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AutocompleteConfig::default();
        assert_eq!(config.min_chars_trigger, 2);
        assert_eq!(config.debounce_delay(), Duration::from_millis(150));
        assert_eq!(config.max_results, 10);
        assert_eq!(config.min_history_similarity, 40.0);
        assert!(config.fuzzy_matching);
    }

    #[test]
    fn test_from_file_partial() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"debounce_delay_ms": 300, "learning_data_path": "/tmp/ac.json"}"#).unwrap();

        let config = AutocompleteConfig::from_file(&path).unwrap();
        assert_eq!(config.debounce_delay_ms, 300);
        assert_eq!(config.max_results, 10);
        assert_eq!(config.resolved_learning_data_path(), PathBuf::from("/tmp/ac.json"));
    }

    #[test]
    fn test_from_file_errors_name_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        let err = AutocompleteConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
