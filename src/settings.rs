use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FinmanError, Result};
use crate::recurring::DEFAULT_SUGGESTION_THRESHOLD;
use crate::scheduler::DEFAULT_WORKER_THREADS;

pub const DB_FILENAME: &str = "finman.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_suggestion_threshold")]
    pub suggestion_threshold: f64,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_suggestion_threshold() -> f64 {
    DEFAULT_SUGGESTION_THRESHOLD
}

fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            suggestion_threshold: default_suggestion_threshold(),
            worker_threads: default_worker_threads(),
            default_currency: default_currency(),
        }
    }
}

impl Settings {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILENAME)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.suggestion_threshold) {
            return Err(FinmanError::Settings(format!(
                "suggestion_threshold must be between 0 and 1, got {}",
                self.suggestion_threshold
            )));
        }
        if self.worker_threads == 0 {
            return Err(FinmanError::Settings("worker_threads must be at least 1".to_string()));
        }
        if self.default_currency.trim().len() != 3 {
            return Err(FinmanError::Settings(format!(
                "default_currency must be a three-letter code, got {:?}",
                self.default_currency
            )));
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("finman")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("finman")
}

fn load_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| FinmanError::Settings(format!("{}: {e}", path.display())))?;
    settings.validate()?;
    Ok(settings)
}

fn save_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| FinmanError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn load_settings() -> Result<Settings> {
    load_from(&settings_path())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    settings.validate()?;
    save_to(&settings_path(), settings)
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
