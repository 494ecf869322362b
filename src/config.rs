//! Configuration Management
//!
//! Handles persistent configuration storage for rulectl.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default service endpoint used when none is configured.
const DEFAULT_ENDPOINT: &str = "https://compliance.cloud.example.com/api";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Last used compliance service instance ID
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Service endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rulectl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        match Self::config_path() {
            Some(path) => self.save_to(&path),
            None => Ok(()),
        }
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get effective instance ID (CLI > env > config)
    pub fn effective_instance(&self) -> String {
        std::env::var("RULECTL_INSTANCE_ID")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.instance_id.clone())
            .unwrap_or_default()
    }

    /// Get effective endpoint (CLI > env > config > default)
    pub fn effective_endpoint(&self) -> String {
        std::env::var("RULECTL_ENDPOINT")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    /// Set instance ID and save
    pub fn set_instance(&mut self, instance_id: &str) -> Result<()> {
        self.instance_id = Some(instance_id.to_string());
        self.save()
    }
}
