//! Credential resolution
//!
//! The compliance service authenticates with a static bearer API key. Keys are
//! resolved from the environment first, then from a credentials file under the
//! user's config directory.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "RULECTL_API_KEY";

/// Resolved API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Resolve credentials from the environment or the credentials file.
    pub fn resolve() -> Result<Self> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if validate_api_key(&key) {
                return Ok(Self { api_key: key });
            }
            tracing::warn!("Invalid API key format in {}", API_KEY_ENV);
        }

        if let Some(key) = read_credentials_file() {
            return Ok(Self { api_key: key });
        }

        Err(anyhow::anyhow!(
            "No API key found. Set {} or add `api_key = ...` to the credentials file",
            API_KEY_ENV
        ))
        .context("Failed to resolve credentials")
    }

    /// Build credentials from a literal key (used by tests).
    pub fn from_key(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
        }
    }

    /// The bearer token to send with API requests.
    pub fn token(&self) -> &str {
        &self.api_key
    }
}

/// Get the credentials file path (`<config dir>/rulectl/credentials`)
pub fn credentials_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("rulectl").join("credentials"))
}

/// Validate an API key: printable ASCII, no whitespace, plausible length.
fn validate_api_key(key: &str) -> bool {
    key.len() >= 16 && key.chars().all(|c| c.is_ascii_graphic())
}

/// Read the API key from the credentials file.
/// Lines are `key = value` pairs; comments and blanks are skipped.
fn read_credentials_file() -> Option<String> {
    let path = credentials_path()?;
    let content = std::fs::read_to_string(&path).ok()?;

    for line in content.lines() {
        let line = line.trim();
        // Security: Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with("api_key") && line.contains('=') {
            if let Some(value) = line.split('=').nth(1) {
                let key = value.trim().to_string();
                if validate_api_key(&key) {
                    return Some(key);
                }
                tracing::warn!("Invalid API key format in {:?}", path);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("abcdef0123456789abcdef"));
        assert!(!validate_api_key("short"));
        assert!(!validate_api_key("has whitespace in the middle"));
    }

    #[test]
    fn test_from_key_round_trips() {
        let credentials = Credentials::from_key("test-key-0123456789");
        assert_eq!(credentials.token(), "test-key-0123456789");
    }
}
