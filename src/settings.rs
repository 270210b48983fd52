use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Overrides the stored base URL for the current session.
pub const BASE_URL_ENV: &str = "DATATRAC_API_URL";

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub connection: ConnectionSettings,
    pub preferences: Preferences,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Length of the "Top Downloaded" ranking
    pub top_count: usize,
    pub font_size: u32,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            top_count: 5,
            font_size: 14,
        }
    }
}

impl AppSettings {
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("datatrac-hub");

        fs::create_dir_all(&config_dir)
            .with_context(|| format!("Cannot create {}", config_dir.display()))?;
        Ok(config_dir.join("settings.json"))
    }

    pub fn load() -> Result<Self> {
        let config_file = Self::config_path()?;

        log::debug!("Loading settings from: {:?}", config_file);

        if config_file.exists() {
            let contents = fs::read_to_string(&config_file)
                .with_context(|| format!("Cannot read {}", config_file.display()))?;
            let settings: AppSettings =
                serde_json::from_str(&contents).context("Invalid settings file")?;
            log::info!("Settings loaded successfully");
            Ok(settings)
        } else {
            log::info!("No settings file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_file = Self::config_path()?;

        log::debug!("Saving settings to: {:?}", config_file);

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&config_file, contents)
            .with_context(|| format!("Cannot write {}", config_file.display()))?;

        log::info!("Settings saved successfully");
        Ok(())
    }

    /// Apply a session-only base URL override. Blank values are ignored.
    pub fn with_base_url_override(mut self, value: Option<String>) -> Self {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            log::info!("Using base URL from {}: {}", BASE_URL_ENV, url);
            self.connection.base_url = url;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"connection": {"base_url": "http://registry:9000"}}"#)
                .unwrap();
        assert_eq!(settings.connection.base_url, "http://registry:9000");
        assert_eq!(settings.preferences.top_count, 5);
        assert_eq!(settings.preferences.font_size, 14);

        let settings: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.connection.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_base_url_override() {
        let settings = AppSettings::default()
            .with_base_url_override(Some(" http://other:8080 ".to_string()));
        assert_eq!(settings.connection.base_url, "http://other:8080");

        let settings = AppSettings::default().with_base_url_override(Some("   ".to_string()));
        assert_eq!(settings.connection.base_url, DEFAULT_BASE_URL);

        let settings = AppSettings::default().with_base_url_override(None);
        assert_eq!(settings.connection.base_url, DEFAULT_BASE_URL);
    }
}
