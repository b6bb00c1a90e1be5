//! Application Configuration
//!
//! Loaded from an optional JSON file; every key has a default and CLI flags
//! override the file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::format::DateLocale;
use crate::raster::{ExportFormat, RasterError, RasterOptions, DEFAULT_SCALE};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Raster(#[from] RasterError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default = "default_scale")]
    pub scale: f32,
    /// `None` keeps the exported background transparent.
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub locale: DateLocale,
    #[serde(default = "default_toast_millis")]
    pub toast_millis: u64,
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf { PathBuf::from("downloads") }
fn default_scale() -> f32 { DEFAULT_SCALE }
fn default_toast_millis() -> u64 { 3500 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: ExportFormat::default(),
            scale: default_scale(),
            background: None,
            locale: DateLocale::default(),
            toast_millis: default_toast_millis(),
            templates_dir: None,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.raster_options()?;
        Ok(config)
    }

    pub fn raster_options(&self) -> Result<RasterOptions, RasterError> {
        RasterOptions::from_user(self.scale, self.background.as_deref())
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("downloads"));
        assert_eq!(config.format, ExportFormat::Png);
        assert_eq!(config.scale, 2.0);
        assert_eq!(config.locale, DateLocale::EnIn);
        assert_eq!(config.toast_duration(), Duration::from_millis(3500));
        assert_eq!(config.raster_options().unwrap(), RasterOptions::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.json");
        fs::write(
            &path,
            r##"{"outputDir": "out", "format": "svg", "locale": "en-US", "background": "#ffffff"}"##,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.format, ExportFormat::Svg);
        assert_eq!(config.locale, DateLocale::EnUs);
        assert_eq!(config.raster_options().unwrap().background, Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_load_rejects_bad_scale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.json");
        fs::write(&path, r#"{"scale": 10}"#).unwrap();

        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Raster(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/cards.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cards.json"));
    }
}
