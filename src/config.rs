//! Configuration module for sidelines
//!
//! Loads user configuration from ~/.sidelines/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub syntax_highlighting: bool,
    /// Syntax theme name (syntect/bat theme)
    pub syntax_theme: Option<String>,
    /// Author recorded on new comments
    pub author: String,
    /// Thread database (default: platform config dir)
    pub database: Option<PathBuf>,
    /// Width of each side in text output (default 60)
    pub column_width: usize,
    /// Rows of context around changes, `None` shows whole files
    pub context_lines: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            syntax_highlighting: true,
            syntax_theme: None,
            author: std::env::var("USER").unwrap_or_else(|_| "anonymous".to_string()),
            database: None,
            column_width: 60,
            context_lines: None,
        }
    }
}

impl Config {
    /// Load configuration from default path (~/.sidelines/config.toml)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Invalid config file: {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sidelines")
            .join("config.toml")
    }

    /// Merge CLI overrides into config
    pub fn with_overrides(
        mut self,
        no_highlight: bool,
        author: Option<String>,
        column_width: Option<usize>,
        context_lines: Option<usize>,
    ) -> Self {
        if no_highlight {
            self.syntax_highlighting = false;
        }
        if let Some(author) = author {
            self.author = author;
        }
        if let Some(width) = column_width {
            self.column_width = width.max(8);
        }
        if let Some(ctx) = context_lines {
            self.context_lines = Some(ctx);
        }
        self
    }

    /// Create a default config file
    pub fn create_default() -> Result<PathBuf> {
        let config_path = Self::default_path();
        Self::default().write_to(&config_path)?;
        Ok(config_path)
    }

    pub fn write_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert!(config.syntax_highlighting);
        assert_eq!(config.column_width, 60);
        assert_eq!(config.context_lines, None);
    }

    #[test]
    fn test_partial_file_and_write_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "author = \"alice\"\ncolumn_width = 40\ncontext_lines = 3\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.author, "alice");
        assert_eq!(config.column_width, 40);
        assert_eq!(config.context_lines, Some(3));
        assert!(config.syntax_highlighting);

        let config = config.with_overrides(true, Some("bob".to_string()), Some(2), Some(7));
        assert!(!config.syntax_highlighting);
        assert_eq!(config.column_width, 8);
        assert_eq!(config.context_lines, Some(7));
        config.write_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "column_width = \"wide\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
