//! Editor configuration.
//!
//! ## Learning: Serde for Serialization
//!
//! The `#[derive(Serialize, Deserialize)]` macro generates code to convert
//! structs to/from TOML. `#[serde(default)]` fills missing fields from
//! `Default::default()`, so a config file only needs the keys it changes:
//!
//! ```toml
//! [reorder]
//! nest_threshold = 32.0
//!
//! [keyboard.bindings]
//! "ctrl+]" = "indent"
//! ```

use blockwise_markup::LINE_BREAK;
use blockwise_model::BlockType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main editor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Editing behavior settings
    pub editor: EditorConfig,

    /// Drag-and-drop settings
    pub reorder: ReorderConfig,

    /// Debounced autosave settings
    pub autosave: AutosaveConfig,

    /// Where documents are stored
    pub storage: StorageConfig,

    /// Keyboard settings
    pub keyboard: KeyboardConfig,
}

impl Config {
    /// Loads config from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("blockwise").join("config.toml"))
    }

    /// Writes the config to `path`, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Editing behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Run the autoformatter when a block's content is committed
    pub autoformat: bool,

    /// Markup spliced in by a soft break
    pub soft_break_marker: String,

    /// Types whose split-off successor starts as a paragraph
    pub degrade_on_split: Vec<BlockType>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autoformat: true,
            soft_break_marker: LINE_BREAK.to_string(),
            degrade_on_split: vec![BlockType::Task, BlockType::Quote, BlockType::Toggle],
        }
    }
}

impl EditorConfig {
    /// Returns the type of the block created when splitting a `kind` block.
    pub fn split_successor(&self, kind: BlockType) -> BlockType {
        if self.degrade_on_split.contains(&kind) {
            BlockType::Paragraph
        } else {
            kind
        }
    }
}

/// Drag-and-drop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    /// Horizontal pointer offset (px) that switches between nesting levels
    pub nest_threshold: f32,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            nest_threshold: 24.0,
        }
    }
}

/// Autosave configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,

    /// Quiet period after the last edit before saving (ms)
    pub delay_ms: u64,
}

impl AutosaveConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 1000,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding document JSON files (defaults to the data dir)
    pub directory: Option<PathBuf>,
}

impl StorageConfig {
    /// Resolves the storage directory.
    pub fn resolve_directory(&self) -> Result<PathBuf, ConfigError> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => {
                let data_dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
                Ok(data_dir.join("blockwise"))
            }
        }
    }
}

/// Keyboard configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Custom key bindings: key string to intent name
    pub bindings: HashMap<String, String>,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config directory not found")]
    NoConfigDir,

    #[error("Data directory not found")]
    NoDataDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.editor.autoformat);
        assert_eq!(config.editor.soft_break_marker, "<br>");
        assert_eq!(config.reorder.nest_threshold, 24.0);
        assert_eq!(config.autosave.delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.editor.degrade_on_split, config.editor.degrade_on_split);
        assert_eq!(parsed.autosave.delay_ms, config.autosave.delay_ms);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [reorder]
            nest_threshold = 40.0

            [editor]
            degrade_on_split = ["task"]

            [keyboard.bindings]
            "ctrl+]" = "indent"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.reorder.nest_threshold, 40.0);
        assert!(parsed.editor.autoformat);
        assert_eq!(parsed.editor.split_successor(BlockType::Quote), BlockType::Quote);
        assert_eq!(parsed.editor.split_successor(BlockType::Task), BlockType::Paragraph);
        assert_eq!(parsed.keyboard.bindings["ctrl+]"], "indent");
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.autosave.enabled = false;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(!loaded.autosave.enabled);
    }
}
