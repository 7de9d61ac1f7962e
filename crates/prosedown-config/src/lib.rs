//! TOML-backed editor profiles.
//!
//! A profile names a capability preset (`article` or `message`) and may
//! override the enabled node/mark kind lists, the tables flag and the
//! maximum heading level. The result is one [`Capabilities`] value the
//! engine derives everything else from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use prosedown_engine::{Capabilities, MarkKind, NodeKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Unknown schema profile `{0}` (expected `article` or `message`)")]
    UnknownProfile(String),

    #[error("Unknown node kind `{0}` in config")]
    UnknownNodeKind(String),

    #[error("Unknown mark kind `{0}` in config")]
    UnknownMarkKind(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schema: SchemaConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Capability preset the overrides below start from.
    pub profile: String,
    /// Replaces the enabled node kinds when present.
    pub nodes: Option<Vec<String>>,
    /// Replaces the enabled mark kinds when present.
    pub marks: Option<Vec<String>>,
    pub tables: Option<bool>,
    pub max_heading_level: Option<u8>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        SchemaConfig {
            profile: "article".to_string(),
            nodes: None,
            marks: None,
            tables: None,
            max_heading_level: None,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        Ok(Some(config))
    }

    /// Resolves the configured profile and overrides into a capability set.
    pub fn capabilities(&self) -> Result<Capabilities, ConfigError> {
        let mut caps = profile_capabilities(&self.schema.profile)?;

        if let Some(nodes) = &self.schema.nodes {
            let mut set = BTreeSet::new();
            for name in nodes {
                let kind = NodeKind::from_name(name)
                    .ok_or_else(|| ConfigError::UnknownNodeKind(name.clone()))?;
                set.insert(kind);
            }
            caps.nodes = set;
        }
        if let Some(marks) = &self.schema.marks {
            let mut set = BTreeSet::new();
            for name in marks {
                let kind = MarkKind::from_name(name)
                    .ok_or_else(|| ConfigError::UnknownMarkKind(name.clone()))?;
                set.insert(kind);
            }
            caps.marks = set;
        }
        if let Some(tables) = self.schema.tables {
            caps.tables = tables;
        }
        if let Some(max) = self.schema.max_heading_level {
            caps.max_heading_level = max;
        }
        Ok(caps)
    }
}

/// Looks up a capability preset by name.
pub fn profile_capabilities(profile: &str) -> Result<Capabilities, ConfigError> {
    match profile {
        "article" => Ok(Capabilities::article()),
        "message" => Ok(Capabilities::message()),
        other => Err(ConfigError::UnknownProfile(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_is_none() {
        let loaded = Config::load_from_path("/nonexistent/prosedown.toml").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn default_config_is_article() {
        let config = Config::default();
        assert_eq!(config.capabilities().unwrap(), Capabilities::article());
    }

    #[test]
    fn profile_and_overrides_load() {
        let file = write_config(
            "[schema]\nprofile = \"message\"\ntables = true\nmax_heading_level = 3\n",
        );
        let config = Config::load_from_path(file.path()).unwrap().unwrap();
        let caps = config.capabilities().unwrap();
        assert!(caps.tables);
        assert_eq!(caps.max_heading_level, 3);
        assert!(!caps.marks.contains(&MarkKind::Superscript));
    }

    #[test]
    fn explicit_kind_lists_replace_preset() {
        let file = write_config(
            "[schema]\nprofile = \"article\"\n\
             nodes = [\"paragraph\", \"blockquote\"]\nmarks = [\"strong\"]\n",
        );
        let config = Config::load_from_path(file.path()).unwrap().unwrap();
        let caps = config.capabilities().unwrap();
        assert!(caps.nodes.contains(&NodeKind::Blockquote));
        assert!(!caps.nodes.contains(&NodeKind::Heading));
        assert_eq!(caps.marks.len(), 1);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let file = write_config("[schema]\nnodes = [\"marquee\"]\n");
        let config = Config::load_from_path(file.path()).unwrap().unwrap();
        let err = config.capabilities().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNodeKind(name) if name == "marquee"));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let err = profile_capabilities("wiki").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(_)));
    }

    #[test]
    fn parse_error_carries_path() {
        let file = write_config("not [valid toml");
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }
}
