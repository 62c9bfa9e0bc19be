// SPDX-License-Identifier: MIT OR Apache-2.0

//! YAML file configuration source adapter.
//!
//! This module provides an adapter that reads configuration values from YAML files.

use crate::adapters::KeyValueStore;
use crate::domain::{ConfigError, ConfigKey, ConfigValue, Result};
use crate::ports::{ConfigParser, ConfigSource};
use directories::ProjectDirs;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum allowed file size for YAML configuration files (10MB)
const MAX_YAML_FILE_SIZE: u64 = 10 * 1024 * 1024;

const SOURCE_NAME: &str = "yaml-file";

/// YAML parser implementation.
///
/// Converts YAML documents into flat maps using dot notation for nested
/// mappings and numeric segments for sequence items. `null` becomes an empty
/// string.
///
/// # Examples
///
/// ```rust
/// use dynacfg::adapters::YamlParser;
/// use dynacfg::ports::ConfigParser;
///
/// let parser = YamlParser::new();
/// let yaml_content = "database:\n  pool:\n    size: 10\nhosts: [a, b]";
/// let result = parser.parse(yaml_content).unwrap();
/// assert_eq!(result.get("database.pool.size"), Some(&"10".to_string()));
/// assert_eq!(result.get("hosts.1"), Some(&"b".to_string()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct YamlParser;

impl YamlParser {
    /// Creates a new YAML parser.
    pub fn new() -> Self {
        YamlParser
    }

    fn join(prefix: &str, segment: &str) -> String {
        if prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", prefix, segment)
        }
    }

    fn flatten_yaml(value: &serde_yaml::Value, prefix: &str, result: &mut HashMap<String, String>) {
        let scalar = match value {
            serde_yaml::Value::Mapping(map) => {
                for (key, val) in map {
                    let segment = match key {
                        serde_yaml::Value::String(s) => s.clone(),
                        serde_yaml::Value::Number(n) => n.to_string(),
                        serde_yaml::Value::Bool(b) => b.to_string(),
                        _ => continue,
                    };
                    Self::flatten_yaml(val, &Self::join(prefix, &segment), result);
                }
                return;
            }
            serde_yaml::Value::Sequence(seq) => {
                for (i, val) in seq.iter().enumerate() {
                    Self::flatten_yaml(val, &Self::join(prefix, &i.to_string()), result);
                }
                return;
            }
            serde_yaml::Value::Tagged(tagged) => {
                Self::flatten_yaml(&tagged.value, prefix, result);
                return;
            }
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Null => String::new(),
        };

        // A bare scalar document has no key to live under.
        if !prefix.is_empty() {
            result.insert(prefix.to_string(), scalar);
        }
    }
}

impl ConfigParser for YamlParser {
    fn parse(&self, content: &str) -> Result<HashMap<String, String>> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to parse YAML: {}", e),
                source: Some(Box::new(e)),
            })?;

        let mut result = HashMap::new();
        Self::flatten_yaml(&value, "", &mut result);
        Ok(result)
    }

    fn supported_extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}

/// Configuration source adapter for YAML files.
///
/// `refresh` re-reads the file and swaps the parsed values in atomically. If the
/// file has become unreadable, too large or invalid, the previous values stay in
/// place and the error is returned.
///
/// # Priority
///
/// YAML files have a priority of 1, which means they are overridden by
/// environment variables (priority 2).
///
/// # Examples
///
/// ```rust,no_run
/// use dynacfg::adapters::YamlFileAdapter;
///
/// // Load from a specific file
/// let adapter = YamlFileAdapter::from_file("/path/to/config.yaml").unwrap();
///
/// // Load from default OS location
/// let adapter = YamlFileAdapter::from_default_location("myapp", "com.example").unwrap();
/// ```
#[derive(Debug)]
pub struct YamlFileAdapter {
    /// Canonical path to the YAML file
    file_path: PathBuf,
    /// Parsed configuration values
    store: KeyValueStore,
    /// YAML parser
    parser: YamlParser,
}

impl YamlFileAdapter {
    /// Creates a new YAML file adapter from a specific file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file_path = path.as_ref();

        // Canonicalize path to prevent directory traversal attacks
        let canonical_path = file_path.canonicalize().map_err(|e| ConfigError::SourceError {
            source_name: SOURCE_NAME.to_string(),
            message: format!("Invalid or inaccessible path: {}", display_name(file_path)),
            source: Some(Box::new(e)),
        })?;

        let parser = YamlParser::new();
        let values = read_values(&parser, &canonical_path)?;

        tracing::debug!(
            "Loaded {} values from {}",
            values.len(),
            display_name(&canonical_path)
        );

        Ok(Self {
            file_path: canonical_path,
            store: KeyValueStore::with_values(SOURCE_NAME, 1, values),
            parser,
        })
    }

    /// Creates a new YAML file adapter from `config.yaml` in the default
    /// OS-appropriate configuration directory.
    pub fn from_default_location(app_name: &str, qualifier: &str) -> Result<Self> {
        Self::with_filename(app_name, qualifier, "config.yaml")
    }

    /// Creates a new YAML file adapter with a custom file name in the default location.
    pub fn with_filename(app_name: &str, qualifier: &str, filename: &str) -> Result<Self> {
        let proj_dirs = ProjectDirs::from(qualifier, "", app_name)
            .ok_or_else(|| ConfigError::source_error(SOURCE_NAME, "Failed to determine project directories"))?;

        Self::from_file(proj_dirs.config_dir().join(filename))
    }

    /// Returns the path to the configuration file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn display_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
}

fn read_values(parser: &YamlParser, path: &Path) -> Result<HashMap<String, String>> {
    // Check file size before reading to prevent DoS via large files
    let metadata = fs::metadata(path).map_err(|e| ConfigError::SourceError {
        source_name: SOURCE_NAME.to_string(),
        message: format!("Failed to read file metadata: {}", display_name(path)),
        source: Some(Box::new(e)),
    })?;

    if metadata.len() > MAX_YAML_FILE_SIZE {
        return Err(ConfigError::source_error(
            SOURCE_NAME,
            format!(
                "Configuration file too large: {} bytes (max {} bytes)",
                metadata.len(),
                MAX_YAML_FILE_SIZE
            ),
        ));
    }

    let content = fs::read_to_string(path).map_err(|e| ConfigError::SourceError {
        source_name: SOURCE_NAME.to_string(),
        message: format!("Failed to read configuration file: {}", display_name(path)),
        source: Some(Box::new(e)),
    })?;

    parser.parse(&content)
}

impl ConfigSource for YamlFileAdapter {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn priority(&self) -> u8 {
        1
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.store.get(key)
    }

    fn all_keys(&self) -> Vec<ConfigKey> {
        self.store.all_keys()
    }

    fn refresh(&self) -> Result<()> {
        match read_values(&self.parser, &self.file_path) {
            Ok(values) => {
                tracing::debug!(
                    "Reloaded {} values from {}",
                    values.len(),
                    display_name(&self.file_path)
                );
                self.store.replace_all(values)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to reload {}, keeping previous values: {}",
                    display_name(&self.file_path),
                    e
                );
                Err(e)
            }
        }
    }

    fn get_properties(&self, prefix: &str) -> HashMap<String, String> {
        self.store.get_properties(prefix)
    }
}
