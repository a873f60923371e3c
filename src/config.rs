use crate::error::{Error, Result};
use crate::openapi::Info;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration of one generation run, usually read from a YAML file.
///
/// Every field has a default, so an empty file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Document `info` section
    pub info: Info,
    /// Annotations identifying endpoint classes
    pub endpoint_annotations: Vec<String>,
    /// Annotations identifying supertypes whose methods are exposed on endpoints
    pub exposed_annotations: Vec<String>,
    /// Explicit endpoint classes; when empty, annotated classes are discovered
    pub roots: Vec<String>,
    /// Metadata locations: dump files, source files or directories
    pub class_path: Vec<PathBuf>,
    /// Plugins to run, each with its own configuration
    pub plugins: Vec<PluginEntry>,
}

/// A plugin reference with its configuration object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "serde_yaml::Value::is_null")]
    pub config: serde_yaml::Value,
}

impl PluginEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: serde_yaml::Value::Null,
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            info: Info::default(),
            endpoint_annotations: vec!["Endpoint".to_string(), "BrowserCallable".to_string()],
            exposed_annotations: vec!["EndpointExposed".to_string()],
            roots: Vec::new(),
            class_path: Vec::new(),
            plugins: crate::plugin::BUILTIN_PLUGINS
                .iter()
                .map(|name| PluginEntry::new(*name))
                .collect(),
        }
    }
}

impl ParserConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            Error::Configuration(message) => {
                Error::Configuration(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }
}
