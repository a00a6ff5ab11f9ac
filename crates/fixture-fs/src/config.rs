//! Format-agnostic configuration loading

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::{Error, Result, io};

/// Format-agnostic configuration store.
///
/// Detects the format from the file extension:
/// - `.toml` -> TOML
/// - `.json` -> JSON
/// - `.yaml`, `.yml` -> YAML
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Load and deserialize a configuration file.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = io::read_text(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        self.parse(path, &extension, &content)
    }

    /// Deserialize already-loaded content in the format named by `extension`.
    pub fn parse<T: DeserializeOwned>(
        &self,
        path: &Path,
        extension: &str,
        content: &str,
    ) -> Result<T> {
        match extension {
            "toml" => toml::from_str(content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "TOML".into(),
                message: e.to_string(),
            }),
            "json" => serde_json::from_str(content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "JSON".into(),
                message: e.to_string(),
            }),
            "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                format: "YAML".into(),
                message: e.to_string(),
            }),
            _ => Err(Error::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }
}
