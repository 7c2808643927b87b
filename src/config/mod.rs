//! Configuration module for the bridge
//!
//! The configuration lists the items to create and the links that bind
//! records to element paths of those items. It is stored as TOML:
//!
//! ```toml
//! debug = 0
//!
//! [[item]]
//! name = "ns=2;s=Pump"
//! subscription = "fast"
//!
//! [[link]]
//! record = "PUMP:CODE"
//! item = "ns=2;s=Pump"
//! element = "status.code"
//! debug = 2
//! ```
//!
//! # Example
//!
//! ```ignore
//! use uabridge::config::BridgeConfig;
//!
//! let config = BridgeConfig::load("bridge.toml")?;
//! config.validate()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{BridgeError, Result};
use crate::tree::ElementPath;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default debug verbosity
pub const DEFAULT_DEBUG_LEVEL: i32 = 0;

/// Complete bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Debug verbosity for items and records that do not set their own
    pub debug: i32,

    #[serde(rename = "item")]
    pub items: Vec<ItemConfig>,

    #[serde(rename = "link")]
    pub links: Vec<LinkConfig>,
}

impl BridgeConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BridgeError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(format!("Failed to serialize configuration: {}", e)))
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read configuration {:?}: {}", path, e))
        })?;
        Self::from_toml_str(&content)
            .map_err(|e| e.with_context(format!("{}", path.display())))
    }

    /// Save the configuration to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BridgeError::Config(format!("Failed to create configuration directory: {}", e))
                })?;
            }
        }

        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| {
            BridgeError::Config(format!("Failed to write configuration {:?}: {}", path, e))
        })
    }

    /// Check references and paths before anything is built
    pub fn validate(&self) -> Result<()> {
        let mut items = HashSet::new();
        for item in &self.items {
            if item.name.is_empty() {
                return Err(BridgeError::Config("Item with empty name".to_string()));
            }
            if !items.insert(item.name.as_str()) {
                return Err(BridgeError::Config(format!(
                    "Duplicate item '{}'",
                    item.name
                )));
            }
        }

        let mut records = HashSet::new();
        for link in &self.links {
            if !records.insert(link.record.as_str()) {
                return Err(BridgeError::Config(format!(
                    "Duplicate record '{}'",
                    link.record
                )));
            }
            if !items.contains(link.item.as_str()) {
                return Err(BridgeError::UnknownItem(link.item.clone())
                    .with_context(format!("record '{}'", link.record)));
            }
            ElementPath::parse(&link.element)
                .map_err(|e| e.with_context(format!("record '{}'", link.record)))?;
        }
        Ok(())
    }

    /// Effective debug level of an item
    pub fn item_debug(&self, item: &ItemConfig) -> i32 {
        item.debug.unwrap_or(self.debug)
    }

    /// Effective debug level of a record
    pub fn link_debug(&self, link: &LinkConfig) -> i32 {
        link.debug.unwrap_or(self.debug)
    }
}
