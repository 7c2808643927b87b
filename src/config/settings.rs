//! Item and link settings
//!
//! - [`ItemConfig`] - one remote value, optionally attached to a subscription
//! - [`LinkConfig`] - one record bound to an element path of an item
//!
//! Debug levels left unset inherit the top level `debug` of the
//! configuration file.

use serde::{Deserialize, Serialize};

/// Settings of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemConfig {
    /// Remote address of the item, e.g. `ns=2;s=Pump`
    pub name: String,

    /// Name of the subscription delivering spontaneous updates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    /// Debug verbosity for this item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<i32>,
}

impl ItemConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscription: None,
            debug: None,
        }
    }

    pub fn with_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.subscription = Some(subscription.into());
        self
    }

    pub fn with_debug(mut self, debug: i32) -> Self {
        self.debug = Some(debug);
        self
    }
}

/// Binding of a record to an element of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Record name, unique across the configuration
    pub record: String,

    /// Name of the item
    pub item: String,

    /// Element path inside the item value; empty for the whole value
    #[serde(default)]
    pub element: String,

    /// Debug verbosity for this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<i32>,
}

impl LinkConfig {
    pub fn new(record: impl Into<String>, item: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            item: item.into(),
            element: element.into(),
            debug: None,
        }
    }

    pub fn with_debug(mut self, debug: i32) -> Self {
        self.debug = Some(debug);
        self
    }
}
