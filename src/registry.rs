//! Composition root
//!
//! Items and connectors are created once at startup by a [`RegistryBuilder`]
//! and frozen into a [`Registry`]. Building needs `&mut Item`, so chains
//! cannot be extended once items are shared with the delivery side.

use crate::config::BridgeConfig;
use crate::connector::{ProcessScheduler, RecordConnector};
use crate::error::{BridgeError, Result, ResultExt};
use crate::tree::{ElementId, Item};
use crate::types::ProcessReason;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Startup phase: items are created and linked
pub struct RegistryBuilder {
    items: Vec<Item>,
    item_index: HashMap<String, usize>,
    connectors: HashMap<String, Arc<RecordConnector>>,
    scheduler: Arc<dyn ProcessScheduler>,
}

impl RegistryBuilder {
    pub fn new(scheduler: Arc<dyn ProcessScheduler>) -> Self {
        Self {
            items: Vec::new(),
            item_index: HashMap::new(),
            connectors: HashMap::new(),
            scheduler,
        }
    }

    /// Builder with every item and link of `config`
    pub fn from_config(config: &BridgeConfig, scheduler: Arc<dyn ProcessScheduler>) -> Result<Self> {
        config.validate()?;
        let mut builder = Self::new(scheduler);
        for item in &config.items {
            builder.add_item(&item.name, item.subscription.as_deref(), config.item_debug(item))?;
        }
        for link in &config.links {
            builder.link(&link.record, &link.item, &link.element, config.link_debug(link))?;
        }
        tracing::info!(
            "Configured {} items with {} linked records",
            builder.items.len(),
            builder.connectors.len()
        );
        Ok(builder)
    }

    /// Create an item
    pub fn add_item(&mut self, name: &str, subscription: Option<&str>, debug: i32) -> Result<()> {
        if self.item_index.contains_key(name) {
            return Err(BridgeError::Config(format!("Duplicate item '{}'", name)));
        }
        let mut item = Item::new(name, debug);
        if let Some(sub) = subscription {
            item = item.with_subscription(sub);
        }
        self.item_index.insert(name.to_string(), self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Create a record connector and bind it to `path` of `item`
    pub fn link(
        &mut self,
        record: &str,
        item: &str,
        path: &str,
        debug: i32,
    ) -> Result<Arc<RecordConnector>> {
        if self.connectors.contains_key(record) {
            return Err(BridgeError::Config(format!("Duplicate record '{}'", record)));
        }
        let index = *self
            .item_index
            .get(item)
            .ok_or_else(|| BridgeError::UnknownItem(item.to_string()))?;

        let connector = Arc::new(RecordConnector::new(record, debug, Arc::clone(&self.scheduler)));
        self.items[index]
            .add_element_chain(&connector, path)
            .with_context(|| format!("linking record '{}'", record))?;
        self.connectors.insert(record.to_string(), Arc::clone(&connector));
        Ok(connector)
    }

    /// Freeze the trees and share them
    pub fn build(self) -> Registry {
        Registry {
            items: self.items.into_iter().map(Arc::new).collect(),
            item_index: self.item_index,
            connectors: self.connectors,
        }
    }
}

/// Running phase: read-only lookups
#[derive(Debug)]
pub struct Registry {
    items: Vec<Arc<Item>>,
    item_index: HashMap<String, usize>,
    connectors: HashMap<String, Arc<RecordConnector>>,
}

impl Registry {
    pub fn item(&self, name: &str) -> Option<&Arc<Item>> {
        self.item_index.get(name).map(|&i| &self.items[i])
    }

    pub fn connector(&self, record: &str) -> Option<&Arc<RecordConnector>> {
        self.connectors.get(record)
    }

    /// Items in creation order
    pub fn items(&self) -> impl Iterator<Item = &Arc<Item>> {
        self.items.iter()
    }

    /// Items delivered by the subscription `name`
    pub fn subscription_items<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Arc<Item>> + 'a {
        self.items
            .iter()
            .filter(move |item| item.subscription() == Some(name))
    }

    /// Item and leaf a record is bound to
    pub fn element_of(&self, record: &str) -> Result<(&Arc<Item>, ElementId)> {
        let connector = self
            .connector(record)
            .ok_or_else(|| BridgeError::Config(format!("Unknown record '{}'", record)))?;
        let binding = connector
            .binding()
            .ok_or_else(|| BridgeError::NotLinked(record.to_string()))?;
        let item = self
            .item(&binding.item)
            .ok_or_else(|| BridgeError::UnknownItem(binding.item.clone()))?;
        Ok((item, binding.element))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Dump of all items
    pub fn show(&self, level: i32) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} items, {} records",
            self.items.len(),
            self.connectors.len()
        );
        for item in &self.items {
            out.push_str(&item.show(level));
        }
        out
    }

    /// Disconnect every consumer and release the trees
    pub fn shutdown(self) {
        tracing::info!("Shutting down {} items", self.items.len());
        for item in &self.items {
            item.set_incoming(None, ProcessReason::ConnectionLost);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ItemConfig, LinkConfig};
    use crate::connector::{processing_channel, MockProcessScheduler};
    use crate::types::{DataStatus, DataValue, Structure};

    fn quiet_scheduler() -> Arc<dyn ProcessScheduler> {
        let mut scheduler = MockProcessScheduler::new();
        scheduler.expect_schedule().return_const(());
        Arc::new(scheduler)
    }

    fn sample_config() -> BridgeConfig {
        BridgeConfig {
            debug: 0,
            items: vec![
                ItemConfig::new("ns=2;s=Pump").with_subscription("fast"),
                ItemConfig::new("ns=2;s=Valve"),
            ],
            links: vec![
                LinkConfig::new("PUMP:CODE", "ns=2;s=Pump", "status.code"),
                LinkConfig::new("PUMP:SPEED", "ns=2;s=Pump", "speed"),
                LinkConfig::new("VALVE", "ns=2;s=Valve", ""),
            ],
        }
    }

    #[test]
    fn test_from_config() {
        let registry = RegistryBuilder::from_config(&sample_config(), quiet_scheduler())
            .unwrap()
            .build();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.item("ns=2;s=Pump").unwrap().connectors().count(), 2);
        assert!(registry.item("ns=2;s=Valve").unwrap().root().is_leaf());
        assert_eq!(registry.subscription_items("fast").count(), 1);

        let (item, id) = registry.element_of("PUMP:SPEED").unwrap();
        assert_eq!(item.name(), "ns=2;s=Pump");
        assert_eq!(item.path_of(id).to_string(), "speed");
    }

    #[test]
    fn test_link_errors() {
        let mut builder = RegistryBuilder::new(quiet_scheduler());
        builder.add_item("A", None, 0).unwrap();
        assert!(builder.add_item("A", None, 0).is_err());

        builder.link("R1", "A", "x", 0).unwrap();
        assert!(matches!(
            builder.link("R1", "A", "y", 0),
            Err(BridgeError::Config(_))
        ));
        assert!(matches!(
            builder.link("R2", "B", "x", 0),
            Err(BridgeError::UnknownItem(_))
        ));
        let err = builder.link("R3", "A", "x", 0).unwrap_err();
        assert!(matches!(err.root_cause(), BridgeError::DuplicateBinding { .. }));
        // failed links leave no connector behind
        assert_eq!(builder.build().connectors.len(), 1);
    }

    #[test]
    fn test_show_all() {
        let registry = RegistryBuilder::from_config(&sample_config(), quiet_scheduler())
            .unwrap()
            .build();
        let dump = registry.show(1);
        assert!(dump.starts_with("2 items, 3 records"));
        assert!(dump.contains("item ns=2;s=Pump subscription=fast"));
        assert!(dump.contains("item ns=2;s=Valve subscription=-"));
    }

    #[test]
    fn test_shutdown_disconnects_consumers() {
        let (tx, rx) = processing_channel();
        let registry = RegistryBuilder::from_config(&sample_config(), Arc::new(tx))
            .unwrap()
            .build();
        let pump = Arc::clone(registry.item("ns=2;s=Pump").unwrap());
        let code = Arc::clone(registry.connector("PUMP:CODE").unwrap());
        pump.set_incoming(
            Some(&DataValue::new(
                Structure::new()
                    .with_field("status", Structure::new().with_field("code", 1i32))
                    .with_field("speed", 2.0f64),
            )),
            ProcessReason::FreshData,
        );
        registry.shutdown();

        assert_eq!(code.lock().read_status(), DataStatus::Disconnected);
        assert_eq!(code.lock().reason(), ProcessReason::ConnectionLost);
        // one coalesced request per record
        assert_eq!(rx.try_iter().count(), 3);
    }
}
