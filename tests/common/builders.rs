//! Test data builders for items, links and structured values

use crossbeam_channel::Receiver;
use std::sync::Arc;
use uabridge::connector::processing_channel;
use uabridge::{Item, ProcessRequest, RecordConnector, Structure, Variant};

/// Builder for an item with linked records
pub struct ItemBuilder {
    name: String,
    links: Vec<(String, String)>,
}

/// Item built by [`ItemBuilder`], with its connectors and request queue
pub struct LinkedItem {
    pub item: Arc<Item>,
    pub connectors: Vec<Arc<RecordConnector>>,
    pub requests: Receiver<ProcessRequest>,
}

impl LinkedItem {
    pub fn connector(&self, record: &str) -> &Arc<RecordConnector> {
        self.connectors
            .iter()
            .find(|c| c.name() == record)
            .unwrap_or_else(|| panic!("no record {}", record))
    }

    /// Drain the queue, returning the record names in request order
    pub fn drain(&self) -> Vec<String> {
        self.requests.try_iter().map(|r| r.record).collect()
    }
}

impl ItemBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            links: Vec::new(),
        }
    }

    pub fn link(mut self, record: &str, path: &str) -> Self {
        self.links.push((record.to_string(), path.to_string()));
        self
    }

    pub fn build(self) -> LinkedItem {
        let (tx, rx) = processing_channel();
        let tx = Arc::new(tx);
        let mut item = Item::new(self.name, 0);
        let mut connectors = Vec::new();
        for (record, path) in self.links {
            let connector = Arc::new(RecordConnector::new(record, 0, tx.clone()));
            item.add_element_chain(&connector, &path)
                .unwrap_or_else(|e| panic!("linking {}: {}", path, e));
            connectors.push(connector);
        }
        LinkedItem {
            item: Arc::new(item),
            connectors,
            requests: rx,
        }
    }
}

/// Builder for structured values
#[derive(Default)]
pub struct StructureBuilder {
    inner: Structure,
}

impl StructureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: impl Into<Variant>) -> Self {
        self.inner = self.inner.with_field(name, value);
        self
    }

    pub fn build(self) -> Variant {
        Variant::Structure(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_builder() {
        let v = StructureBuilder::new().field("a", 1i32).field("b", "x").build();
        let s = v.as_structure().unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.field("b"), Some(&Variant::String("x".into())));
    }
}
