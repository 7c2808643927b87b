//! Building element chains from element paths.

use super::element::{ElementKind, NodeData};
use super::{ElementId, ElementPath, Item};
use crate::connector::{LeafBinding, RecordConnector};
use crate::error::{BridgeError, Result};
use std::sync::Arc;

impl Item {
    /// Bind `connector` to the leaf at `path`, creating missing nodes.
    ///
    /// Existing prefixes are reused. Linking the same connector to the same
    /// path again is a no-op and returns the existing leaf.
    pub fn add_element_chain(
        &mut self,
        connector: &Arc<RecordConnector>,
        path: &str,
    ) -> Result<ElementId> {
        let path = ElementPath::parse(path)?;

        if let Some(binding) = connector.binding() {
            if binding.item == self.name() && binding.path == path {
                return Ok(binding.element);
            }
            return Err(BridgeError::AlreadyLinked {
                record: connector.name().to_string(),
                item: binding.item.clone(),
                path: binding.path.to_string(),
            });
        }

        let conflict = |reason: String| BridgeError::StructureConflict {
            path: path.to_string(),
            reason,
        };

        // Walk the existing prefix
        let segments = path.segments();
        let mut current = ElementId::ROOT;
        let mut depth = 0;
        while depth < segments.len() {
            if let ElementKind::Leaf(existing) = &self.elements[current.index()].kind {
                return Err(conflict(format!(
                    "'{}' is a leaf bound to record '{}'",
                    path.prefix(depth),
                    existing.name()
                )));
            }
            match self.find_child(current, &segments[depth]) {
                Some(child) => {
                    current = child;
                    depth += 1;
                }
                None => break,
            }
        }

        if depth == segments.len() {
            return self.bind_existing(current, connector, &path);
        }

        // A node is either a structure or an array
        let next_is_index = segments[depth].is_index();
        let mixed = self.children(current).iter().any(|&c| {
            self.elements[c.index()]
                .key
                .as_ref()
                .is_some_and(|key| key.is_index() != next_is_index)
        });
        if mixed {
            let holds = if next_is_index { "fields" } else { "indices" };
            return Err(conflict(format!(
                "'{}' already holds {} and cannot take '{}'",
                path.prefix(depth),
                holds,
                segments[depth]
            )));
        }

        // Handles are assigned sequentially, so the new leaf's id is known
        // before any element is created.
        let leaf = ElementId((self.elements.len() + segments.len() - depth - 1) as u32);
        connector.bind(LeafBinding {
            item: self.name().to_string(),
            element: leaf,
            path: path.clone(),
        })?;

        for (i, segment) in segments.iter().enumerate().skip(depth) {
            let kind = if i + 1 == segments.len() {
                ElementKind::Leaf(Arc::clone(connector))
            } else {
                ElementKind::Node(NodeData::default())
            };
            current = self.push_child(current, segment.clone(), kind);
        }
        debug_assert_eq!(current, leaf);

        if self.debug() > 0 {
            tracing::debug!(
                "{}: linked '{}' to record {}",
                self.name(),
                path,
                connector.name()
            );
        }
        Ok(current)
    }

    /// The whole path exists already and ends at `id`.
    fn bind_existing(
        &mut self,
        id: ElementId,
        connector: &Arc<RecordConnector>,
        path: &ElementPath,
    ) -> Result<ElementId> {
        let empty_root = match &self.elements[id.index()].kind {
            ElementKind::Leaf(existing) => {
                return Err(BridgeError::DuplicateBinding {
                    item: self.name().to_string(),
                    path: path.to_string(),
                    existing: existing.name().to_string(),
                })
            }
            ElementKind::Node(node) => id.is_root() && node.children.is_empty(),
        };
        if !empty_root {
            return Err(BridgeError::StructureConflict {
                path: path.to_string(),
                reason: "element has children and cannot be a leaf".to_string(),
            });
        }

        connector.bind(LeafBinding {
            item: self.name().to_string(),
            element: id,
            path: path.clone(),
        })?;
        self.elements[id.index()].kind = ElementKind::Leaf(Arc::clone(connector));
        Ok(id)
    }
}

/// Link `connector` to the element at `path` of `item`.
pub fn add_element_chain(
    item: &mut Item,
    connector: &Arc<RecordConnector>,
    path: &str,
) -> Result<ElementId> {
    item.add_element_chain(connector, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{processing_channel, ProcessRequest};
    use crate::tree::Segment;
    use crossbeam_channel::Receiver;

    struct Fixture {
        tx: crossbeam_channel::Sender<ProcessRequest>,
        _rx: Receiver<ProcessRequest>,
    }

    impl Fixture {
        fn new() -> Self {
            let (tx, rx) = processing_channel();
            Self { tx, _rx: rx }
        }

        fn connector(&self, name: &str) -> Arc<RecordConnector> {
            Arc::new(RecordConnector::new(name, 0, Arc::new(self.tx.clone())))
        }
    }

    #[test]
    fn test_chain_creates_nodes_and_leaf() {
        let fx = Fixture::new();
        let mut item = Item::new("ns=2;s=Pump", 0);
        let code = fx.connector("rec:code");
        let id = item.add_element_chain(&code, "status.code").unwrap();

        assert_eq!(item.len(), 3);
        assert!(item.get(id).unwrap().is_leaf());
        assert_eq!(item.path_of(id).to_string(), "status.code");
        let binding = code.binding().unwrap();
        assert_eq!(binding.element, id);
        assert_eq!(binding.item, "ns=2;s=Pump");
    }

    #[test]
    fn test_chain_reuses_prefix() {
        let fx = Fixture::new();
        let mut item = Item::new("X", 0);
        item.add_element_chain(&fx.connector("a"), "s.a").unwrap();
        item.add_element_chain(&fx.connector("b"), "s.b").unwrap();
        item.add_element_chain(&fx.connector("c"), "c").unwrap();

        // root, s, s.a, s.b, c
        assert_eq!(item.len(), 5);
        let s = item
            .find_child(ElementId::ROOT, &Segment::Field("s".into()))
            .unwrap();
        assert_eq!(item.children(s).len(), 2);
        assert_eq!(item.children(ElementId::ROOT).len(), 2);
    }

    #[test]
    fn test_chain_idempotent() {
        let fx = Fixture::new();
        let mut item = Item::new("X", 0);
        let a = fx.connector("a");
        let first = item.add_element_chain(&a, "s[2].v").unwrap();
        let len = item.len();
        let second = item.add_element_chain(&a, "s[2].v").unwrap();
        assert_eq!(first, second);
        assert_eq!(item.len(), len);
    }

    #[test]
    fn test_duplicate_binding() {
        let fx = Fixture::new();
        let mut item = Item::new("X", 0);
        item.add_element_chain(&fx.connector("a"), "s.v").unwrap();
        let b = fx.connector("b");
        match item.add_element_chain(&b, "s.v") {
            Err(BridgeError::DuplicateBinding { existing, .. }) => assert_eq!(existing, "a"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!b.is_linked());
    }

    #[test]
    fn test_connector_linked_elsewhere() {
        let fx = Fixture::new();
        let mut item = Item::new("X", 0);
        let a = fx.connector("a");
        item.add_element_chain(&a, "s.v").unwrap();
        let len = item.len();
        assert!(matches!(
            item.add_element_chain(&a, "s.w"),
            Err(BridgeError::AlreadyLinked { .. })
        ));
        assert_eq!(item.len(), len);
    }

    #[test]
    fn test_structure_conflicts() {
        let fx = Fixture::new();
        let mut item = Item::new("X", 0);
        item.add_element_chain(&fx.connector("a"), "s.v").unwrap();

        // through a leaf
        assert!(matches!(
            item.add_element_chain(&fx.connector("b"), "s.v.deeper"),
            Err(BridgeError::StructureConflict { .. })
        ));
        // ending on a node
        assert!(matches!(
            item.add_element_chain(&fx.connector("c"), "s"),
            Err(BridgeError::StructureConflict { .. })
        ));
        // root with children
        assert!(matches!(
            item.add_element_chain(&fx.connector("d"), ""),
            Err(BridgeError::StructureConflict { .. })
        ));
    }

    #[test]
    fn test_fields_and_indices_do_not_mix() {
        let fx = Fixture::new();
        let mut item = Item::new("X", 0);
        item.add_element_chain(&fx.connector("a"), "a.x").unwrap();
        item.add_element_chain(&fx.connector("b"), "list[0]").unwrap();
        let len = item.len();

        let index = fx.connector("c");
        assert!(matches!(
            item.add_element_chain(&index, "a[0]"),
            Err(BridgeError::StructureConflict { .. })
        ));
        assert!(!index.is_linked());
        assert!(matches!(
            item.add_element_chain(&fx.connector("d"), "list.y"),
            Err(BridgeError::StructureConflict { .. })
        ));
        assert!(matches!(
            item.add_element_chain(&fx.connector("e"), "[3]"),
            Err(BridgeError::StructureConflict { .. })
        ));
        assert_eq!(item.len(), len);

        // same kind under the same node is fine
        item.add_element_chain(&fx.connector("f"), "list[1].y").unwrap();
    }

    #[test]
    fn test_root_leaf() {
        let fx = Fixture::new();
        let mut item = Item::new("X", 0);
        let whole = fx.connector("whole");
        let id = item.add_element_chain(&whole, "").unwrap();
        assert!(id.is_root());
        assert!(item.root().is_leaf());
        assert!(matches!(
            item.add_element_chain(&fx.connector("other"), "a"),
            Err(BridgeError::StructureConflict { .. })
        ));
    }

    #[test]
    fn test_invalid_path() {
        let fx = Fixture::new();
        let mut item = Item::new("X", 0);
        assert!(matches!(
            add_element_chain(&mut item, &fx.connector("a"), "a..b"),
            Err(BridgeError::InvalidPath { .. })
        ));
        assert_eq!(item.len(), 1);
    }
}
