//! Elements of the data element tree.

use super::{ElementId, Segment};
use crate::connector::RecordConnector;
use crate::types::Structure;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// A structure node: has children, no value
#[derive(Debug, Default)]
pub struct NodeData {
    pub(crate) children: Vec<ElementId>,
    /// Field name -> position in the incoming structure, built on first
    /// decomposition and never rebuilt
    field_map: OnceLock<HashMap<String, usize>>,
}

impl NodeData {
    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    /// Whether the field position map has been built
    pub fn is_mapped(&self) -> bool {
        self.field_map.get().is_some()
    }

    /// Position of field `name` inside `structure`
    ///
    /// The first structure seen decides the map. Later structures whose
    /// layout differs are matched by name.
    pub(crate) fn field_position(&self, structure: &Structure, name: &str) -> Option<usize> {
        let map = self.field_map.get_or_init(|| {
            let mut map = HashMap::with_capacity(structure.fields.len());
            for (pos, field) in structure.fields.iter().enumerate() {
                map.entry(field.name.clone()).or_insert(pos);
            }
            map
        });

        match map.get(name) {
            Some(&pos) if structure.fields.get(pos).is_some_and(|f| f.name == name) => Some(pos),
            _ => structure.fields.iter().position(|f| f.name == name),
        }
    }
}

/// What an element is
#[derive(Debug)]
pub enum ElementKind {
    Node(NodeData),
    /// Terminal element, bound to exactly one record connector
    Leaf(Arc<RecordConnector>),
}

/// One element of an item's tree
#[derive(Debug)]
pub struct DataElement {
    /// Field name or array index inside the parent; `None` for the root
    pub(crate) key: Option<Segment>,
    /// Back-handle, only used while chains are built and for diagnostics
    pub(crate) parent: ElementId,
    pub(crate) kind: ElementKind,
}

impl DataElement {
    pub(crate) fn root() -> Self {
        Self {
            key: None,
            parent: ElementId::INVALID,
            kind: ElementKind::Node(NodeData::default()),
        }
    }

    pub fn key(&self) -> Option<&Segment> {
        self.key.as_ref()
    }

    pub fn parent(&self) -> ElementId {
        self.parent
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, ElementKind::Leaf(_))
    }

    pub fn as_node(&self) -> Option<&NodeData> {
        match &self.kind {
            ElementKind::Node(node) => Some(node),
            ElementKind::Leaf(_) => None,
        }
    }

    pub fn connector(&self) -> Option<&Arc<RecordConnector>> {
        match &self.kind {
            ElementKind::Leaf(connector) => Some(connector),
            ElementKind::Node(_) => None,
        }
    }

    /// Display name: the field name, `[i]` for array slots, empty for the root
    pub fn name(&self) -> String {
        self.key.as_ref().map(ToString::to_string).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_map_built_once() {
        let node = NodeData::default();
        let first = Structure::new().with_field("a", 1i32).with_field("b", 2i32);
        assert!(!node.is_mapped());
        assert_eq!(node.field_position(&first, "b"), Some(1));
        assert!(node.is_mapped());

        // reordered layout is still matched by name
        let reordered = Structure::new().with_field("b", 2i32).with_field("a", 1i32);
        assert_eq!(node.field_position(&reordered, "b"), Some(0));
        assert_eq!(node.field_position(&reordered, "missing"), None);
    }

    #[test]
    fn test_field_added_after_mapping() {
        let node = NodeData::default();
        let first = Structure::new().with_field("a", 1i32);
        assert_eq!(node.field_position(&first, "a"), Some(0));

        let wider = Structure::new().with_field("a", 1i32).with_field("late", 5i32);
        assert_eq!(node.field_position(&wider, "late"), Some(1));
    }

    #[test]
    fn test_root_element() {
        let root = DataElement::root();
        assert!(!root.is_leaf());
        assert_eq!(root.name(), "");
        assert!(!root.parent().is_valid());
        assert!(root.as_node().unwrap().children().is_empty());
    }
}
