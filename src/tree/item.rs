//! The item: one remotely addressable value and its data element tree.
//!
//! Elements are stored in a flat `Vec` indexed by [`ElementId`]; the root is
//! always at index 0. Each element knows its key inside the parent and its
//! parent handle, nodes hold their children in insertion order.
//!
//! ```text
//! ns=2;s=Pump            (root node)
//! +-- status             (node)
//! |   +-- code           (leaf -> PUMP:CODE)
//! |   +-- text           (leaf -> PUMP:TEXT)
//! +-- speed              (leaf -> PUMP:SPEED)
//! ```
//!
//! The tree is built through `&mut Item` before any data flows (see
//! `add_element_chain`). Afterwards the item is shared as `Arc<Item>` and only
//! the leaves' per-consumer locks and the last incoming template change.

use super::element::{DataElement, ElementKind, NodeData};
use super::{ElementId, ElementPath, Segment};
use crate::connector::RecordConnector;
use crate::types::{DataValue, ProcessReason, Structure, Variant};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

/// A remote value with its tree of elements.
#[derive(Debug)]
pub struct Item {
    name: String,
    subscription: Option<String>,
    debug: i32,
    pub(crate) elements: Vec<DataElement>,
    /// Last incoming value, template for outgoing composition
    last_incoming: Mutex<Option<Variant>>,
}

impl Item {
    pub fn new(name: impl Into<String>, debug: i32) -> Self {
        Self {
            name: name.into(),
            subscription: None,
            debug,
            elements: vec![DataElement::root()],
            last_incoming: Mutex::new(None),
        }
    }

    /// Attach the item to a transport subscription
    pub fn with_subscription(mut self, subscription: impl Into<String>) -> Self {
        self.subscription = Some(subscription.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    pub fn debug(&self) -> i32 {
        self.debug
    }

    /// Number of elements, root included.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn root(&self) -> &DataElement {
        &self.elements[0]
    }

    #[inline]
    pub fn get(&self, id: ElementId) -> Option<&DataElement> {
        if id.is_valid() {
            self.elements.get(id.index())
        } else {
            None
        }
    }

    /// Children of `id` in insertion order (empty for leaves).
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.get(id)
            .and_then(DataElement::as_node)
            .map(NodeData::children)
            .unwrap_or(&[])
    }

    /// Child of `parent` with the given key.
    pub fn find_child(&self, parent: ElementId, segment: &Segment) -> Option<ElementId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.elements[c.index()].key.as_ref() == Some(segment))
    }

    /// Element at `path`.
    pub fn find(&self, path: &ElementPath) -> Option<ElementId> {
        path.segments()
            .iter()
            .try_fold(ElementId::ROOT, |id, seg| self.find_child(id, seg))
    }

    /// Full path of an element, reconstructed from the parent handles.
    pub fn path_of(&self, id: ElementId) -> ElementPath {
        let mut keys = Vec::new();
        let mut cur = id;
        while let Some(element) = self.get(cur) {
            if let Some(key) = &element.key {
                keys.push(key.clone());
            }
            cur = element.parent;
        }
        keys.into_iter()
            .rev()
            .fold(ElementPath::root(), |path, seg| path.child(seg))
    }

    /// All record connectors bound to leaves of this item.
    pub fn connectors(&self) -> impl Iterator<Item = &Arc<RecordConnector>> {
        self.elements.iter().filter_map(DataElement::connector)
    }

    /// Connectors of the leaves at or below `id`.
    fn connectors_below(&self, id: ElementId) -> Vec<&Arc<RecordConnector>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            match self.get(cur).map(|e| &e.kind) {
                Some(ElementKind::Leaf(connector)) => out.push(connector),
                Some(ElementKind::Node(node)) => stack.extend(node.children.iter().rev()),
                None => {}
            }
        }
        out
    }

    pub(crate) fn push_child(
        &mut self,
        parent: ElementId,
        key: Segment,
        kind: ElementKind,
    ) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        self.elements.push(DataElement {
            key: Some(key),
            parent,
            kind,
        });
        if let ElementKind::Node(node) = &mut self.elements[parent.index()].kind {
            node.children.push(id);
        }
        id
    }

    /// Deliver incoming data (or its absence) to the whole tree.
    ///
    /// Every leaf is updated and asked to process. `ConnectionLost` clears
    /// all incoming data, `WriteComplete` acknowledges staged writes.
    pub fn set_incoming(&self, data: Option<&DataValue>, reason: ProcessReason) {
        match (data, reason) {
            (_, ProcessReason::ConnectionLost) => self.connection_lost(),
            (_, ProcessReason::WriteComplete) => self.write_complete(true),
            (Some(data), _) => {
                if self.debug > 0 {
                    tracing::debug!(
                        "{}: {} delivery of {}",
                        self.name,
                        reason,
                        data.value.kind_name()
                    );
                }
                *self
                    .last_incoming
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(data.value.clone());
                self.decompose(ElementId::ROOT, Some(&data.value), data, reason);
            }
            (None, _) => self.request_processing(reason),
        }
    }

    fn decompose(
        &self,
        id: ElementId,
        value: Option<&Variant>,
        data: &DataValue,
        reason: ProcessReason,
    ) {
        let Some(element) = self.get(id) else {
            return;
        };
        match &element.kind {
            ElementKind::Leaf(connector) => {
                let mut state = connector.lock_state();
                match value {
                    Some(v) => {
                        state.store_incoming(v, data);
                        if connector.debug() > 1 {
                            tracing::debug!("{}: <- {} ({})", connector.name(), v, v.kind_name());
                        }
                    }
                    None => {
                        state.mark_missing();
                        if connector.debug() > 0 || self.debug > 0 {
                            tracing::warn!(
                                "{}: element '{}' missing from incoming structure",
                                self.name,
                                self.path_of(id)
                            );
                        }
                    }
                }
                connector.notify(state, reason);
            }
            ElementKind::Node(node) => {
                for &child in &node.children {
                    let child_value = value.and_then(|v| self.child_value(node, child, v));
                    self.decompose(child, child_value, data, reason);
                }
            }
        }
    }

    fn child_value<'a>(
        &self,
        node: &NodeData,
        child: ElementId,
        value: &'a Variant,
    ) -> Option<&'a Variant> {
        match (&self.elements[child.index()].key, value) {
            (Some(Segment::Field(name)), Variant::Structure(s)) => node
                .field_position(s, name)
                .map(|pos| &s.fields[pos].value),
            (Some(Segment::Index(i)), Variant::Array(elements)) => elements.get(*i),
            _ => None,
        }
    }

    /// Mark every leaf disconnected and notify its consumer.
    pub fn connection_lost(&self) {
        if self.debug > 0 {
            tracing::info!("{}: connection lost", self.name);
        }
        for connector in self.connectors() {
            let mut state = connector.lock_state();
            state.mark_disconnected();
            connector.notify(state, ProcessReason::ConnectionLost);
        }
    }

    /// Acknowledge the outstanding write of this item.
    ///
    /// Only leaves with a staged value are updated and notified.
    pub fn write_complete(&self, ok: bool) {
        if self.debug > 0 {
            tracing::debug!(
                "{}: write {}",
                self.name,
                if ok { "complete" } else { "failed" }
            );
        }
        for connector in self.connectors() {
            let mut state = connector.lock_state();
            if state.has_pending_write() {
                state.set_write_result(ok);
                connector.notify(state, ProcessReason::WriteComplete);
            }
        }
    }

    /// Ask every consumer of the tree to process.
    pub fn request_processing(&self, reason: ProcessReason) {
        self.request_processing_below(ElementId::ROOT, reason);
    }

    /// Ask every consumer at or below `id` to process.
    pub fn request_processing_below(&self, id: ElementId, reason: ProcessReason) {
        for connector in self.connectors_below(id) {
            connector.request_processing(reason);
        }
    }

    /// True if any leaf has a staged outgoing value.
    pub fn has_pending_writes(&self) -> bool {
        self.connectors().any(|c| c.lock_state().has_pending_write())
    }

    /// Discard all staged outgoing values.
    pub fn clear_outgoing(&self) {
        for connector in self.connectors() {
            connector.lock_state().clear_outgoing();
        }
    }

    /// Compose the outgoing value from the leaves.
    ///
    /// Each leaf contributes its staged value, or its last known value if
    /// nothing is staged. Fields without a leaf are taken from the last
    /// incoming value. Returns `Variant::Empty` if nothing is known.
    pub fn get_outgoing(&self) -> Variant {
        let template = self
            .last_incoming
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let out = self
            .compose(ElementId::ROOT, template.as_ref())
            .unwrap_or_default();
        if self.debug > 1 {
            tracing::debug!("{}: -> {}", self.name, out.kind_name());
        }
        out
    }

    fn compose(&self, id: ElementId, template: Option<&Variant>) -> Option<Variant> {
        let element = self.get(id)?;
        let node = match &element.kind {
            ElementKind::Leaf(connector) => {
                return connector
                    .lock_state()
                    .composed_value()
                    .or_else(|| template.cloned())
            }
            ElementKind::Node(node) => node,
        };

        match template {
            Some(Variant::Structure(s)) => {
                let mut out = s.clone();
                for &child in &node.children {
                    if let Some(Segment::Field(name)) = &self.elements[child.index()].key {
                        if let Some(v) = self.compose(child, s.field(name)) {
                            out.set_field(name, v);
                        }
                    }
                }
                Some(Variant::Structure(out))
            }
            Some(Variant::Array(elements)) => {
                let mut out = elements.clone();
                for &child in &node.children {
                    if let Some(Segment::Index(i)) = self.elements[child.index()].key {
                        let Some(v) = self.compose(child, elements.get(i)) else {
                            continue;
                        };
                        match out.get_mut(i) {
                            Some(slot) => *slot = v,
                            None => self.skip_index(child, elements.len()),
                        }
                    }
                }
                Some(Variant::Array(out))
            }
            _ => self.compose_fresh(node),
        }
    }

    /// Build a value from the children alone, no template known.
    fn compose_fresh(&self, node: &NodeData) -> Option<Variant> {
        let first = node.children.first()?;
        match self.elements[first.index()].key {
            Some(Segment::Index(_)) => {
                let mut slots: Vec<(usize, ElementId, Variant)> = node
                    .children
                    .iter()
                    .filter_map(|&child| match self.elements[child.index()].key {
                        Some(Segment::Index(i)) => self.compose(child, None).map(|v| (i, child, v)),
                        _ => None,
                    })
                    .collect();
                slots.sort_by_key(|(i, _, _)| *i);

                // Only the run of known elements from index 0 is sent
                let mut out = Vec::new();
                for (i, child, v) in slots {
                    if i == out.len() {
                        out.push(v);
                    } else {
                        self.skip_index(child, out.len());
                    }
                }
                (!out.is_empty()).then_some(Variant::Array(out))
            }
            _ => {
                let mut out = Structure::new();
                for &child in &node.children {
                    if let Some(Segment::Field(name)) = &self.elements[child.index()].key {
                        if let Some(v) = self.compose(child, None) {
                            out.set_field(name, v);
                        }
                    }
                }
                (!out.is_empty()).then_some(Variant::Structure(out))
            }
        }
    }

    fn skip_index(&self, child: ElementId, len: usize) {
        if self.debug > 0 {
            tracing::debug!(
                "{}: '{}' lies past the outgoing array of length {}, not composed",
                self.name,
                self.path_of(child),
                len
            );
        }
    }

    /// Human readable dump of the item; `level` 0 prints one line, higher
    /// levels the tree, level 2 and up also the leaf data.
    pub fn show(&self, level: i32) -> String {
        let mut out = String::new();
        let leaves = self.connectors().count();
        let _ = writeln!(
            out,
            "item {} subscription={} debug={} elements={} leaves={}",
            self.name,
            self.subscription.as_deref().unwrap_or("-"),
            self.debug,
            self.elements.len(),
            leaves
        );
        if level > 0 {
            self.show_element(&mut out, ElementId::ROOT, 1, level);
        }
        out
    }

    fn show_element(&self, out: &mut String, id: ElementId, depth: usize, level: i32) {
        let Some(element) = self.get(id) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let name = if id.is_root() {
            "<root>".to_string()
        } else {
            element.name()
        };
        match &element.kind {
            ElementKind::Node(node) => {
                let _ = writeln!(
                    out,
                    "{}{} node children={} {}",
                    indent,
                    name,
                    node.children.len(),
                    if node.is_mapped() { "mapped" } else { "unmapped" }
                );
                for &child in &node.children {
                    self.show_element(out, child, depth + 1, level);
                }
            }
            ElementKind::Leaf(connector) => {
                let state = connector.lock_state();
                let _ = write!(
                    out,
                    "{}{} leaf -> {} read={} write={}",
                    indent,
                    name,
                    connector.name(),
                    state.read_status(),
                    state.write_status()
                );
                if level > 1 {
                    match state.incoming_summary() {
                        Some((native, true)) => {
                            let _ = write!(out, " incoming=Array of {}", native);
                        }
                        Some((native, false)) => {
                            let _ = write!(out, " incoming={}", native);
                        }
                        None => {
                            let _ = write!(out, " incoming=none");
                        }
                    }
                    if let Some(v) = state.outgoing() {
                        let _ = write!(out, " outgoing={}", v);
                    }
                }
                out.push('\n');
            }
        }
    }
}
