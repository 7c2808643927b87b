//! Data element trees
//!
//! Each [`Item`] owns a tree that mirrors the subset of its structured value
//! that consumers are interested in. Incoming values are decomposed along the
//! tree into the leaves; outgoing values are composed from the leaves.

mod chain;
mod element;
mod id;
mod item;
mod path;

pub use chain::add_element_chain;
pub use element::{DataElement, ElementKind, NodeData};
pub use id::ElementId;
pub use item::Item;
pub use path::{ElementPath, Segment};
