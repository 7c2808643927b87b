//! Handle type for the element arena.
//!
//! `ElementId` is a newtype over `u32` that serves as a direct index into
//! the owning item's element vector, providing O(1) lookup. Handles are only
//! meaningful for the item that created them.

use std::fmt;

/// Index into `Item::elements`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ElementId(pub u32);

impl ElementId {
    pub const INVALID: ElementId = ElementId(u32::MAX);

    /// The root element is always the first one in the arena.
    pub const ROOT: ElementId = ElementId(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "ElementId(INVALID)")
        } else {
            write!(f, "ElementId({})", self.0)
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_id() {
        let id = ElementId(42);
        assert!(id.is_valid());
        assert_eq!(id.index(), 42);
        assert!(!ElementId::INVALID.is_valid());
        assert_eq!(format!("{:?}", ElementId::INVALID), "ElementId(INVALID)");
    }

    #[test]
    fn test_root_id() {
        assert!(ElementId::ROOT.is_root());
        assert!(ElementId::ROOT.is_valid());
        assert!(!ElementId(1).is_root());
    }
}
