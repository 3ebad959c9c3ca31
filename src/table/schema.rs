//! Append-only column schema.

use std::collections::HashMap;

/// Ordered, append-only mapping from column name to slot.
///
/// Slots are never reused or reordered. Every change bumps a monotonic
/// revision, so a writer can tell exactly when its header is stale.
#[derive(Clone, Debug, Default)]
pub struct ColumnSchema {
    /// Name of each slot, `None` for slots created by backfill.
    names: Vec<Option<String>>,
    slots: HashMap<String, usize>,
    revision: u64,
}

impl ColumnSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots, named or not.
    #[inline]
    pub fn width(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Monotonic change counter.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    /// Name first bound to a slot.
    pub fn name(&self, slot: usize) -> Option<&str> {
        self.names.get(slot).and_then(|n| n.as_deref())
    }

    /// Append a new named slot, or return the existing slot for the name.
    pub fn push(&mut self, name: &str) -> usize {
        if let Some(slot) = self.slot(name) {
            return slot;
        }
        let slot = self.names.len();
        self.names.push(Some(name.to_string()));
        self.slots.insert(name.to_string(), slot);
        self.revision += 1;
        slot
    }

    /// Bind a name to an explicit slot, growing with unnamed slots as needed.
    ///
    /// Returns false if the name was already bound; its slot is kept.
    pub fn bind(&mut self, name: &str, slot: usize) -> bool {
        if self.slots.contains_key(name) {
            return false;
        }
        if slot >= self.names.len() {
            self.names.resize(slot + 1, None);
        }
        if self.names[slot].is_none() {
            self.names[slot] = Some(name.to_string());
        }
        self.slots.insert(name.to_string(), slot);
        self.revision += 1;
        true
    }

    /// Iterate `(slot, name)` over named slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_deref().map(|n| (i, n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_is_append_only() {
        let mut s = ColumnSchema::new();
        assert_eq!(s.push("a"), 0);
        assert_eq!(s.push("b"), 1);
        let rev = s.revision();
        assert_eq!(s.push("a"), 0);
        assert_eq!(s.revision(), rev);
        assert_eq!(s.width(), 2);
    }

    #[test]
    fn test_bind_backfills() {
        let mut s = ColumnSchema::new();
        assert!(s.bind("x", 3));
        assert_eq!(s.width(), 4);
        assert_eq!(s.name(1), None);
        assert_eq!(s.name(3), Some("x"));
        assert!(!s.bind("x", 0));
        assert_eq!(s.slot("x"), Some(3));
        let named: Vec<_> = s.iter().collect();
        assert_eq!(named, vec![(3, "x")]);
    }

    #[test]
    fn test_alias_keeps_first_name() {
        let mut s = ColumnSchema::new();
        s.bind("a", 0);
        s.bind("alias", 0);
        assert_eq!(s.slot("alias"), Some(0));
        assert_eq!(s.name(0), Some("a"));
    }
}
