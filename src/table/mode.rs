//! Per-column display hints.
//!
//! Hints arrive as `key=value,key2=value2` text on the first record of a
//! column and are kept as ordered key/value pairs.

use smallvec::SmallVec;
use std::fmt;

/// Key/value hints attached to one output column.
#[derive(Clone, Default, PartialEq)]
pub struct ColumnMode {
    entries: SmallVec<[(String, String); 4]>,
}

impl ColumnMode {
    /// Global time scale, routed to the time column as `scale`.
    pub const TIME_SCALE_KEY: &'static str = "timeScale";
    /// Scale key on the time column.
    pub const SCALE_KEY: &'static str = "scale";
    /// Axis bound keys, routed to the time column.
    pub const AXIS_KEYS: [&'static str; 4] = ["xmin", "xmax", "ymin", "ymax"];

    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any existing value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        for (k, v) in &mut self.entries {
            if k == &key {
                *v = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether a hint key belongs on the shared time-column record.
    pub fn is_shared_key(key: &str) -> bool {
        key == Self::TIME_SCALE_KEY || Self::AXIS_KEYS.contains(&key)
    }
}

/// Split hint text into trimmed `(key, value)` pairs.
///
/// A bare key yields an empty value. Empty keys are dropped.
pub fn parse_hints(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.split(',').filter_map(|part| {
        let (key, value) = part.split_once('=').unwrap_or((part, ""));
        let key = key.trim();
        (!key.is_empty()).then(|| (key, value.trim()))
    })
}

impl fmt::Debug for ColumnMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ColumnMode {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut mode = Self::new();
        for (k, v) in iter {
            mode.set(k, v);
        }
        mode
    }
}
