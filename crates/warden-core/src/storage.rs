//! Capacity-bounded typed storage
//!
//! Records live natively in typed maps; the canonical byte encoding is only
//! computed to size a box (prefix + `bincode(key)` + `bincode(value)`), which
//! is what storage rent is charged on.

use crate::errors::{WardenError, WardenResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A key that can name a storage box.
pub trait StorageKey: Ord + Clone + Serialize {
    /// Type prefix distinguishing box families
    const PREFIX: &'static [u8];

    /// Canonical box name: type prefix followed by the bincode encoding
    fn storage_key(&self) -> WardenResult<Vec<u8>> {
        let mut out = Self::PREFIX.to_vec();
        out.extend(bincode::serialize(self)?);
        Ok(out)
    }
}

/// Typed map with a fixed entry bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxMap<K: Ord, V> {
    label: String,
    capacity: usize,
    entries: BTreeMap<K, V>,
}

impl<K, V> BoxMap<K, V>
where
    K: StorageKey + std::fmt::Display,
    V: Serialize,
{
    /// Create an empty map holding at most `capacity` entries
    pub fn new(label: impl Into<String>, capacity: usize) -> Self {
        Self {
            label: label.into(),
            capacity,
            entries: BTreeMap::new(),
        }
    }

    /// Entry for `key`
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Mutable entry for `key`
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new entry; an existing key is a [`WardenError::Duplicate`].
    pub fn insert_new(&mut self, key: K, value: V) -> WardenResult<()> {
        if self.entries.contains_key(&key) {
            return Err(WardenError::duplicate(format!(
                "{} {key} already exists",
                self.label
            )));
        }
        self.ensure_room()?;
        debug!(store = %self.label, key = %key, entries = self.entries.len() + 1, "Box created");
        self.entries.insert(key, value);
        Ok(())
    }

    /// Insert or replace, returning the previous value.
    pub fn upsert(&mut self, key: K, value: V) -> WardenResult<Option<V>> {
        if !self.entries.contains_key(&key) {
            self.ensure_room()?;
        }
        debug!(store = %self.label, key = %key, "Box written");
        Ok(self.entries.insert(key, value))
    }

    /// Remove an entry; a missing key is a [`WardenError::NotFound`].
    pub fn remove(&mut self, key: &K) -> WardenResult<V> {
        let value = self
            .entries
            .remove(key)
            .ok_or_else(|| WardenError::not_found(format!("{} {key}", self.label)))?;
        debug!(store = %self.label, key = %key, entries = self.entries.len(), "Box deleted");
        Ok(value)
    }

    /// Remove every entry matching `predicate`, returning them in key order
    pub fn drain_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> Vec<(K, V)> {
        let keys: Vec<K> = self
            .entries
            .keys()
            .filter(|k| predicate(k))
            .cloned()
            .collect();
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k).map(|v| (k, v)))
            .collect()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    /// Encoded size of a box holding `value` under `key`
    pub fn footprint(key: &K, value: &V) -> WardenResult<u64> {
        let name = key.storage_key()?.len() as u64;
        let body = bincode::serialized_size(value)?;
        Ok(name + body)
    }

    fn ensure_room(&self) -> WardenResult<()> {
        if self.entries.len() >= self.capacity {
            warn!(store = %self.label, capacity = self.capacity, "Store full");
            return Err(WardenError::capacity_exceeded(format!(
                "{} store is full ({} entries)",
                self.label, self.capacity
            )));
        }
        Ok(())
    }
}
