//! Key-indexed entity storage.
//!
//! Inserting an entity whose key is already present replaces it in place.
//! Entities that expose an [`alias`](Keyed::alias) can also be found by it;
//! locations use this to resolve the names that deliveries and roads refer to.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::traits::Keyed;

#[derive(Debug, Clone)]
pub struct Registry<T: Keyed> {
    entries: HashMap<T::Key, T>,
    aliases: HashMap<String, T::Key>,
}

impl<T: Keyed> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            aliases: HashMap::new(),
        }
    }
}

impl<T: Keyed> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entity under its key. Returns the replaced value.
    pub fn insert(&mut self, value: T) -> Option<T> {
        let key = value.key().clone();
        let previous = self.entries.remove(&key);
        if let Some(alias) = previous.as_ref().and_then(|old| old.alias()) {
            if self.aliases.get(alias) == Some(&key) {
                self.aliases.remove(alias);
            }
        }
        if let Some(alias) = value.alias() {
            self.aliases.insert(alias.to_string(), key.clone());
        }
        self.entries.insert(key, value);
        previous
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        T::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut T>
    where
        T::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get_mut(key)
    }

    /// Looks an entity up by its alias. The most recent insert wins when two
    /// entities share an alias.
    pub fn find_by_alias(&self, alias: &str) -> Option<&T> {
        self.aliases.get(alias).and_then(|key| self.entries.get(key))
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<T>
    where
        T::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.entries.remove(key)?;
        if let Some(alias) = removed.alias() {
            if self.aliases.get(alias) == Some(removed.key()) {
                self.aliases.remove(alias);
            }
        }
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in unspecified order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}

impl<T: Keyed> FromIterator<T> for Registry<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut registry = Registry::new();
        for value in iter {
            registry.insert(value);
        }
        registry
    }
}
