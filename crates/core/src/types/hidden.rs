//! Client-side set of keys the user asked to remove

use serde::{Deserialize, Serialize};

/// Keys hidden by the user, in insertion order
///
/// Serialized as a plain JSON array of strings. Duplicate keys in a loaded array
/// collapse onto their first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct HiddenSet {
    keys: Vec<String>,
}

impl HiddenSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key; returns false if it was already present
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Removes a key; returns false if it was absent
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k != key);
        self.keys.len() != before
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates keys oldest first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Keeps only the keys matching the predicate
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.keys.retain(|k| keep(k));
    }
}

impl From<Vec<String>> for HiddenSet {
    fn from(keys: Vec<String>) -> Self {
        keys.into_iter().collect()
    }
}

impl From<HiddenSet> for Vec<String> {
    fn from(set: HiddenSet) -> Self {
        set.keys
    }
}

impl<S: Into<String>> FromIterator<S> for HiddenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = HiddenSet::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}
