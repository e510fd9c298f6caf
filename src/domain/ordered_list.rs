//! Insertion-ordered, key-unique collection with O(1) key lookup and
//! O(1) neighbor traversal.

use std::collections::HashMap;

/// Ordered list of items keyed by a string extracted at construction.
///
/// Positions are contiguous `0..len`. When two items share a key, the
/// first occurrence is kept and later ones are dropped, so the index and
/// iteration order always agree.
#[derive(Debug, Clone)]
pub struct OrderedList<T> {
    items: Vec<T>,
    keys: Vec<String>,
    index: HashMap<String, usize>,
    dropped: Vec<String>,
}

impl<T> OrderedList<T> {
    pub fn new<I, F>(items: I, key: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: Fn(&T) -> String,
    {
        let mut list = Self {
            items: Vec::new(),
            keys: Vec::new(),
            index: HashMap::new(),
            dropped: Vec::new(),
        };

        for item in items {
            let k = key(&item);
            if list.index.contains_key(&k) {
                tracing::warn!(key = %k, "duplicate key in ordered list, keeping first occurrence");
                list.dropped.push(k);
                continue;
            }
            list.index.insert(k.clone(), list.items.len());
            list.keys.push(k);
            list.items.push(item);
        }

        list
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&pos| &self.items[pos])
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn at(&self, pos: usize) -> Option<&T> {
        self.items.get(pos)
    }

    pub fn key_at(&self, pos: usize) -> Option<&str> {
        self.keys.get(pos).map(String::as_str)
    }

    pub fn get_next(&self, key: &str) -> Option<&T> {
        let pos = self.position(key)?;
        self.items.get(pos + 1)
    }

    pub fn get_previous(&self, key: &str) -> Option<&T> {
        let pos = self.position(key)?;
        pos.checked_sub(1).and_then(|p| self.items.get(p))
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Fresh iterator in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Keys that were rejected as duplicates during construction.
    pub fn dropped_duplicates(&self) -> &[String] {
        &self.dropped
    }
}

impl<'a, T> IntoIterator for &'a OrderedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
