//! Linear-scan catalogue, for small tables and as a reference backend.

use super::Catalogue;

/// Catalogue kept as an insertion-ordered list of entries.
#[derive(Debug, Clone)]
pub struct ListCatalogue<V> {
    entries: Vec<(String, V)>,
}

impl<V> Default for ListCatalogue<V> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<V> ListCatalogue<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

impl<V> Catalogue<V> for ListCatalogue<V> {
    fn insert(&mut self, key: &str, value: V) -> Option<V> {
        match self.position(key) {
            Some(pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.entries.push((key.to_string(), value));
                None
            }
        }
    }

    fn find(&self, key: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn delete(&mut self, key: &str) -> Option<V> {
        let pos = self.position(key)?;
        Some(self.entries.remove(pos).1)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn for_each<F: FnMut(&str, &V)>(&self, mut visitor: F) {
        for (key, value) in &self.entries {
            visitor(key.as_str(), value);
        }
    }
}
