//! Chained hash table with a 16-bit string hash.

use super::Catalogue;

/// Number of buckets a new table starts with
pub const DEFAULT_CAPACITY: usize = 16;

/// Entries per bucket above which the table doubles
pub const LOAD_FACTOR: f64 = 0.75;

/// Java-style polynomial string hash, truncated to 16 bits.
///
/// Each byte is sign-extended before being added.
pub fn java_hash(key: &str) -> i16 {
    key.bytes()
        .fold(0i16, |hash, b| hash.wrapping_mul(31).wrapping_add(b as i8 as i16))
}

/// Bucket of `key` in a table of `capacity` buckets, always non-negative.
pub fn bucket_index(key: &str, capacity: usize) -> usize {
    i64::from(java_hash(key)).rem_euclid(capacity as i64) as usize
}

/// Hash catalogue with separate chaining.
///
/// Entries live in an insertion-ordered arena; buckets chain arena indices.
/// Deleted entries leave a hole in the arena. Holes are compacted away on
/// the next rehash, or as soon as they outnumber the live entries.
#[derive(Debug, Clone)]
pub struct HashCatalogue<V> {
    buckets: Vec<Vec<usize>>,
    entries: Vec<Option<(String, V)>>,
    size: usize,
}

impl<V> Default for HashCatalogue<V> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<V> HashCatalogue<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with `capacity` buckets (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); capacity.max(1)],
            entries: Vec::new(),
            size: 0,
        }
    }

    /// Current number of buckets
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Arena slots left behind by deletions
    fn holes(&self) -> usize {
        self.entries.len() - self.size
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.buckets[bucket_index(key, self.capacity())]
            .iter()
            .copied()
            .find(|&pos| matches!(&self.entries[pos], Some((k, _)) if k == key))
    }

    /// Redistribute all entries over `capacity` buckets.
    fn rehash(&mut self, capacity: usize) {
        log::trace!("rehashing {} entries into {} buckets", self.size, capacity);

        let entries: Vec<_> = std::mem::take(&mut self.entries).into_iter().flatten().collect();
        self.buckets = vec![Vec::new(); capacity.max(1)];

        for (pos, (key, _)) in entries.iter().enumerate() {
            let bucket = bucket_index(key, self.buckets.len());
            self.buckets[bucket].push(pos);
        }
        self.entries = entries.into_iter().map(Some).collect();
    }
}

impl<V> Catalogue<V> for HashCatalogue<V> {
    fn insert(&mut self, key: &str, value: V) -> Option<V> {
        if let Some(pos) = self.position(key) {
            return self.entries[pos]
                .as_mut()
                .map(|(_, slot)| std::mem::replace(slot, value));
        }

        if (self.size + 1) as f64 > self.capacity() as f64 * LOAD_FACTOR {
            self.rehash(self.capacity() * 2);
        }

        let pos = self.entries.len();
        self.entries.push(Some((key.to_string(), value)));
        let bucket = bucket_index(key, self.capacity());
        self.buckets[bucket].push(pos);
        self.size += 1;
        None
    }

    fn find(&self, key: &str) -> Option<&V> {
        let pos = self.position(key)?;
        self.entries[pos].as_ref().map(|(_, value)| value)
    }

    fn delete(&mut self, key: &str) -> Option<V> {
        let pos = self.position(key)?;
        let bucket = bucket_index(key, self.capacity());
        self.buckets[bucket].retain(|&p| p != pos);
        self.size -= 1;
        let value = self.entries[pos].take().map(|(_, value)| value);

        if self.holes() > self.size {
            self.rehash(self.capacity());
        }
        value
    }

    fn len(&self) -> usize {
        self.size
    }

    fn for_each<F: FnMut(&str, &V)>(&self, mut visitor: F) {
        for (key, value) in self.entries.iter().flatten() {
            visitor(key.as_str(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn keys<V>(table: &HashCatalogue<V>) -> Vec<String> {
        let mut out = Vec::new();
        table.for_each(|k, _| out.push(k.to_string()));
        out
    }

    #[rstest]
    #[case("", 0)]
    #[case("a", 97)]
    #[case("ab", 97 * 31 + 98)]
    #[case("ret", ((114 * 31 + 101) * 31 + 116) as i16)]
    fn test_java_hash(#[case] key: &str, #[case] expected: i16) {
        assert_eq!(java_hash(key), expected);
    }

    #[test]
    fn test_hash_wraps_to_16_bits() {
        let key = "ld ra, 8(sp)addi sp, sp, 16ret";
        let wide = key
            .bytes()
            .fold(0i32, |h, b| h.wrapping_mul(31).wrapping_add(b as i8 as i32));

        assert_eq!(java_hash(key), wide as i16);
    }

    #[test]
    fn test_bucket_index_is_in_range() {
        for key in ["", "ret", "ld ra, 8(sp)addi sp, sp, 16ret", "\u{ff}\u{fe}"] {
            for capacity in [1, 16, 17, 1024] {
                assert!(bucket_index(key, capacity) < capacity);
            }
        }
    }

    #[test]
    fn test_insert_find_delete() {
        let mut table = HashCatalogue::new();

        assert_eq!(table.insert("mv a0, s0ret", 1), None);
        assert_eq!(table.insert("ld ra, 0(sp)ret", 2), None);
        assert_eq!(table.find("mv a0, s0ret"), Some(&1));
        assert_eq!(table.len(), 2);

        assert_eq!(table.insert("mv a0, s0ret", 3), Some(1));
        assert_eq!(table.len(), 2);
        assert_eq!(keys(&table), vec!["mv a0, s0ret", "ld ra, 0(sp)ret"]);

        assert_eq!(table.delete("mv a0, s0ret"), Some(3));
        assert_eq!(table.delete("mv a0, s0ret"), None);
        assert_eq!(table.find("mv a0, s0ret"), None);
        assert_eq!(table.len(), 1);
        assert_eq!(keys(&table), vec!["ld ra, 0(sp)ret"]);
    }

    #[test]
    fn test_rehash_keeps_entries_and_order() {
        let mut table = HashCatalogue::new();
        let inserted: Vec<String> = (0..100).map(|i| format!("addi a0, a0, {}ret", i)).collect();

        for (i, key) in inserted.iter().enumerate() {
            table.insert(key, i);
        }
        table.delete(&inserted[10]);

        assert!(table.capacity() > DEFAULT_CAPACITY);
        assert!(table.len() as f64 <= table.capacity() as f64 * LOAD_FACTOR);
        assert_eq!(table.len(), 99);
        for (i, key) in inserted.iter().enumerate().filter(|(i, _)| *i != 10) {
            assert_eq!(table.find(key), Some(&i));
        }

        let expected: Vec<_> = inserted.iter().filter(|k| *k != &inserted[10]).cloned().collect();
        assert_eq!(keys(&table), expected);
    }

    #[test]
    fn test_replacement_churn_keeps_arena_compact() {
        let mut table = HashCatalogue::new();
        table.insert("ld ra, 8(sp)ret", 0);

        // delete-then-insert, as when a smaller stack delta supersedes a gadget
        let mut previous = String::from("addi sp, sp, 1000ret");
        table.insert(&previous, 1000);
        for delta in (1..1000).rev() {
            let key = format!("addi sp, sp, {}ret", delta);
            table.delete(&previous);
            table.insert(&key, delta);
            previous = key;
        }

        assert_eq!(table.len(), 2);
        assert_eq!(table.capacity(), DEFAULT_CAPACITY);
        assert!(table.holes() <= table.len());
        assert_eq!(table.find("addi sp, sp, 1ret"), Some(&1));
        assert_eq!(keys(&table), vec!["ld ra, 8(sp)ret", "addi sp, sp, 1ret"]);
    }

    #[test]
    fn test_colliding_keys_chain() {
        // "Aa" and "BB" share a Java hash
        assert_eq!(java_hash("Aa"), java_hash("BB"));

        let mut table = HashCatalogue::with_capacity(4);
        table.insert("Aa", 'a');
        table.insert("BB", 'b');

        assert_eq!(table.find("Aa"), Some(&'a'));
        assert_eq!(table.find("BB"), Some(&'b'));
        assert_eq!(table.delete("Aa"), Some('a'));
        assert_eq!(table.find("BB"), Some(&'b'));
    }
}
