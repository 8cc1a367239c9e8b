//! Gadget catalogue: deduplicated storage keyed by gadget text.
//!
//! Two tables are kept. The primary one holds every accepted gadget under
//! its canonical key. The stack-delta table only holds gadgets that adjust
//! the stack pointer by a constant, under a key with that constant masked
//! out, and is used to merge gadgets that differ only in the adjustment.

use std::rc::Rc;

use crate::gadget::Gadget;

mod hash;
mod list;

pub use self::hash::HashCatalogue;
pub use self::list::ListCatalogue;

/// Key-value store for catalogue entries.
///
/// Enumeration visits entries in insertion order. Replacing the value of an
/// existing key keeps its position.
pub trait Catalogue<V> {
    /// Insert or replace; returns the previous value for `key`.
    fn insert(&mut self, key: &str, value: V) -> Option<V>;

    /// Look up a key
    fn find(&self, key: &str) -> Option<&V>;

    /// Remove a key, returning its value
    fn delete(&mut self, key: &str) -> Option<V>;

    /// Number of entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every entry in insertion order
    fn for_each<F: FnMut(&str, &V)>(&self, visitor: F);
}

/// Concatenate the gadget's instructions in program order, without separators.
pub fn generate_key(gadget: &Gadget) -> String {
    gadget.program_order().map(|insn| insn.text.as_str()).collect()
}

/// Replace the last space-delimited token of a key with `ret`.
///
/// Two keys that differ only in the trailing stack adjustment constant map
/// to the same masked key.
pub fn update_key(key: &str) -> String {
    let token_start = key.rfind(' ').map_or(0, |space| space + 1);
    let mut masked = String::with_capacity(token_start + 3);
    masked.push_str(&key[..token_start]);
    masked.push_str("ret");
    masked
}

/// Outcome of offering a gadget to the catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// Stored as a new entry
    Added,
    /// Took the place of an equivalent gadget with a larger stack adjustment
    Replaced,
    /// Dropped in favour of an existing entry
    Duplicate,
}

/// Primary and stack-delta tables plus the policy that keeps them in step.
#[derive(Debug, Default)]
pub struct GadgetCatalogue<C = HashCatalogue<Rc<Gadget>>> {
    primary: C,
    stack_deltas: C,
}

impl<C: Catalogue<Rc<Gadget>> + Default> GadgetCatalogue<C> {
    pub fn new() -> Self {
        Self {
            primary: C::default(),
            stack_deltas: C::default(),
        }
    }

    /// Store a gadget unless an equivalent one is already known.
    ///
    /// Gadgets without a constant stack adjustment are deduplicated on their
    /// exact key, first seen wins. Gadgets with one are compared through the
    /// masked key; among equivalent gadgets the one with the smaller
    /// adjustment magnitude is kept, ties keeping the first seen.
    pub fn insert_gadget(&mut self, gadget: Gadget) -> Insertion {
        let key = generate_key(&gadget);

        let delta = match gadget.stack_adjustment() {
            Some((_, delta)) if gadget.len() >= 2 => delta,
            _ => {
                if self.primary.find(&key).is_some() {
                    return Insertion::Duplicate;
                }
                self.primary.insert(&key, Rc::new(gadget));
                return Insertion::Added;
            }
        };

        let masked = update_key(&key);
        let gadget = Rc::new(gadget);

        let verdict = self.stack_deltas.find(&masked).map(|existing| {
            let smaller = existing
                .stack_adjustment()
                .map_or(true, |(_, old)| old.unsigned_abs() > delta.unsigned_abs());
            (smaller, generate_key(existing))
        });

        match verdict {
            None => {
                self.stack_deltas.insert(&masked, Rc::clone(&gadget));
                self.primary.insert(&key, gadget);
                Insertion::Added
            }
            Some((true, old_key)) => {
                log::debug!("'{}' supersedes '{}'", key, old_key);
                self.stack_deltas.insert(&masked, Rc::clone(&gadget));
                self.primary.delete(&old_key);
                self.primary.insert(&key, gadget);
                Insertion::Replaced
            }
            Some((false, _)) => Insertion::Duplicate,
        }
    }

    /// Accepted gadgets, in catalogue order
    pub fn gadgets(&self) -> Vec<Rc<Gadget>> {
        let mut gadgets = Vec::with_capacity(self.primary.len());
        self.primary.for_each(|_, gadget| gadgets.push(Rc::clone(gadget)));
        gadgets
    }

    /// The table of all accepted gadgets
    pub fn primary(&self) -> &C {
        &self.primary
    }

    /// The table of stack-adjusting gadgets, under masked keys
    pub fn stack_deltas(&self) -> &C {
        &self.stack_deltas
    }

    pub fn len(&self) -> usize {
        self.primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }
}
