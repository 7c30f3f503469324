//! # lhf-dedup
//!
//! Scalar value deduplication on the `lhf-core` interning contract: each
//! distinct value is stored once behind a stable owned allocation and named
//! by a dense identifier, so value equality reduces to identifier
//! comparison. No set algebra — this is the one-value specialization of the
//! same idea the forest applies to whole sets.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use lhf_core::{LhfError, LhfResult, Property};

/// Identifier of an interned value within one deduplicator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u32);

impl ValueId {
    /// Raw numeric value.
    pub fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An interning store for scalar values of a [`Property`] type.
///
/// Values are held behind individually owned boxes, so a stored value never
/// moves while the instance lives. The inverse lookup is keyed by the value
/// hash with equality confirmation, the same probe discipline the forest
/// store uses.
pub struct Deduplicator<P: Property> {
    values: Vec<Box<P>>,
    lookup: FxHashMap<u64, SmallVec<[ValueId; 1]>>,
}

impl<P: Property> Deduplicator<P> {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            lookup: FxHashMap::default(),
        }
    }

    /// Interns a value, returning the existing identifier when an equal
    /// value is already stored.
    pub fn register(&mut self, value: P) -> ValueId {
        if let Some(id) = self.find(&value) {
            return id;
        }
        self.insert(value)
    }

    /// Interns by reference; the value is cloned only on a cold miss.
    pub fn register_ref(&mut self, value: &P) -> ValueId {
        if let Some(id) = self.find(value) {
            return id;
        }
        self.insert(value.clone())
    }

    /// The identifier of an equal stored value, if any.
    pub fn find(&self, value: &P) -> Option<ValueId> {
        let bucket = self.lookup.get(&value.key_hash())?;
        bucket
            .iter()
            .copied()
            .find(|id| self.values[id.index()].key_equal(value))
    }

    /// The stored value behind an identifier.
    pub fn get(&self, id: ValueId) -> LhfResult<&P> {
        self.values
            .get(id.index())
            .map(|value| &**value)
            .ok_or(LhfError::BadIdentifier {
                id: id.raw(),
                count: self.values.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Human-readable listing of all stored values, in identifier order.
    pub fn dump(&self) -> String {
        let mut out = String::from("{\n");
        for (index, value) in self.values.iter().enumerate() {
            out.push_str(&format!("    {index} : {}\n", value.render()));
        }
        out.push_str("}\n");
        out
    }

    fn insert(&mut self, value: P) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        let hash = value.key_hash();
        self.values.push(Box::new(value));
        self.lookup.entry(hash).or_default().push(id);
        tracing::trace!(id = id.raw(), "interned new value");
        id
    }
}

impl<P: Property> Default for Deduplicator<P> {
    fn default() -> Self {
        Self::new()
    }
}
