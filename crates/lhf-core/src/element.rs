//! Elements of interned sets.

use std::fmt;

use crate::hash::compose_hash;
use crate::nesting::{Leaf, Nesting};
use crate::property::Property;

/// One element of an interned set: a key plus, in nested forests, a
/// fixed-arity tuple of child-set identifiers (one per child position).
///
/// Ordering and *key equality* consider the key alone. *Full equality* also
/// compares the child tuple componentwise and is what decides whether two
/// interned sets are identical. Within a canonical set keys are unique, so
/// two elements with an equal key but different child tuples never coexist
/// in one set.
pub struct Element<P: Property, N: Nesting<P> = Leaf> {
    key: P,
    children: N::Ids,
}

impl<P: Property> Element<P, Leaf> {
    /// A bare-key element for a non-nested forest.
    pub fn new(key: P) -> Self {
        Self { key, children: () }
    }
}

impl<P: Property, N: Nesting<P>> Element<P, N> {
    /// An element carrying child-set identifiers.
    pub fn with_children(key: P, children: N::Ids) -> Self {
        Self { key, children }
    }

    pub fn key(&self) -> &P {
        &self.key
    }

    pub fn children(&self) -> &N::Ids {
        &self.children
    }

    /// Strict ordering under the key contract.
    pub fn key_less(&self, other: &Self) -> bool {
        self.key.key_less(&other.key)
    }

    /// Equality under the key contract.
    pub fn key_equal(&self, other: &Self) -> bool {
        self.key.key_equal(&other.key)
    }

    /// Key and child tuple equality; the store's notion of identity.
    pub fn full_equal(&self, other: &Self) -> bool {
        self.key.key_equal(&other.key) && self.children == other.children
    }

    /// Element hash: the key hash. Nesting does not alter it, so a nested
    /// set hashes the same as the bare-key set over the same keys.
    pub fn hash_value(&self) -> u64 {
        self.key.key_hash()
    }

    /// Human-readable form used by `dump`.
    pub fn render(&self) -> String {
        if N::IS_NESTED {
            format!("{} -> {}", self.key.render(), N::render(&self.children))
        } else {
            self.key.render()
        }
    }
}

impl<P: Property, N: Nesting<P>> Clone for Element<P, N> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            children: self.children.clone(),
        }
    }
}

impl<P: Property, N: Nesting<P>> fmt::Debug for Element<P, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("key", &self.key)
            .field("children", &self.children)
            .finish()
    }
}

impl<P: Property> From<P> for Element<P, Leaf> {
    fn from(key: P) -> Self {
        Element::new(key)
    }
}

/// Content hash of a canonical element sequence: the associative fold of
/// element hashes in stored order.
pub fn content_hash<P: Property, N: Nesting<P>>(elements: &[Element<P, N>]) -> u64 {
    elements
        .iter()
        .fold(0, |hash, element| compose_hash(hash, element.hash_value()))
}
