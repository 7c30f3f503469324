//! The subset cache: write-once containment facts.
//!
//! Every entry is a by-product of a kernel run; the cache never performs a
//! containment check of its own and no transitive closure is derived.
//! Missing entries mean *unknown*, never *disjoint*.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{LhfError, LhfResult};
use crate::id::{ordered_pair, SetId};

/// A known containment between the sets of an identifier pair, stored under
/// the key `(lo, hi)` with `lo < hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubsetRelation {
    /// The set at the smaller identifier is a subset of the larger one.
    #[serde(rename = "SUBSET")]
    Subset,
    /// The set at the smaller identifier is a superset of the larger one.
    #[serde(rename = "SUPERSET")]
    Superset,
}

impl SubsetRelation {
    fn flipped(self) -> SubsetRelation {
        match self {
            SubsetRelation::Subset => SubsetRelation::Superset,
            SubsetRelation::Superset => SubsetRelation::Subset,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct SubsetCache {
    relations: FxHashMap<(SetId, SetId), SubsetRelation>,
}

impl SubsetCache {
    /// The known relation of `a` to `b`: `Subset` means `a ⊆ b`, `Superset`
    /// means `a ⊇ b`, `None` means unknown. The pair is canonicalized to
    /// `(min, max)` before lookup.
    pub fn probe(&self, a: SetId, b: SetId) -> Option<SubsetRelation> {
        let (lo, hi) = ordered_pair(a, b);
        let stored = self.relations.get(&(lo, hi)).copied()?;
        if a <= b {
            Some(stored)
        } else {
            Some(stored.flipped())
        }
    }

    /// Records the fact `sub ⊆ sup`. Equal identifiers are a caller bug:
    /// kernels screen for the trivial relation before recording.
    pub fn record(&mut self, sub: SetId, sup: SetId) -> LhfResult<()> {
        if sub == sup {
            return Err(LhfError::EqualIdentifiers { id: sub.raw() });
        }

        let (key, relation) = if sub < sup {
            ((sub, sup), SubsetRelation::Subset)
        } else {
            ((sup, sub), SubsetRelation::Superset)
        };

        // Write-once: an existing entry is never overwritten. A conflicting
        // value would mean a kernel recorded an impossible fact.
        let existing = self.relations.entry(key).or_insert(relation);
        debug_assert_eq!(*existing, relation);
        Ok(())
    }

    /// Installs a fact from a persisted payload, already in stored form.
    pub fn insert_fact(&mut self, key: (SetId, SetId), relation: SubsetRelation) {
        self.relations.insert(key, relation);
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Entries in stored form, sorted by key.
    pub fn entries(&self) -> Vec<((SetId, SetId), SubsetRelation)> {
        let mut entries: Vec<_> = self
            .relations
            .iter()
            .map(|(&key, &relation)| (key, relation))
            .collect();
        entries.sort_by_key(|&(key, _)| key);
        entries
    }
}
