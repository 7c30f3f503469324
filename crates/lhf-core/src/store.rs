//! The set store: a hash-cons table from canonical contents to identifiers.
//!
//! Contents are held behind individually owned boxed slices, so a stored
//! set never moves or changes for the lifetime of the instance. The inverse
//! lookup is keyed by content hash with full-element-equality confirmation,
//! which also gives singleton registration a probe path that allocates
//! nothing on a hit.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::element::{content_hash, Element};
use crate::errors::{LhfError, LhfResult};
use crate::hash::compose_hash;
use crate::id::SetId;
use crate::nesting::Nesting;
use crate::property::Property;

pub(crate) struct SetStore<P: Property, N: Nesting<P>> {
    /// Contents by identifier. Boxed individually: the slice behind an
    /// identifier must stay at a stable address while the store grows.
    sets: Vec<Box<[Element<P, N>]>>,
    /// Content hash to identifiers with that hash. Buckets almost always
    /// hold a single entry; full equality disambiguates collisions.
    lookup: FxHashMap<u64, SmallVec<[SetId; 1]>>,
}

impl<P: Property, N: Nesting<P>> SetStore<P, N> {
    /// A store seeded with the empty set at identifier 0.
    pub fn new() -> Self {
        let mut store = Self::bare();
        store.intern(Vec::new());
        store
    }

    /// A store with no sets at all; used when reloading persisted state.
    pub fn bare() -> Self {
        Self {
            sets: Vec::new(),
            lookup: FxHashMap::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn holds(&self, id: SetId) -> bool {
        id.index() < self.sets.len()
    }

    pub fn get(&self, id: SetId) -> LhfResult<&[Element<P, N>]> {
        self.sets
            .get(id.index())
            .map(|set| &set[..])
            .ok_or(LhfError::BadIdentifier {
                id: id.raw(),
                count: self.sets.len(),
            })
    }

    /// Contents of a known-valid identifier.
    pub fn contents(&self, id: SetId) -> &[Element<P, N>] {
        debug_assert!(self.holds(id));
        &self.sets[id.index()]
    }

    /// Interns a canonical element sequence. Returns the identifier and
    /// whether this was a cold miss (the contents were not stored before).
    pub fn intern(&mut self, elements: Vec<Element<P, N>>) -> (SetId, bool) {
        let hash = content_hash(&elements);
        if let Some(bucket) = self.lookup.get(&hash) {
            for &id in bucket {
                if full_equal_contents(&self.sets[id.index()], &elements) {
                    return (id, false);
                }
            }
        }

        let id = SetId::from_index(self.sets.len());
        self.sets.push(elements.into_boxed_slice());
        self.lookup.entry(hash).or_default().push(id);
        (id, true)
    }

    /// Interns a one-element set. The hit path probes by hash and compares
    /// against stored singletons without building a temporary set.
    pub fn intern_single(&mut self, element: Element<P, N>) -> (SetId, bool) {
        let hash = compose_hash(0, element.hash_value());
        if let Some(bucket) = self.lookup.get(&hash) {
            for &id in bucket {
                let stored = &self.sets[id.index()];
                if stored.len() == 1 && stored[0].full_equal(&element) {
                    return (id, false);
                }
            }
        }

        let id = SetId::from_index(self.sets.len());
        self.sets.push(vec![element].into_boxed_slice());
        self.lookup.entry(hash).or_default().push(id);
        (id, true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SetId, &[Element<P, N>])> + '_ {
        self.sets
            .iter()
            .enumerate()
            .map(|(index, set)| (SetId::from_index(index), &set[..]))
    }
}

fn full_equal_contents<P: Property, N: Nesting<P>>(
    stored: &[Element<P, N>],
    candidate: &[Element<P, N>],
) -> bool {
    stored.len() == candidate.len()
        && stored
            .iter()
            .zip(candidate)
            .all(|(a, b)| a.full_equal(b))
}

/// Verifies canonical form: strictly increasing keys, which also rules out
/// duplicates under both key and full equality.
pub(crate) fn verify_canonical<P: Property, N: Nesting<P>>(
    elements: &[Element<P, N>],
) -> LhfResult<()> {
    for (index, pair) in elements.windows(2).enumerate() {
        if !pair[0].key_less(&pair[1]) {
            let reason = if pair[0].key_equal(&pair[1]) {
                "duplicate key"
            } else {
                "keys out of order"
            };
            return Err(LhfError::MalformedSet {
                position: index + 1,
                reason,
            });
        }
    }
    Ok(())
}

/// Sorts under the key ordering and drops duplicates under full equality.
///
/// Equal keys with differing child tuples survive canonicalization; the
/// checked `register` rejects them afterwards, since a canonical set cannot
/// hold two elements with the same key.
pub(crate) fn canonicalize<P: Property, N: Nesting<P>>(
    mut elements: Vec<Element<P, N>>,
) -> Vec<Element<P, N>> {
    elements.sort_by(|a, b| {
        if a.key_less(b) {
            Ordering::Less
        } else if b.key_less(a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });

    let mut canonical: Vec<Element<P, N>> = Vec::with_capacity(elements.len());
    for element in elements {
        // After the sort, any full duplicate lives in the current equal-key
        // run at the tail of the output.
        let run_start = canonical
            .iter()
            .rposition(|prev| !prev.key_equal(&element))
            .map_or(0, |i| i + 1);
        if canonical[run_start..]
            .iter()
            .any(|prev| prev.full_equal(&element))
        {
            continue;
        }
        canonical.push(element);
    }
    canonical
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nesting::Leaf;

    fn keys(elements: &[Element<i32, Leaf>]) -> Vec<i32> {
        elements.iter().map(|e| *e.key()).collect()
    }

    #[test]
    fn interning_is_idempotent() {
        let mut store: SetStore<i32, Leaf> = SetStore::new();
        let set = || vec![Element::new(1), Element::new(2), Element::new(3)];

        let (a, cold_a) = store.intern(set());
        let (b, cold_b) = store.intern(set());
        assert_eq!(a, b);
        assert!(cold_a);
        assert!(!cold_b);
        assert_eq!(store.len(), 2); // the empty set plus one
    }

    #[test]
    fn empty_set_lives_at_identifier_zero() {
        let mut store: SetStore<i32, Leaf> = SetStore::new();
        let (id, cold) = store.intern(Vec::new());
        assert_eq!(id, SetId::EMPTY);
        assert!(!cold);
    }

    #[test]
    fn singleton_probe_matches_full_registration() {
        let mut store: SetStore<i32, Leaf> = SetStore::new();
        let (via_set, _) = store.intern(vec![Element::new(42)]);
        let (via_single, cold) = store.intern_single(Element::new(42));
        assert_eq!(via_set, via_single);
        assert!(!cold);
    }

    #[test]
    fn verify_rejects_unsorted_and_duplicate_input() {
        let unsorted = [Element::<i32>::new(2), Element::new(1)];
        assert!(matches!(
            verify_canonical(&unsorted),
            Err(LhfError::MalformedSet { position: 1, .. })
        ));

        let duplicated = [Element::<i32>::new(1), Element::new(1)];
        assert!(matches!(
            verify_canonical(&duplicated),
            Err(LhfError::MalformedSet {
                reason: "duplicate key",
                ..
            })
        ));
    }

    #[test]
    fn canonicalize_sorts_and_deduplicates() {
        let raw = vec![
            Element::<i32>::new(3),
            Element::new(1),
            Element::new(3),
            Element::new(2),
            Element::new(1),
        ];
        assert_eq!(keys(&canonicalize(raw)), vec![1, 2, 3]);
    }
}
