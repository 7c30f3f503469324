//! The forest: interned sets plus memoized lattice operations over them.

use std::fmt::Write as _;
use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::config::BINARY_SEARCH_THRESHOLD;
use crate::element::Element;
use crate::errors::{LhfError, LhfResult};
use crate::id::{ordered_pair, SetId};
use crate::nesting::{LatticeOps, Leaf, Nesting, SetOp};
use crate::property::Property;
use crate::snapshot::{ElementRecord, TableSnapshot};
use crate::stats::ForestStats;
use crate::store::{self, SetStore};
use crate::subsets::{SubsetCache, SubsetRelation};

/// Caller-owned memoization table for one filter predicate. The predicate
/// must be a pure function of the element for the memoization to be sound;
/// the forest does not verify this.
pub type FilterCache = FxHashMap<SetId, SetId>;

/// An interning store for sorted sets of `Element<P, N>` with memoized
/// union, intersection, difference, and filter.
///
/// Equal contents always map to the same [`SetId`], so set equality reduces
/// to identifier comparison. Each binary operation on an identifier pair is
/// computed at most once; subsequent calls hit the operation caches, and
/// containment facts recorded as operation by-products let later operations
/// short-circuit without a merge pass.
///
/// The store only grows: no interned set is ever evicted, moved, or mutated
/// for the lifetime of the instance.
pub struct LatticeHashForest<P: Property, N: Nesting<P> = Leaf> {
    children: N::Refs,
    store: SetStore<P, N>,
    unions: FxHashMap<(SetId, SetId), SetId>,
    intersections: FxHashMap<(SetId, SetId), SetId>,
    differences: FxHashMap<(SetId, SetId), SetId>,
    subsets: SubsetCache,
    stats: ForestStats,
    timing: bool,
}

impl<P: Property> LatticeHashForest<P, Leaf> {
    /// A non-nested forest holding only the empty set.
    pub fn new() -> Self {
        Self::with_children(())
    }

    /// Registers a set given as bare keys, canonical order required.
    pub fn register_keys<I>(&mut self, keys: I) -> LhfResult<SetId>
    where
        I: IntoIterator<Item = P>,
    {
        self.register(keys.into_iter().map(Element::new).collect())
    }

    /// Registers a one-key set.
    pub fn register_key_single(&mut self, key: P) -> SetId {
        self.register_single(Element::new(key))
    }
}

impl<P: Property> Default for LatticeHashForest<P, Leaf> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Property, N: Nesting<P>> LatticeHashForest<P, N> {
    /// A forest over the given child handles, holding only the empty set.
    pub fn with_children(children: N::Refs) -> Self {
        Self {
            children,
            store: SetStore::new(),
            unions: FxHashMap::default(),
            intersections: FxHashMap::default(),
            differences: FxHashMap::default(),
            subsets: SubsetCache::default(),
            stats: ForestStats::default(),
            timing: false,
        }
    }

    /// The child handles this forest recurses into.
    pub fn children(&self) -> &N::Refs {
        &self.children
    }

    // ---- registration ------------------------------------------------------

    /// Interns a canonical element sequence, verifying canonical form first.
    ///
    /// Fails with [`LhfError::MalformedSet`] and no store mutation if the
    /// input is unsorted or holds duplicates. Equal contents always return
    /// the identifier assigned at first registration.
    pub fn register(&mut self, elements: Vec<Element<P, N>>) -> LhfResult<SetId> {
        store::verify_canonical(&elements)?;
        Ok(self.intern_tracked(elements).0)
    }

    /// Like [`register`](Self::register), additionally reporting whether
    /// this was a cold miss (the contents were not stored before).
    pub fn register_reporting(
        &mut self,
        elements: Vec<Element<P, N>>,
    ) -> LhfResult<(SetId, bool)> {
        store::verify_canonical(&elements)?;
        Ok(self.intern_tracked(elements))
    }

    /// Interns an element sequence that is canonical by construction,
    /// skipping verification (checked under `debug_assertions` only).
    pub fn register_canonical(&mut self, elements: Vec<Element<P, N>>) -> SetId {
        debug_assert!(store::verify_canonical(&elements).is_ok());
        self.intern_tracked(elements).0
    }

    /// Verifies that `elements` are in canonical form: strictly increasing
    /// under the key ordering, which also rules out duplicates.
    pub fn verify_integrity(elements: &[Element<P, N>]) -> LhfResult<()> {
        store::verify_canonical(elements)
    }

    /// Interns a one-element set without building a temporary set on the
    /// hit path.
    pub fn register_single(&mut self, element: Element<P, N>) -> SetId {
        let (id, cold) = self.store.intern_single(element);
        self.track_store(id, cold);
        id
    }

    /// Sorts under the key ordering and drops duplicates under full
    /// equality, for callers that cannot guarantee canonical input.
    pub fn canonicalize(elements: Vec<Element<P, N>>) -> Vec<Element<P, N>> {
        store::canonicalize(elements)
    }

    fn intern_tracked(&mut self, elements: Vec<Element<P, N>>) -> (SetId, bool) {
        let (id, cold) = self.store.intern(elements);
        self.track_store(id, cold);
        (id, cold)
    }

    fn track_store(&mut self, id: SetId, cold: bool) {
        if cold {
            self.stats.store.cold_misses += 1;
            tracing::trace!(id = id.raw(), "interned new set");
        } else {
            self.stats.store.hits += 1;
        }
    }

    // ---- accessors ---------------------------------------------------------

    /// The stored contents of `id`.
    pub fn get(&self, id: SetId) -> LhfResult<&[Element<P, N>]> {
        self.store.get(id)
    }

    /// Number of interned sets, the empty set included.
    pub fn count(&self) -> usize {
        self.store.len()
    }

    /// Number of elements in the set at `id`.
    pub fn size_of(&self, id: SetId) -> LhfResult<usize> {
        Ok(self.get(id)?.len())
    }

    /// Whether `id` names the empty set.
    pub fn is_empty(&self, id: SetId) -> bool {
        id.is_empty()
    }

    /// Whether the set at `id` holds an element with this element's key.
    pub fn contains(&self, id: SetId, element: &Element<P, N>) -> LhfResult<bool> {
        Ok(self.find_key(id, element.key())?.is_some())
    }

    /// The element with the given key, if present. Linear scan at or below
    /// [`BINARY_SEARCH_THRESHOLD`] elements, binary search above it.
    pub fn find_key(&self, id: SetId, key: &P) -> LhfResult<Option<&Element<P, N>>> {
        let set = self.get(id)?;
        if set.len() <= BINARY_SEARCH_THRESHOLD {
            return Ok(set.iter().find(|element| element.key().key_equal(key)));
        }

        let mut low = 0;
        let mut high = set.len();
        while low < high {
            let mid = low + (high - low) / 2;
            if set[mid].key().key_equal(key) {
                return Ok(Some(&set[mid]));
            }
            if set[mid].key().key_less(key) {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(None)
    }

    /// Like [`find_key`](Self::find_key), but an absent key is an error.
    pub fn require_key(&self, id: SetId, key: &P) -> LhfResult<&Element<P, N>> {
        self.find_key(id, key)?.ok_or(LhfError::AbsentValue)
    }

    // ---- binary operations -------------------------------------------------

    /// The union of the sets at `a` and `b`. Commutative and memoized.
    pub fn set_union(&mut self, a: SetId, b: SetId) -> LhfResult<SetId> {
        self.check_pair(a, b)?;
        let started = self.timing.then(Instant::now);
        let result = self.union_inner(a, b);
        if let Some(started) = started {
            self.stats.record_time("set_union", started.elapsed());
        }
        result
    }

    fn union_inner(&mut self, a: SetId, b: SetId) -> LhfResult<SetId> {
        if a == b {
            self.stats.unions.equal_hits += 1;
            return Ok(a);
        }
        if a.is_empty() {
            self.stats.unions.empty_hits += 1;
            return Ok(b);
        }
        if b.is_empty() {
            self.stats.unions.empty_hits += 1;
            return Ok(a);
        }

        let (lo, hi) = ordered_pair(a, b);

        match self.subsets.probe(lo, hi) {
            Some(SubsetRelation::Subset) => {
                self.stats.unions.subset_hits += 1;
                return Ok(hi);
            }
            Some(SubsetRelation::Superset) => {
                self.stats.unions.subset_hits += 1;
                return Ok(lo);
            }
            None => {}
        }

        if let Some(&cached) = self.unions.get(&(lo, hi)) {
            self.stats.unions.hits += 1;
            return Ok(cached);
        }

        let merged = self.merge_union(lo, hi)?;
        let (result, cold) = self.intern_tracked(merged);
        self.unions.insert((lo, hi), result);

        // The result contains both operands; record whichever containments
        // are non-trivial.
        if result == lo {
            self.subsets.record(hi, result)?;
        } else if result == hi {
            self.subsets.record(lo, result)?;
        } else {
            self.subsets.record(lo, result)?;
            self.subsets.record(hi, result)?;
        }

        if cold {
            self.stats.unions.cold_misses += 1;
        } else {
            self.stats.unions.edge_misses += 1;
        }
        tracing::trace!(
            lhs = lo.raw(),
            rhs = hi.raw(),
            result = result.raw(),
            cold,
            "union computed"
        );
        Ok(result)
    }

    fn merge_union(&self, a: SetId, b: SetId) -> LhfResult<Vec<Element<P, N>>> {
        let first = self.store.contents(a);
        let second = self.store.contents(b);
        let mut merged = Vec::with_capacity(first.len() + second.len());

        let mut i = 0;
        let mut j = 0;
        while i < first.len() && j < second.len() {
            let lhs = &first[i];
            let rhs = &second[j];
            if lhs.key_less(rhs) {
                merged.push(lhs.clone());
                i += 1;
            } else if rhs.key_less(lhs) {
                merged.push(rhs.clone());
                j += 1;
            } else {
                merged.push(self.combine(SetOp::Union, lhs, rhs)?);
                i += 1;
                j += 1;
            }
        }
        merged.extend(first[i..].iter().cloned());
        merged.extend(second[j..].iter().cloned());
        Ok(merged)
    }

    /// The intersection of the sets at `a` and `b`. Commutative and
    /// memoized.
    pub fn set_intersection(&mut self, a: SetId, b: SetId) -> LhfResult<SetId> {
        self.check_pair(a, b)?;
        let started = self.timing.then(Instant::now);
        let result = self.intersection_inner(a, b);
        if let Some(started) = started {
            self.stats.record_time("set_intersection", started.elapsed());
        }
        result
    }

    fn intersection_inner(&mut self, a: SetId, b: SetId) -> LhfResult<SetId> {
        if a == b {
            self.stats.intersections.equal_hits += 1;
            return Ok(a);
        }
        if a.is_empty() || b.is_empty() {
            self.stats.intersections.empty_hits += 1;
            return Ok(SetId::EMPTY);
        }

        let (lo, hi) = ordered_pair(a, b);

        match self.subsets.probe(lo, hi) {
            Some(SubsetRelation::Subset) => {
                self.stats.intersections.subset_hits += 1;
                return Ok(lo);
            }
            Some(SubsetRelation::Superset) => {
                self.stats.intersections.subset_hits += 1;
                return Ok(hi);
            }
            None => {}
        }

        if let Some(&cached) = self.intersections.get(&(lo, hi)) {
            self.stats.intersections.hits += 1;
            return Ok(cached);
        }

        let merged = self.merge_intersection(lo, hi)?;
        let (result, cold) = self.intern_tracked(merged);
        self.intersections.insert((lo, hi), result);

        // The result is contained in both operands.
        if result != lo {
            self.subsets.record(result, lo)?;
        }
        if result != hi {
            self.subsets.record(result, hi)?;
        }

        if cold {
            self.stats.intersections.cold_misses += 1;
        } else {
            self.stats.intersections.edge_misses += 1;
        }
        tracing::trace!(
            lhs = lo.raw(),
            rhs = hi.raw(),
            result = result.raw(),
            cold,
            "intersection computed"
        );
        Ok(result)
    }

    fn merge_intersection(&self, a: SetId, b: SetId) -> LhfResult<Vec<Element<P, N>>> {
        let first = self.store.contents(a);
        let second = self.store.contents(b);
        let mut merged = Vec::new();

        let mut i = 0;
        let mut j = 0;
        while i < first.len() && j < second.len() {
            let lhs = &first[i];
            let rhs = &second[j];
            if lhs.key_less(rhs) {
                i += 1;
            } else if rhs.key_less(lhs) {
                j += 1;
            } else {
                merged.push(self.combine(SetOp::Intersection, lhs, rhs)?);
                i += 1;
                j += 1;
            }
        }
        Ok(merged)
    }

    /// The difference `a − b`. Non-commutative and memoized under the pair
    /// as given.
    pub fn set_difference(&mut self, a: SetId, b: SetId) -> LhfResult<SetId> {
        self.check_pair(a, b)?;
        let started = self.timing.then(Instant::now);
        let result = self.difference_inner(a, b);
        if let Some(started) = started {
            self.stats.record_time("set_difference", started.elapsed());
        }
        result
    }

    fn difference_inner(&mut self, a: SetId, b: SetId) -> LhfResult<SetId> {
        if a == b {
            self.stats.differences.equal_hits += 1;
            return Ok(SetId::EMPTY);
        }
        if a.is_empty() {
            self.stats.differences.empty_hits += 1;
            return Ok(SetId::EMPTY);
        }
        if b.is_empty() {
            self.stats.differences.empty_hits += 1;
            return Ok(a);
        }

        if let Some(&cached) = self.differences.get(&(a, b)) {
            self.stats.differences.hits += 1;
            return Ok(cached);
        }

        let merged = self.merge_difference(a, b)?;
        let (result, cold) = self.intern_tracked(merged);
        self.differences.insert((a, b), result);

        if result != a {
            self.subsets.record(result, a)?;
        } else {
            // a − b = a means nothing of b is in a: seed the intersection
            // cache with the empty result for this pair.
            self.intersections
                .entry(ordered_pair(a, b))
                .or_insert(SetId::EMPTY);
        }

        if cold {
            self.stats.differences.cold_misses += 1;
        } else {
            self.stats.differences.edge_misses += 1;
        }
        tracing::trace!(
            lhs = a.raw(),
            rhs = b.raw(),
            result = result.raw(),
            cold,
            "difference computed"
        );
        Ok(result)
    }

    fn merge_difference(&self, a: SetId, b: SetId) -> LhfResult<Vec<Element<P, N>>> {
        let first = self.store.contents(a);
        let second = self.store.contents(b);
        let mut merged = Vec::new();

        let mut i = 0;
        let mut j = 0;
        while i < first.len() {
            if j == second.len() {
                merged.extend(first[i..].iter().cloned());
                break;
            }
            let lhs = &first[i];
            let rhs = &second[j];
            if lhs.key_less(rhs) {
                merged.push(lhs.clone());
                i += 1;
            } else if rhs.key_less(lhs) {
                j += 1;
            } else {
                // Key collision. A leaf forest drops the element; a nested
                // forest keeps it carrying the child-wise difference, even
                // when every child difference comes out empty.
                if N::IS_NESTED {
                    merged.push(self.combine(SetOp::Difference, lhs, rhs)?);
                }
                i += 1;
                j += 1;
            }
        }
        Ok(merged)
    }

    fn combine(
        &self,
        op: SetOp,
        lhs: &Element<P, N>,
        rhs: &Element<P, N>,
    ) -> LhfResult<Element<P, N>> {
        if N::IS_NESTED {
            let children = N::combine(op, &self.children, lhs.children(), rhs.children())?;
            Ok(Element::with_children(lhs.key().clone(), children))
        } else {
            Ok(lhs.clone())
        }
    }

    // ---- single-element wrappers ------------------------------------------

    /// Adds one element: union with the interned singleton.
    pub fn set_insert_single(&mut self, id: SetId, element: Element<P, N>) -> LhfResult<SetId> {
        let single = self.register_single(element);
        self.set_union(id, single)
    }

    /// Removes one element (matched by full equality): difference with the
    /// interned singleton.
    pub fn set_remove_single(&mut self, id: SetId, element: Element<P, N>) -> LhfResult<SetId> {
        let single = self.register_single(element);
        self.set_difference(id, single)
    }

    /// Removes whatever element carries this key, if any.
    pub fn set_remove_single_by_key(&mut self, id: SetId, key: &P) -> LhfResult<SetId> {
        let kept: Vec<Element<P, N>> = self
            .get(id)?
            .iter()
            .filter(|element| !element.key().key_equal(key))
            .cloned()
            .collect();
        Ok(self.register_canonical(kept))
    }

    // ---- filter ------------------------------------------------------------

    /// Keeps the elements satisfying `predicate`, memoized through the
    /// caller-owned `cache`.
    pub fn set_filter<F>(
        &mut self,
        id: SetId,
        mut predicate: F,
        cache: &mut FilterCache,
    ) -> LhfResult<SetId>
    where
        F: FnMut(&Element<P, N>) -> bool,
    {
        self.check_id(id)?;
        if id.is_empty() {
            return Ok(id);
        }

        if let Some(&cached) = cache.get(&id) {
            self.stats.filters.hits += 1;
            return Ok(cached);
        }

        let kept: Vec<Element<P, N>> = self
            .store
            .contents(id)
            .iter()
            .filter(|element| predicate(element))
            .cloned()
            .collect();
        let (result, cold) = self.intern_tracked(kept);
        cache.insert(id, result);

        if cold {
            self.stats.filters.cold_misses += 1;
        } else {
            self.stats.filters.edge_misses += 1;
        }
        Ok(result)
    }

    // ---- statistics --------------------------------------------------------

    /// Operation counters (and timers, when enabled) for this instance.
    pub fn stats(&self) -> &ForestStats {
        &self.stats
    }

    /// Enables or disables wall-clock timing of the operation entry points.
    pub fn set_timing(&mut self, enabled: bool) {
        self.timing = enabled;
    }

    /// Human-readable profile of the counters and timers.
    pub fn dump_stats(&self) -> String {
        self.stats.render()
    }

    // ---- reporting ---------------------------------------------------------

    /// The set at `id`, rendered as `{ e1 e2 … }`.
    pub fn set_to_string(&self, id: SetId) -> LhfResult<String> {
        let mut out = String::from("{ ");
        for element in self.get(id)? {
            out.push_str(&element.render());
            out.push(' ');
        }
        out.push('}');
        Ok(out)
    }

    /// Human-readable report of the three operation caches, the subset
    /// cache, and the store. Entries are sorted, so the output is
    /// deterministic for a given state.
    pub fn dump(&self) -> String {
        let mut out = String::from("{\n");

        render_cache(&mut out, "Unions", &self.unions);
        out.push('\n');
        render_cache(&mut out, "Differences", &self.differences);
        out.push('\n');
        render_cache(&mut out, "Intersections", &self.intersections);
        out.push('\n');

        let subset_entries = self.subsets.entries();
        let _ = writeln!(out, "    Subsets: (Count: {})", subset_entries.len());
        for ((lo, hi), relation) in subset_entries {
            let tag = match relation {
                SubsetRelation::Subset => "sub",
                SubsetRelation::Superset => "sup",
            };
            let _ = writeln!(out, "      ({lo},{hi}) -> {tag}");
        }
        out.push('\n');

        let _ = writeln!(out, "    PropertySets: (Count: {})", self.store.len());
        for (id, _) in self.store.iter() {
            let rendered = self
                .set_to_string(id)
                .unwrap_or_else(|_| String::from("{ }"));
            let _ = writeln!(out, "      {id} : {rendered}");
        }
        out.push_str("}\n");
        out
    }

    // ---- snapshot plumbing -------------------------------------------------

    /// This forest's tables in persisted form. Cache and subset entries are
    /// sorted; sets appear in identifier order.
    pub fn table_snapshot(&self) -> TableSnapshot<P> {
        TableSnapshot {
            sets: self
                .store
                .iter()
                .map(|(_, elements)| {
                    elements
                        .iter()
                        .map(|element| ElementRecord {
                            key: element.key().clone(),
                            children: N::ids_to_vec(element.children()),
                        })
                        .collect()
                })
                .collect(),
            unions: sorted_entries(&self.unions),
            intersections: sorted_entries(&self.intersections),
            differences: sorted_entries(&self.differences),
            subsets: self.subsets.entries(),
        }
    }

    /// Replaces this forest's tables with a persisted payload, validating
    /// shape as it goes. Statistics reset; child forests are not touched.
    pub fn load_table(&mut self, table: TableSnapshot<P>) -> LhfResult<()> {
        let mut store: SetStore<P, N> = SetStore::bare();
        for (position, records) in table.sets.into_iter().enumerate() {
            let elements = records
                .into_iter()
                .map(|record| {
                    let children =
                        N::ids_from_slice(&record.children).ok_or_else(|| LhfError::Snapshot {
                            reason: format!(
                                "set {position}: expected {} child identifiers, found {}",
                                N::ARITY,
                                record.children.len()
                            ),
                        })?;
                    Ok(Element::with_children(record.key, children))
                })
                .collect::<LhfResult<Vec<_>>>()?;

            store::verify_canonical(&elements).map_err(|error| LhfError::Snapshot {
                reason: format!("set {position} is not canonical: {error}"),
            })?;
            let (id, cold) = store.intern(elements);
            if !cold || id.index() != position {
                return Err(LhfError::Snapshot {
                    reason: format!("set {position} duplicates set {id}"),
                });
            }
        }

        if store.len() == 0 || !store.contents(SetId::EMPTY).is_empty() {
            return Err(LhfError::Snapshot {
                reason: "identifier 0 must hold the empty set".to_string(),
            });
        }

        let check = |id: SetId| -> LhfResult<SetId> {
            if id.index() < store.len() {
                Ok(id)
            } else {
                Err(LhfError::Snapshot {
                    reason: format!("identifier {id} is out of range"),
                })
            }
        };

        let load_cache = |entries: Vec<((SetId, SetId), SetId)>| -> LhfResult<FxHashMap<(SetId, SetId), SetId>> {
            let mut cache = FxHashMap::default();
            for ((lhs, rhs), result) in entries {
                cache.insert((check(lhs)?, check(rhs)?), check(result)?);
            }
            Ok(cache)
        };

        let unions = load_cache(table.unions)?;
        let intersections = load_cache(table.intersections)?;
        let differences = load_cache(table.differences)?;

        let mut subsets = SubsetCache::default();
        for ((lo, hi), relation) in table.subsets {
            check(lo)?;
            check(hi)?;
            if lo >= hi {
                return Err(LhfError::Snapshot {
                    reason: format!("subset entry ({lo},{hi}) is not in stored order"),
                });
            }
            subsets.insert_fact((lo, hi), relation);
        }

        self.store = store;
        self.unions = unions;
        self.intersections = intersections;
        self.differences = differences;
        self.subsets = subsets;
        self.stats = ForestStats::default();
        Ok(())
    }

    // ---- checks ------------------------------------------------------------

    fn check_id(&self, id: SetId) -> LhfResult<()> {
        if self.store.holds(id) {
            Ok(())
        } else {
            Err(LhfError::BadIdentifier {
                id: id.raw(),
                count: self.store.len(),
            })
        }
    }

    fn check_pair(&self, a: SetId, b: SetId) -> LhfResult<()> {
        self.check_id(a)?;
        self.check_id(b)
    }
}

impl<P: Property, N: Nesting<P>> LatticeOps for LatticeHashForest<P, N> {
    fn apply(&mut self, op: SetOp, a: SetId, b: SetId) -> LhfResult<SetId> {
        match op {
            SetOp::Union => self.set_union(a, b),
            SetOp::Intersection => self.set_intersection(a, b),
            SetOp::Difference => self.set_difference(a, b),
        }
    }
}

fn render_cache(out: &mut String, name: &str, cache: &FxHashMap<(SetId, SetId), SetId>) {
    let entries = sorted_entries(cache);
    let _ = writeln!(out, "    {name}: (Count: {})", entries.len());
    for ((lhs, rhs), result) in entries {
        let _ = writeln!(out, "      {{({lhs},{rhs}) -> {result}}}");
    }
}

fn sorted_entries(
    cache: &FxHashMap<(SetId, SetId), SetId>,
) -> Vec<((SetId, SetId), SetId)> {
    let mut entries: Vec<_> = cache
        .iter()
        .map(|(&pair, &result)| (pair, result))
        .collect();
    entries.sort();
    entries
}
