//! Registration and set-algebra behavior of a flat (non-nested) forest.

use lhf_core::{Element, LatticeHashForest, LhfError, SetId};

type Forest = LatticeHashForest<i32>;

fn intern(forest: &mut Forest, keys: &[i32]) -> SetId {
    forest
        .register_keys(keys.iter().copied())
        .expect("canonical input")
}

fn keys_of(forest: &Forest, id: SetId) -> Vec<i32> {
    forest
        .get(id)
        .expect("valid id")
        .iter()
        .map(|element| *element.key())
        .collect()
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn empty_set_is_identifier_zero() {
    let mut forest = Forest::new();
    // Repetition is intentional.
    assert_eq!(intern(&mut forest, &[]), SetId::EMPTY);
    assert_ne!(intern(&mut forest, &[1, 2, 3, 4]), SetId::EMPTY);
    assert_eq!(intern(&mut forest, &[]), SetId::EMPTY);
    assert_eq!(intern(&mut forest, &[]), SetId::EMPTY);
    assert!(forest.is_empty(SetId::EMPTY));
    assert_eq!(forest.size_of(SetId::EMPTY).unwrap(), 0);
}

#[test]
fn registration_is_consistent() {
    let mut forest = Forest::new();
    assert_eq!(intern(&mut forest, &[1, 2, 3, 4]), intern(&mut forest, &[1, 2, 3, 4]));
    assert_eq!(intern(&mut forest, &[1, 2, 3, 5]), intern(&mut forest, &[1, 2, 3, 5]));
    assert_ne!(intern(&mut forest, &[1, 2, 3, 5]), intern(&mut forest, &[1, 2, 3, 4]));
}

#[test]
fn register_single_matches_full_registration() {
    let mut forest = Forest::new();
    let via_set = intern(&mut forest, &[9]);
    let via_single = forest.register_key_single(9);
    assert_eq!(via_set, via_single);
    assert_eq!(forest.count(), 2);
}

#[test]
fn canonicalize_then_register_accepts_raw_input() {
    let mut forest = Forest::new();
    let raw = vec![3, 1, 2, 3, 1].into_iter().map(Element::new).collect();
    let id = forest.register(Forest::canonicalize(raw)).unwrap();
    assert_eq!(keys_of(&forest, id), vec![1, 2, 3]);
}

#[test]
fn malformed_input_is_rejected_without_side_effects() {
    let mut forest = Forest::new();
    let before = forest.count();

    let unsorted = forest.register_keys([2, 1]);
    assert!(matches!(
        unsorted,
        Err(LhfError::MalformedSet {
            position: 1,
            reason: "keys out of order"
        })
    ));

    let duplicated = forest.register_keys([1, 1, 2]);
    assert!(matches!(
        duplicated,
        Err(LhfError::MalformedSet {
            position: 1,
            reason: "duplicate key"
        })
    ));

    assert_eq!(forest.count(), before);
}

#[test]
fn out_of_range_identifiers_are_rejected() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3, 4]);
    let bogus = SetId::from_raw(99_999_999);

    assert!(matches!(
        forest.get(bogus),
        Err(LhfError::BadIdentifier { .. })
    ));
    assert!(matches!(
        forest.set_union(a, bogus),
        Err(LhfError::BadIdentifier { .. })
    ));
    assert!(matches!(
        forest.set_difference(bogus, a),
        Err(LhfError::BadIdentifier { .. })
    ));

    // A rejected call leaves no trace.
    assert_eq!(forest.count(), 2);
    assert_eq!(forest.stats().unions.misses(), 0);
}

// ============================================================================
// Union
// ============================================================================

#[test]
fn union_of_two_empties_is_empty() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[]);
    let b = intern(&mut forest, &[]);
    assert!(forest.set_union(a, b).unwrap().is_empty());
    assert!(forest.set_intersection(a, b).unwrap().is_empty());
    assert!(forest.set_difference(a, b).unwrap().is_empty());
}

#[test]
fn union_with_empty_returns_the_other_operand() {
    let mut forest = Forest::new();
    let empty = intern(&mut forest, &[]);
    let b = intern(&mut forest, &[1, 2, 3, 5]);

    let result = forest.set_union(empty, b).unwrap();
    assert_eq!(result, b);
    assert_eq!(forest.set_union(b, empty).unwrap(), b);
}

#[test]
fn union_merges_and_interns() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3, 4]);
    let b = intern(&mut forest, &[1, 2, 3, 5]);

    let result = forest.set_union(a, b).unwrap();
    assert_ne!(result, a);
    assert_ne!(result, b);
    assert_eq!(result, intern(&mut forest, &[1, 2, 3, 4, 5]));
    assert_eq!(result, forest.set_union(b, a).unwrap());
}

#[test]
fn union_with_a_superset_returns_the_superset() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3, 4]);
    let c = intern(&mut forest, &[1, 2, 3, 4, 5]);

    assert_eq!(forest.set_union(a, c).unwrap(), c);
    assert_eq!(forest.set_union(c, a).unwrap(), c);
}

#[test]
fn union_is_idempotent() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[4, 8, 15]);
    assert_eq!(forest.set_union(a, a).unwrap(), a);
    assert_eq!(forest.set_intersection(a, a).unwrap(), a);
}

// ============================================================================
// Intersection
// ============================================================================

#[test]
fn intersection_with_empty_is_empty() {
    let mut forest = Forest::new();
    let empty = intern(&mut forest, &[]);
    let b = intern(&mut forest, &[1, 2, 3, 5]);
    assert!(forest.set_intersection(empty, b).unwrap().is_empty());
    assert!(forest.set_intersection(b, empty).unwrap().is_empty());
}

#[test]
fn intersection_keeps_the_common_prefix() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3, 4]);
    let b = intern(&mut forest, &[1, 2, 3, 5]);

    let result = forest.set_intersection(a, b).unwrap();
    assert!(!result.is_empty());
    assert_ne!(result, a);
    assert_ne!(result, b);
    assert_eq!(result, intern(&mut forest, &[1, 2, 3]));
    assert_eq!(result, forest.set_intersection(b, a).unwrap());
}

#[test]
fn intersection_with_a_subset_returns_the_subset() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3, 4]);
    let c = intern(&mut forest, &[1, 2, 3]);
    assert_eq!(forest.set_intersection(a, c).unwrap(), c);
    assert_eq!(forest.set_intersection(c, a).unwrap(), c);
}

// ============================================================================
// Difference
// ============================================================================

#[test]
fn difference_behaves_per_operand_order() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3, 4]);
    let b = intern(&mut forest, &[1, 2, 3, 5]);

    assert_eq!(forest.set_difference(a, b).unwrap(), intern(&mut forest, &[4]));
    assert_eq!(forest.set_difference(b, a).unwrap(), intern(&mut forest, &[5]));
}

#[test]
fn difference_of_equal_operands_is_empty() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3, 4]);
    assert!(forest.set_difference(a, a).unwrap().is_empty());
}

#[test]
fn difference_against_a_superset_is_empty() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3, 4]);
    let c = intern(&mut forest, &[1, 2, 3, 4, 5]);

    assert!(forest.set_difference(a, c).unwrap().is_empty());
    assert_eq!(forest.set_difference(c, a).unwrap(), intern(&mut forest, &[5]));
}

#[test]
fn difference_with_empty_operands() {
    let mut forest = Forest::new();
    let empty = intern(&mut forest, &[]);
    let a = intern(&mut forest, &[7, 9]);

    assert_eq!(forest.set_difference(a, empty).unwrap(), a);
    assert!(forest.set_difference(empty, a).unwrap().is_empty());
}

// ============================================================================
// Single-element wrappers
// ============================================================================

#[test]
fn insert_single_grows_the_set() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 3]);
    let grown = forest.set_insert_single(a, Element::new(2)).unwrap();
    assert_eq!(keys_of(&forest, grown), vec![1, 2, 3]);

    // Inserting a present element is the identity.
    assert_eq!(forest.set_insert_single(grown, Element::new(2)).unwrap(), grown);
}

#[test]
fn remove_single_shrinks_the_set() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3]);
    let shrunk = forest.set_remove_single(a, Element::new(2)).unwrap();
    assert_eq!(keys_of(&forest, shrunk), vec![1, 3]);

    // Removing an absent element is the identity.
    assert_eq!(forest.set_remove_single(shrunk, Element::new(9)).unwrap(), shrunk);
}

#[test]
fn remove_single_by_key_walks_the_set() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3]);
    let shrunk = forest.set_remove_single_by_key(a, &2).unwrap();
    assert_eq!(keys_of(&forest, shrunk), vec![1, 3]);
    assert_eq!(forest.set_remove_single_by_key(a, &9).unwrap(), a);
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn contains_and_find_key_agree_below_the_search_threshold() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[2, 4, 6]);

    assert!(forest.contains(a, &Element::new(4)).unwrap());
    assert!(!forest.contains(a, &Element::new(5)).unwrap());
    assert_eq!(*forest.find_key(a, &4).unwrap().unwrap().key(), 4);
    assert!(forest.find_key(a, &5).unwrap().is_none());
}

#[test]
fn contains_and_find_key_agree_above_the_search_threshold() {
    let mut forest = Forest::new();
    let keys: Vec<i32> = (0..40).map(|k| k * 2).collect();
    let a = intern(&mut forest, &keys);

    for key in &keys {
        assert!(forest.contains(a, &Element::new(*key)).unwrap());
        assert_eq!(*forest.find_key(a, key).unwrap().unwrap().key(), *key);
    }
    assert!(!forest.contains(a, &Element::new(41)).unwrap());
    assert!(forest.find_key(a, &41).unwrap().is_none());
}

#[test]
fn require_key_errors_on_absent_values() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2, 3]);

    assert_eq!(*forest.require_key(a, &2).unwrap().key(), 2);
    assert!(matches!(
        forest.require_key(a, &9),
        Err(LhfError::AbsentValue)
    ));
}

// ============================================================================
// Filter
// ============================================================================

#[test]
fn filter_keeps_matching_elements() {
    let mut forest = Forest::new();
    let mut cache = lhf_core::FilterCache::default();

    let a = intern(&mut forest, &[1, 2, 3, 4, 99, 1002]);
    let small = forest
        .set_filter(a, |element| *element.key() < 5, &mut cache)
        .unwrap();
    assert_eq!(forest.size_of(small).unwrap(), 4);
    assert_eq!(keys_of(&forest, small), vec![1, 2, 3, 4]);

    let b = intern(&mut forest, &[5]);
    let mut other_cache = lhf_core::FilterCache::default();
    let none = forest
        .set_filter(b, |element| *element.key() < 5, &mut other_cache)
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn filter_of_empty_is_empty() {
    let mut forest = Forest::new();
    let mut cache = lhf_core::FilterCache::default();
    let result = forest
        .set_filter(SetId::EMPTY, |_| true, &mut cache)
        .unwrap();
    assert!(result.is_empty());
    assert!(cache.is_empty());
}

// ============================================================================
// Reporting
// ============================================================================

#[test]
fn dump_reports_all_four_tables() {
    let mut forest = Forest::new();
    let a = intern(&mut forest, &[1, 2]);
    let b = intern(&mut forest, &[2, 3]);
    forest.set_union(a, b).unwrap();
    forest.set_intersection(a, b).unwrap();
    forest.set_difference(a, b).unwrap();

    let dump = forest.dump();
    assert!(dump.contains("Unions: (Count: 1)"));
    assert!(dump.contains("Intersections: (Count: 1)"));
    assert!(dump.contains("Differences: (Count: 1)"));
    assert!(dump.contains("Subsets:"));
    assert!(dump.contains("PropertySets:"));
    assert!(dump.contains("{ 1 2 }"));

    // Deterministic for a given state.
    assert_eq!(dump, forest.dump());
}
