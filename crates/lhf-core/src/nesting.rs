//! Nesting harness: leaf forests and fixed-arity child composition.
//!
//! A nested forest's elements each carry one child-set identifier per child
//! position. When a kernel merges two elements with equal keys, it builds
//! the result element by applying the same operation pointwise across the
//! child tuples, recursing into each child forest through its shared handle.
//! The harness is purely structural: it neither caches nor short-circuits —
//! all memoization happens inside each child forest's own tables.
//!
//! The number and types of children are part of a forest's static identity.
//! `Leaf` is the non-nested case; `Nested<(C0, …)>` is implemented for child
//! tuples of arity 1 through 4.

use std::fmt::Debug;
use std::marker::PhantomData;

use crate::errors::LhfResult;
use crate::id::SetId;
use crate::property::Property;
use crate::shared::Shared;

/// A lattice operation, as dispatched through the harness into children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersection,
    Difference,
}

/// Dispatch surface the harness uses to drive a child forest.
pub trait LatticeOps {
    fn apply(&mut self, op: SetOp, a: SetId, b: SetId) -> LhfResult<SetId>;
}

/// Static description of a forest's child structure.
pub trait Nesting<P: Property> {
    const IS_NESTED: bool;
    const ARITY: usize;

    /// The per-element child identifier tuple.
    type Ids: Clone + PartialEq + Debug;

    /// The tuple of shared handles to child forests.
    type Refs: Clone;

    /// Pointwise child operation for a key-equal merge event.
    fn combine(
        op: SetOp,
        refs: &Self::Refs,
        lhs: &Self::Ids,
        rhs: &Self::Ids,
    ) -> LhfResult<Self::Ids>;

    /// Flattens a child tuple to a vector, in declaration order.
    fn ids_to_vec(ids: &Self::Ids) -> Vec<SetId>;

    /// Rebuilds a child tuple from a flattened slice; `None` on arity
    /// mismatch.
    fn ids_from_slice(ids: &[SetId]) -> Option<Self::Ids>;

    /// Human-readable form of a child tuple, used by `dump`.
    fn render(ids: &Self::Ids) -> String;
}

/// Non-nested marker: elements are bare keys.
pub enum Leaf {}

impl<P: Property> Nesting<P> for Leaf {
    const IS_NESTED: bool = false;
    const ARITY: usize = 0;

    type Ids = ();
    type Refs = ();

    fn combine(_op: SetOp, _refs: &(), _lhs: &(), _rhs: &()) -> LhfResult<()> {
        Ok(())
    }

    fn ids_to_vec(_ids: &()) -> Vec<SetId> {
        Vec::new()
    }

    fn ids_from_slice(ids: &[SetId]) -> Option<()> {
        ids.is_empty().then_some(())
    }

    fn render(_ids: &()) -> String {
        String::new()
    }
}

/// Nested marker: `C` is a tuple of child forest types. Each element of the
/// parent forest carries one child-set identifier per tuple position, and
/// the parent holds one shared handle per position (the same handle may
/// appear more than once).
pub struct Nested<C> {
    _children: PhantomData<C>,
}

macro_rules! impl_nesting_for_tuple {
    ($arity:literal; $($C:ident => $idx:tt),+) => {
        impl<P: Property, $($C: LatticeOps),+> Nesting<P> for Nested<($($C,)+)> {
            const IS_NESTED: bool = true;
            const ARITY: usize = $arity;

            type Ids = ($(impl_nesting_for_tuple!(@id $C),)+);
            type Refs = ($(Shared<$C>,)+);

            // Each child is locked and released in its own statement: the
            // same handle may sit at several positions, and a guard held
            // across the whole tuple expression would alias it.
            #[allow(non_snake_case)]
            fn combine(
                op: SetOp,
                refs: &Self::Refs,
                lhs: &Self::Ids,
                rhs: &Self::Ids,
            ) -> LhfResult<Self::Ids> {
                $(
                    let $C = {
                        let mut child = refs.$idx.write();
                        child.apply(op, lhs.$idx, rhs.$idx)?
                    };
                )+
                Ok(($($C,)+))
            }

            fn ids_to_vec(ids: &Self::Ids) -> Vec<SetId> {
                vec![$(ids.$idx),+]
            }

            fn ids_from_slice(ids: &[SetId]) -> Option<Self::Ids> {
                if ids.len() != $arity {
                    return None;
                }
                Some(($(ids[$idx],)+))
            }

            fn render(ids: &Self::Ids) -> String {
                let parts: Vec<String> = vec![$(ids.$idx.raw().to_string()),+];
                format!("[ {} ]", parts.join(" "))
            }
        }
    };
    (@id $C:ident) => { SetId };
}

impl_nesting_for_tuple!(1; C0 => 0);
impl_nesting_for_tuple!(2; C0 => 0, C1 => 1);
impl_nesting_for_tuple!(3; C0 => 0, C1 => 1, C2 => 2);
impl_nesting_for_tuple!(4; C0 => 0, C1 => 1, C2 => 2, C3 => 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_round_trips_empty_id_list() {
        assert_eq!(<Leaf as Nesting<i32>>::ids_to_vec(&()), Vec::new());
        assert!(<Leaf as Nesting<i32>>::ids_from_slice(&[]).is_some());
        assert!(<Leaf as Nesting<i32>>::ids_from_slice(&[SetId::EMPTY]).is_none());
    }
}
