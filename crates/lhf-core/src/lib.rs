//! # lhf-core
//!
//! An in-memory engine for interning sorted sets and memoizing their lattice
//! operations. Distinct set contents get stable, dense identifiers; equal
//! contents always reuse the same identifier, so set equality reduces to an
//! integer comparison. Union, intersection, and difference are cached per
//! operand-identifier pair, results are themselves interned, and containment
//! facts discovered along the way let later operations short-circuit without
//! a merge pass.
//!
//! ## Building blocks
//!
//! - [`LatticeHashForest`] — the store, the operation caches, and the subset
//!   cache behind one set-algebra API
//! - [`Property`] — the caller-supplied key contract (ordering, equality,
//!   hash, printing)
//! - [`Element`] / [`Nesting`] — set elements, optionally carrying a
//!   fixed-arity tuple of identifiers into child forests ([`Leaf`] for the
//!   flat case, [`Nested`] for composition)
//! - [`Shared`] — the child-forest handle; `Rc<RefCell<_>>` by default,
//!   lock-protected with the `concurrent` feature
//! - [`ForestSnapshot`] — persisted form of a forest and all reachable
//!   children
//!
//! ## Guarantees
//!
//! 1. **Identity**: `register(S) == register(S')` iff `S` and `S'` are equal
//!    canonical sets; identifier 0 is always the empty set.
//! 2. **Stability**: stored contents never move or change for the lifetime
//!    of the instance; the store only grows.
//! 3. **Memoization**: each operation on an identifier pair is computed at
//!    most once; repeats are cache hits, observable in [`ForestStats`].

pub mod config;
pub mod element;
pub mod errors;
pub mod forest;
pub mod hash;
pub mod nesting;
pub mod property;
pub mod shared;
pub mod snapshot;
pub mod stats;
pub mod subsets;

mod id;
mod store;

pub use element::Element;
pub use errors::{LhfError, LhfResult};
pub use forest::{FilterCache, LatticeHashForest};
pub use id::SetId;
pub use nesting::{LatticeOps, Leaf, Nested, Nesting, SetOp};
pub use property::Property;
pub use shared::Shared;
pub use snapshot::{ForestSnapshot, SnapshotKey, SnapshotNesting, Snapshotable, TableSnapshot};
pub use stats::{ForestStats, OpCounters};
pub use subsets::SubsetRelation;
