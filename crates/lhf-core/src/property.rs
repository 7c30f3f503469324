//! The caller-supplied property contract.
//!
//! A forest never inspects keys directly; ordering, equality, hashing, and
//! printing all go through this trait. Implementations are provided for the
//! primitive types the engine is commonly instantiated with; user-defined
//! key types implement the trait themselves to supply a custom ordering or
//! hash (for example, ordering complex numbers by magnitude).

use std::fmt::Debug;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Capability bundle for an element key type.
///
/// `key_less` must be a strict weak ordering, and `key_equal` must be
/// consistent with it (`a == b` iff neither is less than the other). The
/// engine treats all three functions as pure, total, and deterministic.
pub trait Property: Clone + Debug {
    /// Strict weak ordering over keys.
    fn key_less(&self, other: &Self) -> bool;

    /// Key equality, consistent with `key_less`.
    fn key_equal(&self, other: &Self) -> bool {
        !self.key_less(other) && !other.key_less(self)
    }

    /// Deterministic key hash, folded into set content hashes.
    fn key_hash(&self) -> u64;

    /// Human-readable form used by `dump`.
    fn render(&self) -> String {
        format!("{:?}", self)
    }
}

fn fx_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

macro_rules! impl_property_via_ord {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Property for $ty {
                fn key_less(&self, other: &Self) -> bool {
                    self < other
                }

                fn key_equal(&self, other: &Self) -> bool {
                    self == other
                }

                fn key_hash(&self) -> u64 {
                    fx_hash(self)
                }
            }
        )+
    };
}

impl_property_via_ord!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, char,
);

impl Property for String {
    fn key_less(&self, other: &Self) -> bool {
        self < other
    }

    fn key_equal(&self, other: &Self) -> bool {
        self == other
    }

    fn key_hash(&self) -> u64 {
        fx_hash(self.as_str())
    }

    fn render(&self) -> String {
        self.clone()
    }
}

impl Property for &'static str {
    fn key_less(&self, other: &Self) -> bool {
        self < other
    }

    fn key_equal(&self, other: &Self) -> bool {
        self == other
    }

    fn key_hash(&self) -> u64 {
        fx_hash(*self)
    }

    fn render(&self) -> String {
        (*self).to_string()
    }
}

// Floats use the IEEE 754 total order, which is a valid strict weak ordering
// even in the presence of NaN, and hash their bit patterns.

impl Property for f32 {
    fn key_less(&self, other: &Self) -> bool {
        self.total_cmp(other).is_lt()
    }

    fn key_equal(&self, other: &Self) -> bool {
        self.total_cmp(other).is_eq()
    }

    fn key_hash(&self) -> u64 {
        fx_hash(&self.to_bits())
    }
}

impl Property for f64 {
    fn key_less(&self, other: &Self) -> bool {
        self.total_cmp(other).is_lt()
    }

    fn key_equal(&self, other: &Self) -> bool {
        self.total_cmp(other).is_eq()
    }

    fn key_hash(&self) -> u64 {
        fx_hash(&self.to_bits())
    }
}
