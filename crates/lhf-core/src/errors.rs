//! Error types for the lattice hash forest.

/// Result alias used across the crate.
pub type LhfResult<T> = Result<T, LhfError>;

/// Failure kinds surfaced by forest operations.
///
/// Validation always precedes mutation, so an error never leaves a cache in
/// a partially updated state.
#[derive(Debug, thiserror::Error)]
pub enum LhfError {
    #[error("set identifier {id} is out of range: store holds {count} sets")]
    BadIdentifier { id: u32, count: usize },

    #[error("set is not canonical at position {position}: {reason}")]
    MalformedSet { position: usize, reason: &'static str },

    #[error("refusing to record a subset relation between identical identifiers ({id})")]
    EqualIdentifiers { id: u32 },

    #[error("tried to access an absent value; a presence check is likely missing")]
    AbsentValue,

    #[error("snapshot payload is malformed: {reason}")]
    Snapshot { reason: String },
}
