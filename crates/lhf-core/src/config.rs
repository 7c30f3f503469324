//! Build-time constants.

/// At or below this set size, `contains` and `find_key` use a linear scan;
/// above it they switch to binary search.
pub const BINARY_SEARCH_THRESHOLD: usize = 12;

/// Version string embedded in snapshots.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
