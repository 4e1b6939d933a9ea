//! Error types for tilia.

use thiserror::Error;

/// Result type alias using [`TreeError`].
pub type Result<T> = core::result::Result<T, TreeError>;

/// Errors reported by [`BPlusTreeMap`](crate::BPlusTreeMap) operations.
///
/// Every failing operation leaves the map exactly as it was.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum TreeError {
    /// `insert` was called with a key that is already bound.
    #[error("duplicate key")]
    DuplicateKey,

    /// `search` or `remove` was called with a key that is not bound.
    #[error("key not found")]
    KeyNotFound,

    /// The requested branching order is too small to form a valid tree.
    #[error("invalid order: {order} (minimum is 3)")]
    InvalidOrder {
        /// The rejected order.
        order: usize,
    },
}
