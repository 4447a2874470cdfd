//! Error types shared by the list and the caches.

use thiserror::Error;

/// Errors returned by [`RecencyList`](crate::RecencyList) and the caches.
///
/// Every variant is an ordinary, recoverable result. A broken internal
/// invariant (index and list out of sync) is not represented here: it panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("collection is empty")]
    IsEmpty,

    #[error("not found")]
    NotFound,

    #[error("index {index} is out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, CollectionError>;

/// Aborts on a structural invariant violation.
///
/// Reaching this means the list and whatever indexes into it disagree, so
/// continuing would corrupt the structure permanently.
#[cold]
#[track_caller]
pub(crate) fn invariant_violation(detail: std::fmt::Arguments<'_>) -> ! {
    tracing::error!(%detail, "internal invariant violated");
    panic!("internal invariant violated: {detail}");
}
