//! Typed error taxonomy for the store.
//!
//! All fallible paths return `anyhow::Result`; the variants below ride inside
//! `anyhow::Error` so call sites keep `.with_context(...)` chains while callers
//! that care can still match the kind via `downcast_ref::<StoreError>()` (or
//! the `is_*` helpers, which walk the whole context chain).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Key absent or tombstoned (get/delete).
    #[error("key not found")]
    NotFound,

    /// Magic/version mismatch, truncated or corrupt header, unexpected codec id.
    #[error("format error: {0}")]
    Format(String),

    /// Exclusive file lock unavailable — another writer session is active.
    #[error("lock error: {0}")]
    Lock(String),

    /// Codec encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A record or position exceeds its configured field width.
    #[error("capacity exceeded: {0}")]
    Capacity(String),
}

fn kind_matches(err: &anyhow::Error, f: impl Fn(&StoreError) -> bool) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<StoreError>().map_or(false, &f))
}

/// True if a `StoreError::NotFound` sits anywhere in the error chain.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    kind_matches(err, |e| matches!(e, StoreError::NotFound))
}

pub fn is_format(err: &anyhow::Error) -> bool {
    kind_matches(err, |e| matches!(e, StoreError::Format(_)))
}

pub fn is_lock(err: &anyhow::Error) -> bool {
    kind_matches(err, |e| matches!(e, StoreError::Lock(_)))
}

pub fn is_serialization(err: &anyhow::Error) -> bool {
    kind_matches(err, |e| matches!(e, StoreError::Serialization(_)))
}

pub fn is_capacity(err: &anyhow::Error) -> bool {
    kind_matches(err, |e| matches!(e, StoreError::Capacity(_)))
}
