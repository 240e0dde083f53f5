//! Crate-level error type.
//!
//! Registry operations themselves never fail: inserting always succeeds and a
//! query over a label pair that was never observed is answered with an empty
//! histogram. Errors only surface at the edges, when a snapshot is encoded or
//! decoded, or when a histogram is asked for a quantile outside `[0, 1]`.
//!
//! # Example
//!
//! ```rust
//! use hmsketch::{Error, LogLinear, Registry};
//!
//! let err = Registry::<LogLinear>::deserialize(&[0xde, 0xad]).unwrap_err();
//! assert!(matches!(err, Error::Decode(_)));
//! ```

use thiserror::Error;

/// Unified error type for snapshot and histogram operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The snapshot bytes could not be decoded (truncated or malformed).
    #[error("decode error: {0}")]
    Decode(#[source] bincode::Error),

    /// The registry could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[source] bincode::Error),

    /// The snapshot decoded cleanly but describes an impossible registry.
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),

    /// A quantile was requested outside of `[0, 1]`.
    #[error("quantile outside of range [0,1]")]
    QuantileOutOfBounds,
}

/// Result type for fallible crate operations.
pub type Result<T> = std::result::Result<T, Error>;
