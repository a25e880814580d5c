//! Error types for the **pebblechain** core crate.
//!
//! All high-level operations return [`crate::Result`], a convenient alias for
//! `core::result::Result<T, Error>`.
//!
//! The enum is intentionally minimal and high-level. Lower-level errors are
//! mapped into one of these variants before bubbling up to callers.
//!
//! # Examples
//!
//! ```
//! use pebblechain_core::{Error, Result};
//!
//! fn demo_fn(fail: bool) -> Result<()> {
//!     if fail {
//!         Err(Error::InvalidSignature)
//!     } else {
//!         Ok(())
//!     }
//! }
//! ```

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Signature absent, or recovery yields an address that does not match
    /// the claimed sender/miner.
    #[error("signature verification failed")]
    InvalidSignature,

    /// Hash mismatch, insufficient difficulty, or index/previous-hash/
    /// timestamp disagreement with the chain head.
    #[error("invalid block: {0}")]
    InvalidBlock(&'static str),

    /// A whole chain failed [`crate::chain::Chain::is_valid`].
    #[error("invalid chain: {0}")]
    InvalidChain(&'static str),

    /// A wire frame failed to parse, or was missing an expected field.
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    /// A local operation (submit, mine, snapshot) was attempted before any
    /// chain exists.
    #[error("no blockchain yet")]
    NoChain,

    /// Wallet file persistence or socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Placeholder for errors originating from external crates.
    #[error("{0}")]
    Other(&'static str),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
