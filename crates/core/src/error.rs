//! Unified error types for fastlog.
//!
//! Only genuine misuse or corruption surfaces as an [`Error`]. Ordinary
//! contention on the hot path is reported through return values (a claim
//! that cannot be satisfied yields `None`), never through this type.

use thiserror::Error;

/// All fastlog errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid construction parameters or a missing collaborator
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The waiting strategy gave up before `size` cells became free
    #[error("claim of {size} cells exhausted")]
    ClaimExhausted {
        /// Number of cells requested
        size: usize,
    },

    /// A drain callback reported a reclaimed count outside `[0, available]`
    ///
    /// The head/tail accounting is already broken when this fires.
    #[error("sequencer state violation: can't reclaim {reclaimed} cells, only [0,{available}] available")]
    SequencerStateViolation {
        /// Count reported by the drain callback
        reclaimed: u64,
        /// Size of the claimed range handed to the callback
        available: u64,
    },

    /// Every slot of the message catalog is taken by another format
    #[error("message catalog overflow: all {capacity} slots in use")]
    CatalogOverflow {
        /// Fixed slot count of the catalog
        capacity: usize,
    },

    /// Log cursor used out of order (`with`/`submit` before `start`, double `start`)
    #[error("cursor state error: {0}")]
    CursorState(String),

    /// Header carries a kind this build does not know
    #[error("unknown record kind {kind}")]
    UnknownRecordKind {
        /// Raw 16-bit kind field
        kind: u16,
    },

    /// Format string can't be interned
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Record stream is truncated or malformed
    #[error("corruption: {0}")]
    Corruption(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fastlog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for [`Error::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }

    /// Shorthand for [`Error::CursorState`].
    pub fn cursor(msg: impl Into<String>) -> Self {
        Error::CursorState(msg.into())
    }

    /// Check if this error is retryable.
    ///
    /// A failed claim may succeed once the drainer has reclaimed cells; a
    /// sink I/O failure may clear on the next flush.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ClaimExhausted { .. } | Error::Io(_))
    }

    /// Check if this error leaves the owning instance unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SequencerStateViolation { .. } | Error::CatalogOverflow { .. }
        )
    }

    /// Check if this error signals damaged record data.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::UnknownRecordKind { .. } | Error::Corruption(_))
    }
}
