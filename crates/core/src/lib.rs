//! Core types for fastlog
//!
//! This crate defines the vocabulary shared by every other fastlog crate:
//! - Error: the canonical error enum and `Result` alias
//! - record: bit-packed record header codec and the `NOT_SET` sentinel
//! - message: interned format metadata (`MessageInfo`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod message;
pub mod record;

pub use error::{Error, Result};
pub use message::{count_placeholders, MessageInfo};
pub use record::{Record, RecordHeader, RecordKind, NOT_SET};
