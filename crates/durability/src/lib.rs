//! Sink boundary for fastlog
//!
//! This crate implements the consumer-facing end of the logging pipeline:
//! - Sink: reusable output buffer + flush/close, fed by the drainer
//! - OutputBuffer: fixed-capacity buffer of big-endian 64-bit words
//! - MemorySink / DiscardSink / FileSink: sink adapters
//! - RecordReader: decodes a flushed word stream back into records

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod file;
pub mod reader;
pub mod sink;

pub use file::FileSink;
pub use reader::RecordReader;
pub use sink::{
    DiscardSink, MemorySink, MemorySinkHandle, OutputBuffer, Sink, DEFAULT_BUFFER_BYTES,
    WORD_BYTES,
};
