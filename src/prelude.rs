//! Convenient imports for fastlog.
//!
//! ```ignore
//! use fastlog::prelude::*;
//!
//! let logger = FastLogger::builder().sink(DiscardSink::new(4096)?).build()?;
//! ```

// Main entry point
pub use fastlog_engine::{FastLogger, FastLoggerBuilder, LogCursor, Producer};

// Configuration
pub use fastlog_concurrency::{SequencerKind, WaitingStrategyKind};
pub use fastlog_engine::{DrainStats, DrainerConfig, LoggerConfig};
pub use fastlog_storage::CellStoreKind;

// Error handling
pub use fastlog_core::{Error, Result};

// Records
pub use fastlog_core::{MessageInfo, Record, RecordHeader, RecordKind};

// Sinks
pub use fastlog_durability::{
    DiscardSink, FileSink, MemorySink, MemorySinkHandle, OutputBuffer, RecordReader, Sink,
};
