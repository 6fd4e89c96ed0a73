//! # fastlog
//!
//! Low-latency binary logging over a lock-free circular store of 64-bit
//! cells, shared by any number of producer threads and one drainer thread.
//!
//! ## Quick Start
//!
//! ```ignore
//! use fastlog::prelude::*;
//!
//! let logger = FastLogger::builder()
//!     .capacity(1 << 14)
//!     .sink(FileSink::open("app.records", 64 * 1024)?)
//!     .build()?;
//! logger.start_draining()?;
//!
//! // One-shot cursor
//! logger.message("request took %d us")?.start()?.with(250i64)?.submit()?;
//!
//! // Reusable per-thread cursor
//! let mut producer = logger.register_producer()?;
//! producer.log("cpu=%f load=%d")?.with(0.75)?.with(3i64)?.submit()?;
//!
//! let stats = logger.stop_draining()?;
//! ```
//!
//! ## Record protocol
//!
//! A record is `argument_count + 1` consecutive cells. The producer claims
//! them, writes the arguments with plain stores and publishes the header
//! with a Release store. The drainer reads the header with Acquire ordering,
//! copies the record to its sink as big-endian words and clears the cells.
//!
//! ## Layers
//!
//! - [`fastlog_core`]: errors, header codec, message metadata
//! - [`fastlog_storage`]: cell stores (checked, unchecked, memory-mapped)
//! - [`fastlog_concurrency`]: waiting strategies, sequencers, ring buffer
//! - [`fastlog_durability`]: sink boundary, sink adapters, record reader
//! - [`fastlog_engine`]: catalog, cursors, drainer, logger facade

#![warn(missing_docs)]

pub mod prelude;

// Re-export main entry points
pub use fastlog_core::{Error, Result};
pub use fastlog_engine::{FastLogger, FastLoggerBuilder, LoggerConfig};
