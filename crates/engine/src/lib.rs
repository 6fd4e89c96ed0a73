//! Logging engine for fastlog
//!
//! This crate ties the lower layers into a logger:
//! - MessageCatalog: interns format strings to sequential ids
//! - LogCursor / Producer: claim, fill and publish one record
//! - RecordDrainer / DrainerThread: the single consumer feeding a sink
//! - LoggerConfig: serde configuration of every component
//! - FastLogger: the facade producers and the application talk to
//!
//! # Architecture
//!
//! ```text
//! producer threads                         drainer thread
//! ----------------                         --------------
//! catalog.lookup(format)
//! cursor.start()    -- claim argc+1 --->   ring.drain_to(drainer)
//! cursor.with(..)   -- plain writes         observe header (Acquire)
//! cursor.submit()   -- header (Release)     copy words to sink, clear cells
//!                                           head += reclaimed (Release)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod cursor;
pub mod drainer;
pub mod logger;

pub use catalog::{MessageCatalog, DEFAULT_CATALOG_CAPACITY};
pub use config::{LoggerConfig, DEFAULT_CAPACITY};
pub use cursor::{publish_timestamp, ClaimLease, LogArgument, LogCursor, Producer};
pub use drainer::{
    next_idle_period, DrainStats, DrainerConfig, DrainerThread, NamedThreadFactory,
    RecordDrainer, SpawnError, ThreadFactory,
};
pub use logger::{FastLogger, FastLoggerBuilder};
