//! The logger facade
//!
//! [`FastLogger`] owns the ring, the catalog and, once draining starts, the
//! drainer thread. Producers either take a one-shot cursor per call with
//! [`FastLogger::message`] or register a reusable [`Producer`] once per
//! thread with [`FastLogger::register_producer`].
//!
//! With [`SequencerKind::SingleClaimer`] only one producer or cursor may be
//! alive at a time; the others are refused with [`Error::Configuration`].

use crate::catalog::MessageCatalog;
use crate::config::LoggerConfig;
use crate::cursor::{publish_timestamp, ClaimLease, LogCursor, Producer};
use crate::drainer::{
    DrainStats, DrainerConfig, DrainerThread, NamedThreadFactory, RecordDrainer, ThreadFactory,
};
use fastlog_concurrency::{RingBuffer, SequencerKind, WaitingStrategyKind};
use fastlog_core::{Error, MessageInfo, Result, NOT_SET};
use fastlog_durability::Sink;
use fastlog_storage::{CellStore, CellStoreKind};
use parking_lot::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Low-latency logger over a lock-free ring
///
/// # Example
///
/// ```ignore
/// use fastlog::prelude::*;
///
/// let logger = FastLogger::builder()
///     .capacity(1 << 12)
///     .sink(MemorySink::new(64 * 1024)?)
///     .build()?;
/// logger.start_draining()?;
///
/// logger.message("took %d us (%f%%)")?
///     .start()?
///     .with(250i64)?
///     .with(12.5)?
///     .submit()?;
///
/// let stats = logger.stop_draining()?;
/// ```
pub struct FastLogger {
    ring: Arc<RingBuffer>,
    catalog: Arc<MessageCatalog>,
    config: LoggerConfig,
    factory: Arc<dyn ThreadFactory>,
    sink: Mutex<Option<Box<dyn Sink>>>,
    drainer: Mutex<Option<DrainerThread>>,
    // Set when the ring admits one claimer only.
    claimer: Option<Arc<AtomicBool>>,
}

impl FastLogger {
    /// Create a builder with default settings.
    pub fn builder() -> FastLoggerBuilder {
        FastLoggerBuilder::new()
    }

    /// Interned entry for `format`
    pub fn lookup(&self, format: &str) -> Result<Arc<MessageInfo>> {
        self.catalog.lookup(format)
    }

    /// One-shot cursor for `format`; call `start` before adding arguments.
    ///
    /// On a single-claimer ring the cursor holds the claim lease until it is
    /// dropped.
    pub fn message(&self, format: &str) -> Result<LogCursor> {
        let lease = self.lease()?;
        let message = self.catalog.lookup(format)?;
        Ok(LogCursor::new(Arc::clone(&self.ring), message).leased(lease))
    }

    /// Reusable cursor handle for the calling thread.
    ///
    /// On a single-claimer ring a second registration fails while the first
    /// producer is alive.
    pub fn register_producer(&self) -> Result<Producer> {
        let lease = self.lease()?;
        Ok(Producer::new(
            Arc::clone(&self.ring),
            Arc::clone(&self.catalog),
            lease,
        ))
    }

    /// Publish a timestamp record carrying `nanos`.
    ///
    /// On a single-claimer ring with a live producer, use
    /// [`Producer::timestamp`] instead.
    pub fn timestamp(&self, nanos: u64) -> Result<()> {
        let _lease = self.lease()?;
        publish_timestamp(&self.ring, nanos)
    }

    /// Publish a timestamp record with the wall clock in nanoseconds since
    /// the Unix epoch.
    pub fn timestamp_now(&self) -> Result<()> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        self.timestamp(nanos)
    }

    /// Spawn the drainer thread.
    ///
    /// A repeated call while draining is ignored. The sink is handed to the
    /// drainer and closed when it stops, so draining can be started once.
    pub fn start_draining(&self) -> Result<()> {
        let mut drainer = self.drainer.lock();
        if drainer.is_some() {
            warn!("ignoring repeated start_draining() call");
            return Ok(());
        }
        let sink = self
            .sink
            .lock()
            .take()
            .ok_or_else(|| Error::config("sink already consumed by an earlier drainer"))?;

        let config = self.config.drainer.clone();
        let record_drainer = RecordDrainer::new(Arc::clone(&self.ring), sink, config.spins_per_cycle);
        match DrainerThread::try_spawn(self.factory.as_ref(), record_drainer, config) {
            Ok(thread) => {
                *drainer = Some(thread);
                Ok(())
            }
            Err(failed) => {
                // Keep the sink so a later start can retry.
                if let Some(returned) = failed.drainer {
                    *self.sink.lock() = Some(returned.into_sink());
                }
                Err(failed.error)
            }
        }
    }

    /// Stop the drainer thread and return its counters.
    ///
    /// Without a running drainer this returns empty counters.
    pub fn stop_draining(&self) -> Result<DrainStats> {
        let thread = self.drainer.lock().take();
        match thread {
            Some(thread) => thread.stop(),
            None => Ok(DrainStats::default()),
        }
    }

    fn lease(&self) -> Result<Option<ClaimLease>> {
        self.claimer.as_ref().map(ClaimLease::acquire).transpose()
    }

    /// True while a drainer thread is running
    pub fn is_draining(&self) -> bool {
        self.drainer
            .lock()
            .as_ref()
            .is_some_and(DrainerThread::is_running)
    }

    /// The ring buffer
    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    /// The message catalog
    pub fn catalog(&self) -> &Arc<MessageCatalog> {
        &self.catalog
    }

    /// Configuration the logger was built with
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }
}

impl Drop for FastLogger {
    fn drop(&mut self) {
        if let Some(thread) = self.drainer.get_mut().take() {
            match thread.stop() {
                Ok(stats) => info!(records = stats.records, "logger dropped, drainer stopped"),
                Err(e) => warn!(error = %e, "logger dropped, drainer failed"),
            }
        }
    }
}

impl std::fmt::Debug for FastLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastLogger")
            .field("ring", &self.ring)
            .field("catalog", &self.catalog)
            .field("draining", &self.is_draining())
            .finish()
    }
}

/// Builder for [`FastLogger`]
///
/// # Example
///
/// ```ignore
/// // Any number of producers, fail fast when the ring is full
/// let logger = FastLogger::builder()
///     .capacity(1 << 14)
///     .waiting(WaitingStrategyKind::NoWait)
///     .sink(FileSink::open("app.log.bin", 64 * 1024)?)
///     .build()?;
///
/// // Everything from a config file
/// let logger = FastLogger::builder()
///     .config(serde_json::from_str(&text)?)
///     .sink(DiscardSink::new(4096)?)
///     .build()?;
/// ```
pub struct FastLoggerBuilder {
    config: LoggerConfig,
    sink: Option<Box<dyn Sink>>,
    cells: Option<Box<dyn CellStore>>,
    factory: Option<Arc<dyn ThreadFactory>>,
}

impl FastLoggerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            sink: None,
            cells: None,
            factory: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    /// Ring capacity in cells (a power of two).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Claim protocol.
    pub fn sequencer(mut self, sequencer: SequencerKind) -> Self {
        self.config.sequencer = sequencer;
        self
    }

    /// Cell store implementation.
    pub fn cells(mut self, cells: CellStoreKind) -> Self {
        self.config.cells = cells;
        self
    }

    /// Use an already built cell store instead of [`CellStoreKind`].
    ///
    /// Its length becomes the capacity. The store should be filled with
    /// `NOT_SET`.
    pub fn cell_store(mut self, cells: Box<dyn CellStore>) -> Self {
        self.config.capacity = cells.length();
        self.cells = Some(cells);
        self
    }

    /// Backoff for claims finding the ring full.
    pub fn waiting(mut self, waiting: WaitingStrategyKind) -> Self {
        self.config.waiting = waiting;
        self
    }

    /// Message catalog slots.
    pub fn catalog_capacity(mut self, capacity: usize) -> Self {
        self.config.catalog_capacity = capacity;
        self
    }

    /// Drainer tuning.
    pub fn drainer(mut self, drainer: DrainerConfig) -> Self {
        self.config.drainer = drainer;
        self
    }

    /// Where drained records go. Required.
    pub fn sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// How the drainer thread is created.
    pub fn thread_factory(mut self, factory: impl ThreadFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Build the logger. Draining does not start until
    /// [`FastLogger::start_draining`].
    pub fn build(self) -> Result<FastLogger> {
        let config = self.config;
        config.validate()?;
        let sink = self
            .sink
            .ok_or_else(|| Error::config("a sink is required to build a logger"))?;

        let cells = match self.cells {
            Some(cells) => cells,
            None => config.cells.build(config.capacity, NOT_SET)?,
        };
        let sequencer = config.sequencer.build(config.capacity)?;
        let ring = RingBuffer::new(sequencer, cells, config.waiting.build())?;
        let catalog = MessageCatalog::new(config.catalog_capacity)?;
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(NamedThreadFactory::new()));

        info!(
            capacity = config.capacity,
            sequencer = ?config.sequencer,
            cells = ?config.cells,
            "logger built"
        );
        let claimer = (config.sequencer == SequencerKind::SingleClaimer)
            .then(|| Arc::new(AtomicBool::new(false)));
        Ok(FastLogger {
            ring: Arc::new(ring),
            catalog: Arc::new(catalog),
            config,
            factory,
            sink: Mutex::new(Some(sink)),
            drainer: Mutex::new(None),
            claimer,
        })
    }
}

impl Default for FastLoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
