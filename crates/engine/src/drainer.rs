//! The single consumer
//!
//! [`RecordDrainer`] is the [`Drain`] callback: it scans the claimed range,
//! copies every published record to a [`Sink`] and clears the cells it
//! consumed. [`DrainerThread`] runs it in a loop on a dedicated thread.
//!
//! # One drain cycle
//!
//! ```text
//! pos = start
//! while pos < sentinel:
//!     h = observe(pos)              spin while unpublished, budget shared
//!     budget gone  -> stop          the suffix is retried next cycle
//!     overruns sentinel -> stop     corruption reported, cells kept
//!     unknown kind -> skip record   counted as corrupted
//!     room < cells*8 -> flush sink  failure -> stop, record kept
//!     copy header + arguments, set each cell to NOT_SET
//! return pos - start
//! ```

use fastlog_concurrency::{Drain, RingBuffer};
use fastlog_core::record::{argument_count, is_valid_header, raw_kind};
use fastlog_core::{Error, RecordHeader, Result, NOT_SET};
use fastlog_durability::{Sink, WORD_BYTES};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Drainer tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrainerConfig {
    /// Header re-reads allowed per cycle while waiting for a publication
    pub spins_per_cycle: u32,
    /// Shortest pause between cycles
    pub idle_min: Duration,
    /// Longest pause between cycles
    pub idle_max: Duration,
    /// Keep draining after a stop request until the ring is empty
    pub drain_on_shutdown: bool,
    /// Name of the drainer thread
    pub thread_name: String,
}

impl Default for DrainerConfig {
    fn default() -> Self {
        Self {
            spins_per_cycle: 256,
            idle_min: Duration::from_millis(1),
            idle_max: Duration::from_millis(100),
            drain_on_shutdown: true,
            thread_name: "fastlog-drainer".to_string(),
        }
    }
}

impl DrainerConfig {
    /// Check the idle bounds.
    pub fn validate(&self) -> Result<()> {
        if self.idle_min > self.idle_max {
            return Err(Error::config(format!(
                "drainer idle_min {:?} exceeds idle_max {:?}",
                self.idle_min, self.idle_max
            )));
        }
        Ok(())
    }
}

/// Counters accumulated by a drainer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainStats {
    /// Drain cycles run
    pub cycles: u64,
    /// Records forwarded to the sink
    pub records: u64,
    /// Cells reclaimed, corrupted and oversized records included
    pub cells: u64,
    /// Records skipped because their header did not decode
    pub corrupted: u64,
    /// Records dropped because they exceed the sink buffer
    pub oversized: u64,
    /// Flush or close failures
    pub sink_failures: u64,
}

/// [`Drain`] callback copying published records into a sink
pub struct RecordDrainer<S> {
    ring: Arc<RingBuffer>,
    sink: S,
    spins_per_cycle: u32,
    stats: DrainStats,
    failure: Option<Error>,
}

impl<S: Sink> RecordDrainer<S> {
    /// Drainer over `ring` writing into `sink`.
    pub fn new(ring: Arc<RingBuffer>, sink: S, spins_per_cycle: u32) -> Self {
        Self {
            ring,
            sink,
            spins_per_cycle,
            stats: DrainStats::default(),
            failure: None,
        }
    }

    /// Run one drain cycle.
    ///
    /// Returns the cells reclaimed. A sink failure ([`Error::Io`]) or a
    /// header overrunning the claimed range ([`Error::Corruption`]) is
    /// returned after the records consumed before it were reclaimed.
    pub fn cycle(&mut self) -> Result<u64> {
        self.stats.cycles += 1;
        let ring = Arc::clone(&self.ring);
        let reclaimed = ring.drain_to(&mut *self)?;
        match self.failure.take() {
            Some(e) => {
                if matches!(e, Error::Io(_)) {
                    self.stats.sink_failures += 1;
                }
                Err(e)
            }
            None => Ok(reclaimed),
        }
    }

    /// Flush the sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    /// Close the sink, counting a failure.
    pub fn close(&mut self) -> io::Result<()> {
        let result = self.sink.close();
        if result.is_err() {
            self.stats.sink_failures += 1;
        }
        result
    }

    /// Counters so far
    pub fn stats(&self) -> DrainStats {
        self.stats
    }

    /// The ring being drained
    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    /// The sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Give back the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn skip(&mut self, position: u64, cells: u64) {
        let store = self.ring.cells();
        for p in position..position + cells {
            store.put(p, NOT_SET);
        }
        self.stats.cells += cells;
    }

    /// Copy one record to the sink. `false` means the sink failed and
    /// nothing was consumed; the failure is kept for `cycle`.
    fn forward(&mut self, position: u64, header: u64, cells: u64) -> bool {
        let bytes = cells as usize * WORD_BYTES;
        if self.sink.buffer().remaining() < bytes {
            if let Err(e) = self.sink.flush() {
                self.failure = Some(Error::Io(e));
                return false;
            }
        }

        let store = self.ring.cells();
        let buffer = self.sink.buffer();
        let mark = buffer.len();
        let written = buffer.put_word(header).and_then(|()| {
            (position + 1..position + cells).try_for_each(|p| buffer.put_word(store.get(p)))
        });
        if let Err(e) = written {
            // Cells are cleared only once the whole record is buffered.
            buffer.truncate(mark);
            self.failure = Some(Error::Io(e));
            return false;
        }

        for p in position..position + cells {
            store.put(p, NOT_SET);
        }
        self.stats.records += 1;
        self.stats.cells += cells;
        true
    }
}

impl<S: Sink> Drain for RecordDrainer<S> {
    fn available(&mut self, start: u64, sentinel: u64) -> Result<u64> {
        let mut spins = self.spins_per_cycle;
        let mut position = start;

        while position < sentinel {
            let word = self.ring.cells().get_observe(position);
            if !is_valid_header(word) {
                if spins == 0 {
                    break;
                }
                spins -= 1;
                std::hint::spin_loop();
                continue;
            }

            let remaining = sentinel - position;
            let declared = u64::from(argument_count(word)) + 1;
            if declared > remaining {
                // The cells past the sentinel may belong to in-flight claims.
                error!(
                    position,
                    sentinel,
                    cells = declared,
                    "record header overruns the claimed range"
                );
                self.failure = Some(Error::Corruption(format!(
                    "record at {} declares {} cells but only {} are claimed",
                    position, declared, remaining
                )));
                break;
            }
            let header = match RecordHeader::decode(word) {
                Ok(header) => header,
                Err(e) => {
                    warn!(
                        position,
                        kind = raw_kind(word),
                        cells = declared,
                        error = %e,
                        "skipping corrupted record"
                    );
                    self.skip(position, declared);
                    self.stats.corrupted += 1;
                    position += declared;
                    continue;
                }
            };

            let cells = header.cells() as u64;
            if cells as usize * WORD_BYTES > self.sink.buffer().capacity() {
                warn!(
                    position,
                    format_id = header.format_id,
                    cells,
                    "dropping record larger than the sink buffer"
                );
                self.skip(position, cells);
                self.stats.oversized += 1;
                position += cells;
                continue;
            }

            if !self.forward(position, word, cells) {
                break;
            }
            position += cells;
        }

        Ok(position - start)
    }
}

impl<S> std::fmt::Debug for RecordDrainer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordDrainer")
            .field("spins_per_cycle", &self.spins_per_cycle)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Pause before the next cycle, adapted to how much the last one processed.
///
/// Under an eighth of the capacity doubles the pause (up to `max`), over a
/// half halves it (down to `min`), anything between keeps it.
pub fn next_idle_period(
    processed: u64,
    capacity: u64,
    current: Duration,
    min: Duration,
    max: Duration,
) -> Duration {
    if processed < capacity / 8 {
        current.saturating_mul(2).min(max).max(min)
    } else if processed > capacity / 2 {
        (current / 2).max(min)
    } else {
        current
    }
}

// ============================================================================
// Thread management
// ============================================================================

/// Creates the drainer thread
pub trait ThreadFactory: Send + Sync {
    /// Spawn `task` on a new thread named after `name`.
    fn spawn(
        &self,
        name: &str,
        task: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>>;
}

/// Factory naming threads `<name>-<n>`
#[derive(Debug, Default)]
pub struct NamedThreadFactory {
    spawned: AtomicUsize,
}

impl NamedThreadFactory {
    /// New factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Threads spawned so far
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn spawn(
        &self,
        name: &str,
        task: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        thread::Builder::new()
            .name(format!("{}-{}", name, n))
            .spawn(task)
    }
}

type Outcome = Arc<Mutex<Option<Result<DrainStats>>>>;

/// A drainer thread that could not be started
pub struct SpawnError<S> {
    /// Why the start failed
    pub error: Error,
    /// The drainer, unless the factory already ran it
    pub drainer: Option<RecordDrainer<S>>,
}

impl<S> From<SpawnError<S>> for Error {
    fn from(failed: SpawnError<S>) -> Self {
        failed.error
    }
}

impl<S> std::fmt::Debug for SpawnError<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnError")
            .field("error", &self.error)
            .field("returned", &self.drainer.is_some())
            .finish()
    }
}

/// Handle to a running drainer loop
///
/// Dropping the handle stops the loop and waits for it.
pub struct DrainerThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    outcome: Outcome,
}

impl DrainerThread {
    /// Start `drainer` on a thread from `factory`.
    pub fn spawn<S: Sink + 'static>(
        factory: &dyn ThreadFactory,
        drainer: RecordDrainer<S>,
        config: DrainerConfig,
    ) -> Result<Self> {
        Self::try_spawn(factory, drainer, config).map_err(Error::from)
    }

    /// Like [`DrainerThread::spawn`], but a failure hands the drainer (and
    /// with it the sink) back to the caller.
    pub fn try_spawn<S: Sink + 'static>(
        factory: &dyn ThreadFactory,
        drainer: RecordDrainer<S>,
        config: DrainerConfig,
    ) -> std::result::Result<Self, SpawnError<S>> {
        if let Err(error) = config.validate() {
            return Err(SpawnError {
                error,
                drainer: Some(drainer),
            });
        }
        let stop = Arc::new(AtomicBool::new(false));
        let outcome: Outcome = Arc::new(Mutex::new(None));
        let pending = Arc::new(Mutex::new(Some(drainer)));

        let name = config.thread_name.clone();
        let task = {
            let stop = Arc::clone(&stop);
            let outcome = Arc::clone(&outcome);
            let pending = Arc::clone(&pending);
            move || {
                let drainer = pending.lock().take();
                if let Some(drainer) = drainer {
                    let result = run(drainer, &config, &stop);
                    *outcome.lock() = Some(result);
                }
            }
        };
        let handle = match factory.spawn(&name, Box::new(task)) {
            Ok(handle) => handle,
            Err(e) => {
                error!(thread = %name, error = %e, "failed to spawn drainer thread");
                return Err(SpawnError {
                    error: Error::Io(e),
                    drainer: pending.lock().take(),
                });
            }
        };
        info!(thread = %name, "drainer started");

        Ok(Self {
            stop,
            handle: Some(handle),
            outcome,
        })
    }

    /// True while the loop has not exited
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the loop to stop after its current cycle and wait for it.
    pub fn stop(mut self) -> Result<DrainStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<DrainStats> {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "drainer thread panicked",
                )));
            }
        }
        self.outcome.lock().take().unwrap_or_else(|| {
            Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                "drainer already stopped",
            )))
        })
    }
}

impl Drop for DrainerThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.shutdown() {
                error!(error = %e, "drainer stopped with error");
            }
        }
    }
}

impl std::fmt::Debug for DrainerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainerThread")
            .field("running", &self.is_running())
            .finish()
    }
}

fn run<S: Sink>(
    mut drainer: RecordDrainer<S>,
    config: &DrainerConfig,
    stop: &AtomicBool,
) -> Result<DrainStats> {
    let capacity = drainer.ring().length() as u64;
    let mut period = config.idle_min;

    while !stop.load(Ordering::Acquire) {
        let processed = match drainer.cycle() {
            Ok(processed) => processed,
            Err(e) if e.is_fatal() => {
                error!(error = %e, "drainer stopping on fatal error");
                let _ = drainer.close();
                return Err(e);
            }
            Err(e) => {
                error!(error = %e, "drain cycle failed");
                0
            }
        };
        period = next_idle_period(processed, capacity, period, config.idle_min, config.idle_max);
        if period.is_zero() {
            thread::yield_now();
        } else {
            thread::park_timeout(period);
        }
    }

    if config.drain_on_shutdown {
        loop {
            match drainer.cycle() {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "drainer stopping on fatal error");
                    let _ = drainer.close();
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "final drain cycle failed");
                    break;
                }
            }
        }
        debug!(remaining = drainer.ring().claimed(), "final drain finished");
    }

    if let Err(e) = drainer.close() {
        error!(error = %e, "closing sink failed");
    }
    let stats = drainer.stats();
    info!(
        cycles = stats.cycles,
        records = stats.records,
        corrupted = stats.corrupted,
        sink_failures = stats.sink_failures,
        "drainer stopped"
    );
    Ok(stats)
}
