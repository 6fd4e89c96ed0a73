//! Logging Integration Tests
//!
//! End-to-end tests through the public `fastlog` API:
//! - producer -> ring -> drainer -> sink, in memory and on disk
//! - configuration loaded from JSON
//! - randomized multi-producer stress with exactly-once delivery
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test logging
//! cargo test --test logging concurrency::
//! ```

use fastlog::prelude::*;
use std::time::Duration;

// Test modules
mod concurrency;
mod configuration;
mod end_to_end;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Route `tracing` output through the test harness (once per process).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Drainer settings that keep tests fast
pub fn fast_drainer() -> DrainerConfig {
    DrainerConfig {
        idle_min: Duration::from_micros(100),
        idle_max: Duration::from_millis(2),
        ..DrainerConfig::default()
    }
}

/// Logger over a memory sink, not yet draining
pub fn memory_logger(
    capacity: usize,
    sequencer: SequencerKind,
    waiting: WaitingStrategyKind,
) -> (FastLogger, MemorySinkHandle) {
    init_tracing();
    let sink = MemorySink::new(64 * 1024).unwrap();
    let handle = sink.handle();
    let logger = FastLogger::builder()
        .capacity(capacity)
        .sequencer(sequencer)
        .waiting(waiting)
        .drainer(fast_drainer())
        .sink(sink)
        .build()
        .unwrap();
    (logger, handle)
}

/// Retry a claim-level failure until the drainer frees room.
pub fn submit_retrying(producer: &mut Producer, format: &str, args: &[i64]) {
    loop {
        match producer.log(format) {
            Ok(cursor) => {
                for arg in args {
                    cursor.with(*arg).unwrap();
                }
                cursor.submit().unwrap();
                return;
            }
            Err(Error::ClaimExhausted { .. }) => std::thread::yield_now(),
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}
