//! Index allocator for the circular cell store
//!
//! A sequencer hands out contiguous position ranges to producers and lets a
//! single consumer give them back. It never touches the cells themselves:
//! producers must publish a per-record flag (the record header) so the
//! consumer can tell a claimed range from a filled one.
//!
//! # Cursors
//!
//! ```text
//!        head                     tail
//!         |                        |
//!  ...----[ claimed, not reclaimed )----- free -----...
//! ```
//!
//! - `0 <= tail - head <= length` at every instant
//! - `tail - head == length`: full, `tail == head`: empty
//! - `head % length` is the first claimed cell, `tail % length` the next free one
//!
//! Both cursors grow monotonically and sit on separate cache lines so that
//! claimers (writing `tail`) and the drainer (writing `head`) don't falsely
//! share a line.
//!
//! # Thread Safety
//!
//! - [`MultiClaimSequencer::claim`]: any number of threads, one CAS on `tail`
//! - [`SingleClaimSequencer::claim`]: exactly one claiming thread
//! - [`Sequencer::drain_to`]: exactly one thread at a time for both variants;
//!   callers with several candidate threads must serialise externally

use crate::waiting::WaitingStrategy;
use crossbeam_utils::CachePadded;
use fastlog_core::{Error, Result};
use fastlog_storage::validate_length;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::error;

/// Consumer callback for [`Sequencer::drain_to`]
pub trait Drain {
    /// Positions `[start, sentinel)` are claimed and may be reclaimed.
    ///
    /// Returns how many positions, counted from `start`, are free for reuse.
    /// At most `sentinel - start` may be returned.
    fn available(&mut self, start: u64, sentinel: u64) -> Result<u64>;
}

impl<F> Drain for F
where
    F: FnMut(u64, u64) -> Result<u64>,
{
    fn available(&mut self, start: u64, sentinel: u64) -> Result<u64> {
        self(start, sentinel)
    }
}

/// Index allocator over `[head, tail)`
pub trait Sequencer: Send + Sync {
    /// Capacity in positions
    fn length(&self) -> usize;

    /// Claim `size` consecutive positions.
    ///
    /// Returns the first claimed position, or `None` once `waiting` gives up.
    /// A `size` of zero or above the capacity can never be served and fails
    /// immediately.
    fn claim(&self, size: usize, waiting: &dyn WaitingStrategy) -> Option<u64>;

    /// Offer the claimed range to `drain` and reclaim what it reports.
    ///
    /// `drain` is not invoked when nothing is claimed. Returns the number of
    /// positions reclaimed.
    fn drain_to(&self, drain: &mut dyn Drain) -> Result<u64>;

    /// Current head cursor
    fn head(&self) -> u64;

    /// Current tail cursor
    fn tail(&self) -> u64;

    /// Positions claimed and not yet reclaimed
    fn claimed(&self) -> u64 {
        let head = self.head();
        self.tail().saturating_sub(head)
    }
}

/// Cache-padded head/tail pair shared by both sequencer variants
struct Cursors {
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
    length: u64,
}

impl Cursors {
    fn new(length: usize) -> Result<Self> {
        validate_length(length)?;
        Ok(Self {
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            length: length as u64,
        })
    }

    #[inline]
    fn can_ever_fit(&self, size: usize) -> bool {
        size > 0 && (size as u64) <= self.length
    }

    fn drain_to(&self, drain: &mut dyn Drain) -> Result<u64> {
        // Only the drainer stores `head`.
        let first = self.head.load(Ordering::Relaxed);
        let sentinel = self.tail.load(Ordering::Acquire);
        if sentinel <= first {
            return Ok(0);
        }

        let available = sentinel - first;
        let reclaimed = drain.available(first, sentinel)?;
        if reclaimed > available {
            error!(first, sentinel, reclaimed, "drain reported more cells than were claimed");
            return Err(Error::SequencerStateViolation {
                reclaimed,
                available,
            });
        }

        // Release: cells cleared by the drainer are visible to the next claimer.
        self.head.store(first + reclaimed, Ordering::Release);
        Ok(reclaimed)
    }
}

impl std::fmt::Debug for Cursors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursors")
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .field("length", &self.length)
            .finish()
    }
}

// ============================================================================
// Multi-claimer / single-drainer
// ============================================================================

/// Sequencer for many claiming threads and one draining thread
///
/// Claims race on `tail` with compare-and-swap; the loser re-reads both
/// cursors and retries. Ranges issued to different claimers never overlap
/// and their total never exceeds the capacity.
#[derive(Debug)]
pub struct MultiClaimSequencer {
    cursors: Cursors,
}

impl MultiClaimSequencer {
    /// Create a sequencer over `length` positions (a power of two).
    pub fn new(length: usize) -> Result<Self> {
        Ok(Self {
            cursors: Cursors::new(length)?,
        })
    }
}

impl Sequencer for MultiClaimSequencer {
    fn length(&self) -> usize {
        self.cursors.length as usize
    }

    fn claim(&self, size: usize, waiting: &dyn WaitingStrategy) -> Option<u64> {
        if !self.cursors.can_ever_fit(size) {
            return None;
        }
        let size = size as u64;
        let mut tries: u32 = 0;
        loop {
            // Acquire pairs with the drainer's Release on head.
            let head = self.cursors.head.load(Ordering::Acquire);
            let tail = self.cursors.tail.load(Ordering::Acquire);
            if tail - head + size > self.cursors.length {
                if !waiting.wait_for(tries) {
                    return None;
                }
            } else if self
                .cursors
                .tail
                .compare_exchange_weak(tail, tail + size, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(tail);
            }
            tries = tries.saturating_add(1);
        }
    }

    fn drain_to(&self, drain: &mut dyn Drain) -> Result<u64> {
        self.cursors.drain_to(drain)
    }

    fn head(&self) -> u64 {
        self.cursors.head.load(Ordering::Acquire)
    }

    fn tail(&self) -> u64 {
        self.cursors.tail.load(Ordering::Acquire)
    }
}

// ============================================================================
// Single-claimer / single-drainer
// ============================================================================

/// Sequencer for exactly one claiming thread and one draining thread
///
/// With no competing claimer, `tail` is advanced with a plain Release store.
/// Calling [`Sequencer::claim`] from two threads at once hands out
/// overlapping ranges.
#[derive(Debug)]
pub struct SingleClaimSequencer {
    cursors: Cursors,
}

impl SingleClaimSequencer {
    /// Create a sequencer over `length` positions (a power of two).
    pub fn new(length: usize) -> Result<Self> {
        Ok(Self {
            cursors: Cursors::new(length)?,
        })
    }
}

impl Sequencer for SingleClaimSequencer {
    fn length(&self) -> usize {
        self.cursors.length as usize
    }

    fn claim(&self, size: usize, waiting: &dyn WaitingStrategy) -> Option<u64> {
        if !self.cursors.can_ever_fit(size) {
            return None;
        }
        let size = size as u64;
        // Only the claimer stores `tail`.
        let tail = self.cursors.tail.load(Ordering::Relaxed);
        let mut tries: u32 = 0;
        loop {
            let head = self.cursors.head.load(Ordering::Acquire);
            if tail - head + size <= self.cursors.length {
                self.cursors.tail.store(tail + size, Ordering::Release);
                return Some(tail);
            }
            if !waiting.wait_for(tries) {
                return None;
            }
            tries = tries.saturating_add(1);
        }
    }

    fn drain_to(&self, drain: &mut dyn Drain) -> Result<u64> {
        self.cursors.drain_to(drain)
    }

    fn head(&self) -> u64 {
        self.cursors.head.load(Ordering::Acquire)
    }

    fn tail(&self) -> u64 {
        self.cursors.tail.load(Ordering::Acquire)
    }
}

/// Serialisable sequencer selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerKind {
    /// [`MultiClaimSequencer`]
    #[default]
    MultiClaimer,
    /// [`SingleClaimSequencer`]
    SingleClaimer,
}

impl SequencerKind {
    /// Instantiate the selected sequencer.
    pub fn build(self, length: usize) -> Result<Box<dyn Sequencer>> {
        Ok(match self {
            SequencerKind::MultiClaimer => Box::new(MultiClaimSequencer::new(length)?),
            SequencerKind::SingleClaimer => Box::new(SingleClaimSequencer::new(length)?),
        })
    }
}
