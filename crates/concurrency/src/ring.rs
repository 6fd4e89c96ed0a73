//! Ring buffer: a sequencer paired with a cell store of the same length
//!
//! The ring does not interpret cell contents. Producers write into the
//! positions a claim returns; the drainer reads them back inside its
//! [`Drain`] callback and reports how many it is done with.

use crate::sequencer::{Drain, MultiClaimSequencer, Sequencer, SingleClaimSequencer};
use crate::waiting::WaitingStrategy;
use fastlog_core::{Error, Result};
use fastlog_storage::CellStore;
use std::sync::Arc;

/// Sequencer, cells and waiting strategy of one ring
pub struct RingBuffer {
    sequencer: Box<dyn Sequencer>,
    cells: Box<dyn CellStore>,
    waiting: Arc<dyn WaitingStrategy>,
}

impl RingBuffer {
    /// Assemble a ring. The sequencer and the cells must agree on length.
    pub fn new(
        sequencer: Box<dyn Sequencer>,
        cells: Box<dyn CellStore>,
        waiting: Arc<dyn WaitingStrategy>,
    ) -> Result<Self> {
        if sequencer.length() != cells.length() {
            return Err(Error::config(format!(
                "sequencer length {} differs from cell store length {}",
                sequencer.length(),
                cells.length()
            )));
        }
        Ok(Self {
            sequencer,
            cells,
            waiting,
        })
    }

    /// Ring that accepts claims from any number of threads.
    pub fn multi_claimer(
        cells: Box<dyn CellStore>,
        waiting: Arc<dyn WaitingStrategy>,
    ) -> Result<Self> {
        let sequencer = MultiClaimSequencer::new(cells.length())?;
        Self::new(Box::new(sequencer), cells, waiting)
    }

    /// Ring that accepts claims from a single thread only.
    pub fn single_claimer(
        cells: Box<dyn CellStore>,
        waiting: Arc<dyn WaitingStrategy>,
    ) -> Result<Self> {
        let sequencer = SingleClaimSequencer::new(cells.length())?;
        Self::new(Box::new(sequencer), cells, waiting)
    }

    /// Claim `size` consecutive cells using the ring's waiting strategy.
    #[inline]
    pub fn claim(&self, size: usize) -> Option<u64> {
        self.sequencer.claim(size, self.waiting.as_ref())
    }

    /// See [`Sequencer::drain_to`].
    #[inline]
    pub fn drain_to(&self, drain: &mut dyn Drain) -> Result<u64> {
        self.sequencer.drain_to(drain)
    }

    /// Capacity in cells
    pub fn length(&self) -> usize {
        self.cells.length()
    }

    /// Cells not yet reclaimed by the drainer
    pub fn claimed(&self) -> u64 {
        self.sequencer.claimed()
    }

    /// The backing cells
    #[inline]
    pub fn cells(&self) -> &dyn CellStore {
        self.cells.as_ref()
    }

    /// The sequencer
    pub fn sequencer(&self) -> &dyn Sequencer {
        self.sequencer.as_ref()
    }

    /// The waiting strategy used by [`RingBuffer::claim`]
    pub fn waiting(&self) -> &Arc<dyn WaitingStrategy> {
        &self.waiting
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("length", &self.length())
            .field("head", &self.sequencer.head())
            .field("tail", &self.sequencer.tail())
            .finish()
    }
}
