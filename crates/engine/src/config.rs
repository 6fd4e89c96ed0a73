//! Logger configuration

use crate::catalog::DEFAULT_CATALOG_CAPACITY;
use crate::drainer::DrainerConfig;
use fastlog_concurrency::{SequencerKind, WaitingStrategyKind};
use fastlog_core::{Error, Result};
use fastlog_storage::{validate_length, CellStoreKind};
use serde::{Deserialize, Serialize};

/// Ring capacity in cells when none is configured
pub const DEFAULT_CAPACITY: usize = 1 << 16;

/// Every knob of a [`crate::FastLogger`]
///
/// Missing fields deserialize to their defaults, so a config file only needs
/// the values it changes:
///
/// ```ignore
/// let config: LoggerConfig = serde_json::from_str(r#"{
///     "capacity": 4096,
///     "waiting": { "kind": "no_wait" }
/// }"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Ring capacity in cells (a power of two)
    pub capacity: usize,
    /// Claim protocol
    pub sequencer: SequencerKind,
    /// Cell store implementation
    pub cells: CellStoreKind,
    /// Backoff for a claim finding the ring full
    pub waiting: WaitingStrategyKind,
    /// Slots in the message catalog (a power of two above 1)
    pub catalog_capacity: usize,
    /// Drainer tuning
    pub drainer: DrainerConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            sequencer: SequencerKind::default(),
            cells: CellStoreKind::default(),
            waiting: WaitingStrategyKind::default(),
            catalog_capacity: DEFAULT_CATALOG_CAPACITY,
            drainer: DrainerConfig::default(),
        }
    }
}

impl LoggerConfig {
    /// Reject inconsistent settings before anything is allocated.
    pub fn validate(&self) -> Result<()> {
        validate_length(self.capacity)?;
        if self.catalog_capacity <= 1 || !self.catalog_capacity.is_power_of_two() {
            return Err(Error::config(format!(
                "catalog capacity {} must be a power of 2 greater than 1",
                self.catalog_capacity
            )));
        }
        self.drainer.validate()
    }
}
