//! Backoff policies for contended claims
//!
//! A claim that finds no room asks its strategy whether to try again.
//! `tries` counts the failed attempts so far, starting at 0. No strategy ever
//! blocks in the OS: a claim either spins or fails.

use serde::{Deserialize, Serialize};
use std::hint::black_box;
use std::sync::Arc;

/// Decides whether a claim that found the ring full should retry
pub trait WaitingStrategy: Send + Sync {
    /// Back off for attempt `tries`; `false` gives up the claim.
    fn wait_for(&self, tries: u32) -> bool;
}

/// Fail immediately when the ring is full
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWait;

impl WaitingStrategy for NoWait {
    #[inline]
    fn wait_for(&self, _tries: u32) -> bool {
        false
    }
}

/// Spin proportionally to the attempt count and never give up
#[derive(Debug, Clone, Copy, Default)]
pub struct Spinning;

impl WaitingStrategy for Spinning {
    #[inline]
    fn wait_for(&self, tries: u32) -> bool {
        for _ in 0..tries {
            std::hint::spin_loop();
        }
        true
    }
}

/// Spin with bounded busy work, give up after `max_tries` attempts
///
/// Each try burns `tries` rounds of LCG arithmetic, so backoff grows linearly
/// with contention at a roughly constant cost per round. The result goes
/// through `black_box` so the loop survives optimisation.
#[derive(Debug, Clone, Copy)]
pub struct LimitedSpinning {
    max_tries: u32,
}

const LCG_MULTIPLIER: u64 = 0x5_DEEC_E66D;
const LCG_INCREMENT: u64 = 0xB;
const LCG_MASK: u64 = 0xFFFF_FFFF_FFFF;
const LCG_SEED: u64 = 43;

impl LimitedSpinning {
    /// Give up once `tries >= max_tries`.
    pub fn new(max_tries: u32) -> Self {
        Self { max_tries }
    }

    /// Attempt limit
    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }
}

impl WaitingStrategy for LimitedSpinning {
    fn wait_for(&self, tries: u32) -> bool {
        if tries >= self.max_tries {
            return false;
        }
        let mut t = black_box(LCG_SEED);
        for _ in 0..tries {
            let step = t.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT) & LCG_MASK;
            t = t.wrapping_add(step);
        }
        black_box(t);
        true
    }
}

/// Serialisable waiting strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum WaitingStrategyKind {
    /// [`NoWait`]
    NoWait,
    /// [`Spinning`]
    Spin,
    /// [`LimitedSpinning`]
    LimitedSpin {
        /// Attempts before giving up
        max_tries: u32,
    },
}

impl Default for WaitingStrategyKind {
    fn default() -> Self {
        WaitingStrategyKind::LimitedSpin { max_tries: 1024 }
    }
}

impl WaitingStrategyKind {
    /// Instantiate the selected strategy.
    pub fn build(self) -> Arc<dyn WaitingStrategy> {
        match self {
            WaitingStrategyKind::NoWait => Arc::new(NoWait),
            WaitingStrategyKind::Spin => Arc::new(Spinning),
            WaitingStrategyKind::LimitedSpin { max_tries } => {
                Arc::new(LimitedSpinning::new(max_tries))
            }
        }
    }
}
