//! Concurrency layer for fastlog
//!
//! This crate implements the claim/drain protocol over the cell store:
//! - WaitingStrategy: backoff policy for a contended claim
//! - Sequencer: index allocator over `[head, tail)`, multi- and single-claimer
//! - Drain: callback through which the single consumer reclaims cells
//! - RingBuffer: sequencer + cell store + waiting strategy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ring;
pub mod sequencer;
pub mod waiting;

pub use ring::RingBuffer;
pub use sequencer::{
    Drain, MultiClaimSequencer, Sequencer, SequencerKind, SingleClaimSequencer,
};
pub use waiting::{LimitedSpinning, NoWait, Spinning, WaitingStrategy, WaitingStrategyKind};
