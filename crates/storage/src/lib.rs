//! Cell storage for fastlog
//!
//! This crate implements the fixed-capacity circular store of 64-bit cells
//! shared by producers and the drainer:
//! - CellStore: the common contract (plain, publish and observe accessors)
//! - CheckedCells: bounds-checked slice of atomics
//! - UncheckedCells: same layout, unchecked indexing after masking
//! - MappedCells: cells living in a memory mapping (anonymous or file-backed)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell_store;
pub mod checked;
pub mod mapped;
pub mod unchecked;

pub use cell_store::{validate_length, CellStore, CellStoreKind};
pub use checked::CheckedCells;
pub use mapped::MappedCells;
pub use unchecked::UncheckedCells;
