//! Format string interning
//!
//! A fixed-size open-addressing table maps each distinct format string to a
//! [`MessageInfo`] with a sequential id. Hits are lock-free: each slot is an
//! `ArcSwapOption` compared by string equality. Only a miss takes the
//! catalog mutex, searches again (another thread may have inserted the same
//! format meanwhile) and stores the new entry.
//!
//! # Purge
//!
//! `purge` empties the table and restarts ids at 1 without retracting the
//! entries callers already hold. A stale `MessageInfo` keeps its old id,
//! which a later format may be assigned too. The catalog's own references
//! are released, so an entry is freed once its last holder drops it.

use arc_swap::ArcSwapOption;
use fastlog_core::{Error, MessageInfo, Result};
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::debug;

/// Default number of catalog slots
pub const DEFAULT_CATALOG_CAPACITY: usize = 2048;

enum Search {
    Found(Arc<MessageInfo>),
    Vacant(usize),
    Full,
}

struct CatalogState {
    last_id: u32,
    live: usize,
}

/// Fixed-capacity format string table
pub struct MessageCatalog {
    slots: Box<[ArcSwapOption<MessageInfo>]>,
    mask: usize,
    state: Mutex<CatalogState>,
}

impl MessageCatalog {
    /// Create a catalog with `capacity` slots (a power of two above 1).
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity <= 1 || !capacity.is_power_of_two() {
            return Err(Error::config(format!(
                "catalog capacity {} must be a power of 2 greater than 1",
                capacity
            )));
        }
        let slots = (0..capacity)
            .map(|_| ArcSwapOption::empty())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            slots,
            mask: capacity - 1,
            state: Mutex::new(CatalogState {
                last_id: 0,
                live: 0,
            }),
        })
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Formats currently interned
    pub fn len(&self) -> usize {
        self.state.lock().live
    }

    /// True when nothing is interned
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Intern `format`, returning the cached entry on repeat lookups.
    pub fn lookup(&self, format: &str) -> Result<Arc<MessageInfo>> {
        let hash = format_hash(format);
        if let Search::Found(entry) = self.search(format, hash) {
            return Ok(entry);
        }

        let mut state = self.state.lock();
        match self.search(format, hash) {
            Search::Found(entry) => Ok(entry),
            Search::Vacant(index) => {
                let id = state
                    .last_id
                    .checked_add(1)
                    .ok_or(Error::CatalogOverflow {
                        capacity: self.capacity(),
                    })?;
                let info = Arc::new(MessageInfo::new(format, id)?);
                self.slots[index].store(Some(Arc::clone(&info)));
                state.last_id = id;
                state.live += 1;
                debug!(
                    format_id = id,
                    arguments = info.argument_count(),
                    format,
                    "interned message format"
                );
                Ok(info)
            }
            Search::Full => Err(Error::CatalogOverflow {
                capacity: self.capacity(),
            }),
        }
    }

    /// Empty the table and restart ids at 1.
    ///
    /// Entries already handed out stay valid but are no longer found by
    /// [`MessageCatalog::lookup`].
    pub fn purge(&self) {
        let mut state = self.state.lock();
        for slot in self.slots.iter() {
            slot.store(None);
        }
        debug!(purged = state.live, "purged message catalog");
        state.last_id = 0;
        state.live = 0;
    }

    fn search(&self, format: &str, hash: usize) -> Search {
        let start = hash & self.mask;
        for step in 0..self.slots.len() {
            let index = (start + step) & self.mask;
            let entry = self.slots[index].load();
            match &*entry {
                None => return Search::Vacant(index),
                Some(info) if info.format() == format => return Search::Found(Arc::clone(info)),
                Some(_) => {}
            }
        }
        Search::Full
    }
}

impl std::fmt::Debug for MessageCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCatalog")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

fn format_hash(format: &str) -> usize {
    let mut hasher = FxHasher::default();
    format.hash(&mut hasher);
    (hasher.finish() & 0x7fff_ffff) as usize
}
