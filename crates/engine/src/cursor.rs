//! Producer side of the record protocol
//!
//! A [`LogCursor`] walks one record through `Unstarted -> Started ->
//! Unstarted`:
//!
//! 1. `start` claims `argument_count + 1` cells; the first holds the header.
//! 2. `with` stores one argument word with a plain write.
//! 3. `submit` writes the header with Release ordering, which publishes every
//!    argument written before it, and resets the cursor.
//!
//! [`Producer`] is the reusable flavour: one handle per producer thread,
//! re-targeted at a new format on every [`Producer::log`] call.
//!
//! On a single-claimer ring every cursor and producer holds a
//! [`ClaimLease`], so at most one of them can claim at any time.

use crate::catalog::MessageCatalog;
use fastlog_concurrency::RingBuffer;
use fastlog_core::record::header;
use fastlog_core::{Error, MessageInfo, RecordKind, Result};
use std::cell::Cell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Value that can be stored in one argument cell
pub trait LogArgument: Copy {
    /// The raw 64-bit word written to the cell.
    fn to_word(self) -> u64;
}

impl LogArgument for u64 {
    #[inline]
    fn to_word(self) -> u64 {
        self
    }
}

impl LogArgument for i64 {
    #[inline]
    fn to_word(self) -> u64 {
        self as u64
    }
}

impl LogArgument for u32 {
    #[inline]
    fn to_word(self) -> u64 {
        u64::from(self)
    }
}

impl LogArgument for i32 {
    #[inline]
    fn to_word(self) -> u64 {
        i64::from(self) as u64
    }
}

impl LogArgument for usize {
    #[inline]
    fn to_word(self) -> u64 {
        self as u64
    }
}

impl LogArgument for f64 {
    /// Bit pattern, not a textual conversion.
    #[inline]
    fn to_word(self) -> u64 {
        self.to_bits()
    }
}

impl LogArgument for bool {
    #[inline]
    fn to_word(self) -> u64 {
        u64::from(self)
    }
}

/// Exclusive right to claim on a single-claimer ring, released on drop
#[derive(Debug)]
pub struct ClaimLease {
    held: Arc<AtomicBool>,
}

impl ClaimLease {
    /// Take the lease guarded by `flag`, failing while another holder has it.
    pub fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| {
                Error::config("single-claimer ring already has an active producer or cursor")
            })?;
        Ok(Self {
            held: Arc::clone(flag),
        })
    }
}

impl Drop for ClaimLease {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Unstarted,
    Started { position: u64, offset: u32 },
}

/// Builder for one record at a time
pub struct LogCursor {
    ring: Arc<RingBuffer>,
    message: Option<Arc<MessageInfo>>,
    state: CursorState,
    // Released after `Drop` has published a pending record.
    lease: Option<ClaimLease>,
}

impl LogCursor {
    /// Cursor for `message`, not yet started.
    pub fn new(ring: Arc<RingBuffer>, message: Arc<MessageInfo>) -> Self {
        Self {
            ring,
            message: Some(message),
            state: CursorState::Unstarted,
            lease: None,
        }
    }

    /// Cursor without a message; [`LogCursor::retarget`] before starting.
    pub fn detached(ring: Arc<RingBuffer>) -> Self {
        Self {
            ring,
            message: None,
            state: CursorState::Unstarted,
            lease: None,
        }
    }

    /// Hold `lease` for as long as this cursor lives.
    pub fn leased(mut self, lease: Option<ClaimLease>) -> Self {
        self.lease = lease;
        self
    }

    /// The message this cursor writes
    pub fn message(&self) -> Option<&Arc<MessageInfo>> {
        self.message.as_ref()
    }

    /// True between `start` and `submit`
    pub fn is_started(&self) -> bool {
        matches!(self.state, CursorState::Started { .. })
    }

    /// Point an unstarted cursor at another message.
    pub fn retarget(&mut self, message: Arc<MessageInfo>) -> Result<()> {
        if self.is_started() {
            return Err(Error::cursor(
                "cannot retarget a started cursor; submit the pending record first",
            ));
        }
        self.message = Some(message);
        Ok(())
    }

    /// Claim the cells of one record.
    pub fn start(&mut self) -> Result<&mut Self> {
        if self.is_started() {
            return Err(Error::cursor("start() called twice without submit()"));
        }
        let cells = match &self.message {
            Some(message) => message.record_cells(),
            None => return Err(Error::cursor("start() on a cursor without a message")),
        };
        let position = self
            .ring
            .claim(cells)
            .ok_or(Error::ClaimExhausted { size: cells })?;
        self.state = CursorState::Started {
            position,
            offset: 1,
        };
        Ok(self)
    }

    /// Append the next argument.
    pub fn with(&mut self, value: impl LogArgument) -> Result<&mut Self> {
        let (position, offset) = match &mut self.state {
            CursorState::Started { position, offset } => (*position, offset),
            CursorState::Unstarted => return Err(Error::cursor("with() before start()")),
        };
        let argument_count = self
            .message
            .as_ref()
            .map(|m| u32::from(m.argument_count()))
            .unwrap_or(0);
        if *offset > argument_count {
            return Err(Error::cursor(format!(
                "format takes {} arguments, got more",
                argument_count
            )));
        }
        self.ring
            .cells()
            .put(position + u64::from(*offset), value.to_word());
        *offset += 1;
        Ok(self)
    }

    /// Publish the record and reset to unstarted.
    ///
    /// Arguments not supplied are published as whatever their cells hold.
    pub fn submit(&mut self) -> Result<()> {
        let position = match self.state {
            CursorState::Started { position, .. } => position,
            CursorState::Unstarted => return Err(Error::cursor("submit() before start()")),
        };
        self.state = CursorState::Unstarted;
        let word = match &self.message {
            Some(message) => header(
                RecordKind::LogRecord,
                message.format_id(),
                message.argument_count(),
            ),
            None => return Err(Error::cursor("submit() on a cursor without a message")),
        };
        self.ring.cells().put_publish(position, word);
        Ok(())
    }
}

impl Drop for LogCursor {
    fn drop(&mut self) {
        // An unpublished claim would stall the drainer at this position forever.
        if let CursorState::Started { position, .. } = self.state {
            warn!(position, "log cursor dropped before submit, publishing partial record");
            let _ = self.submit();
        }
    }
}

impl std::fmt::Debug for LogCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCursor")
            .field("format_id", &self.message.as_ref().map(|m| m.format_id()))
            .field("state", &self.state)
            .finish()
    }
}

/// Publish a timestamp record (`RecordKind::Timestamp`, one argument).
pub fn publish_timestamp(ring: &RingBuffer, nanos: u64) -> Result<()> {
    let position = ring.claim(2).ok_or(Error::ClaimExhausted { size: 2 })?;
    ring.cells().put(position + 1, nanos);
    ring.cells()
        .put_publish(position, header(RecordKind::Timestamp, 0, 1));
    Ok(())
}

/// Reusable per-thread cursor handle
///
/// Can move to another thread but not be shared between threads.
pub struct Producer {
    catalog: Arc<MessageCatalog>,
    cursor: LogCursor,
    _not_sync: PhantomData<Cell<()>>,
}

impl Producer {
    pub(crate) fn new(
        ring: Arc<RingBuffer>,
        catalog: Arc<MessageCatalog>,
        lease: Option<ClaimLease>,
    ) -> Self {
        Self {
            catalog,
            cursor: LogCursor::detached(ring).leased(lease),
            _not_sync: PhantomData,
        }
    }

    /// Start a record for `format`; chain `with` calls and `submit`.
    pub fn log(&mut self, format: &str) -> Result<&mut LogCursor> {
        let message = self.catalog.lookup(format)?;
        self.cursor.retarget(message)?;
        self.cursor.start()
    }

    /// Publish a timestamp record through this producer's ring.
    pub fn timestamp(&mut self, nanos: u64) -> Result<()> {
        publish_timestamp(&self.cursor.ring, nanos)
    }

    /// The underlying cursor
    pub fn cursor(&mut self) -> &mut LogCursor {
        &mut self.cursor
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("cursor", &self.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastlog_concurrency::NoWait;
    use fastlog_core::record::{argument_count, format_id, is_valid_header, kind};
    use fastlog_core::NOT_SET;
    use fastlog_storage::CheckedCells;

    static_assertions::assert_impl_all!(LogCursor: Send, Sync);
    static_assertions::assert_impl_all!(Producer: Send);
    static_assertions::assert_not_impl_any!(Producer: Sync);

    fn ring(length: usize) -> Arc<RingBuffer> {
        let cells = CheckedCells::with_fill(length, NOT_SET).unwrap();
        Arc::new(RingBuffer::multi_claimer(Box::new(cells), Arc::new(NoWait)).unwrap())
    }

    fn message(format: &str, id: u32) -> Arc<MessageInfo> {
        Arc::new(MessageInfo::new(format, id).unwrap())
    }

    #[test]
    fn test_full_record_is_published() {
        let ring = ring(16);
        let mut cursor = LogCursor::new(Arc::clone(&ring), message("x=%f y=%d", 9));

        cursor.start().unwrap().with(5.0).unwrap().with(7i64).unwrap();
        // Header not yet visible.
        assert!(!is_valid_header(ring.cells().get_observe(0)));
        cursor.submit().unwrap();

        let h = ring.cells().get_observe(0);
        assert!(is_valid_header(h));
        assert_eq!(kind(h).unwrap(), RecordKind::LogRecord);
        assert_eq!(format_id(h), 9);
        assert_eq!(argument_count(h), 2);
        assert_eq!(ring.cells().get(1), 5.0f64.to_bits());
        assert_eq!(ring.cells().get(2), 7);
        assert!(!cursor.is_started());
    }

    #[test]
    fn test_state_errors() {
        let ring = ring(16);
        let mut cursor = LogCursor::new(ring, message("%d", 1));

        assert!(matches!(cursor.with(1u64), Err(Error::CursorState(_))));
        assert!(matches!(cursor.submit(), Err(Error::CursorState(_))));

        cursor.start().unwrap();
        assert!(matches!(cursor.start(), Err(Error::CursorState(_))));
        assert!(matches!(
            cursor.retarget(message("other", 2)),
            Err(Error::CursorState(_))
        ));
        cursor.submit().unwrap();
        assert!(matches!(cursor.submit(), Err(Error::CursorState(_))));
    }

    #[test]
    fn test_extra_argument_never_overruns_claim() {
        let ring = ring(8);
        let mut cursor = LogCursor::new(Arc::clone(&ring), message("%d", 1));
        cursor.start().unwrap().with(1u32).unwrap();
        assert!(matches!(cursor.with(2u32), Err(Error::CursorState(_))));
        cursor.submit().unwrap();
        assert_eq!(ring.cells().get(2), NOT_SET);
    }

    #[test]
    fn test_under_filled_record_is_permitted() {
        let ring = ring(8);
        let mut cursor = LogCursor::new(Arc::clone(&ring), message("%d %d", 1));
        cursor.start().unwrap().with(-1i32).unwrap();
        cursor.submit().unwrap();
        assert_eq!(ring.cells().get(1), u64::MAX);
        assert_eq!(ring.cells().get(2), NOT_SET);
    }

    #[test]
    fn test_claim_exhausted() {
        let ring = ring(4);
        let mut cursor = LogCursor::new(Arc::clone(&ring), message("%d %d", 1));
        cursor.start().unwrap();
        cursor.submit().unwrap();
        assert!(matches!(
            cursor.start(),
            Err(Error::ClaimExhausted { size: 3 })
        ));
        assert!(!cursor.is_started());
    }

    #[test]
    fn test_detached_cursor_cannot_start() {
        let mut cursor = LogCursor::detached(ring(4));
        assert!(cursor.message().is_none());
        assert!(matches!(cursor.start(), Err(Error::CursorState(_))));
    }

    #[test]
    fn test_dropped_started_cursor_publishes() {
        let ring = ring(8);
        {
            let mut cursor = LogCursor::new(Arc::clone(&ring), message("%d", 3));
            cursor.start().unwrap();
        }
        assert_eq!(format_id(ring.cells().get_observe(0)), 3);
    }

    #[test]
    fn test_producer_reuses_cursor() {
        let ring = ring(16);
        let catalog = Arc::new(MessageCatalog::new(8).unwrap());
        let mut producer = Producer::new(Arc::clone(&ring), Arc::clone(&catalog), None);

        producer.log("a=%d").unwrap().with(1u64).unwrap().submit().unwrap();
        producer.log("b").unwrap().submit().unwrap();
        producer.log("a=%d").unwrap().with(2u64).unwrap().submit().unwrap();

        assert_eq!(format_id(ring.cells().get(0)), 1);
        assert_eq!(format_id(ring.cells().get(2)), 2);
        assert_eq!(format_id(ring.cells().get(3)), 1);
        assert_eq!(ring.cells().get(4), 2);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_producer_refuses_new_record_while_started() {
        let ring = ring(16);
        let catalog = Arc::new(MessageCatalog::new(8).unwrap());
        let mut producer = Producer::new(ring, catalog, None);
        producer.log("first %d").unwrap();
        assert!(matches!(
            producer.log("second"),
            Err(Error::CursorState(_))
        ));
        producer.cursor().submit().unwrap();
        producer.log("second").unwrap().submit().unwrap();
    }

    #[test]
    fn test_claim_lease_is_exclusive() {
        let flag = Arc::new(AtomicBool::new(false));
        let lease = ClaimLease::acquire(&flag).unwrap();
        assert!(matches!(
            ClaimLease::acquire(&flag),
            Err(Error::Configuration(_))
        ));

        let ring = ring(8);
        let mut cursor = LogCursor::new(Arc::clone(&ring), message("%d", 1)).leased(Some(lease));
        cursor.start().unwrap();
        drop(cursor);
        // Dropping the cursor published its record, then released the lease.
        assert_eq!(format_id(ring.cells().get_observe(0)), 1);
        assert!(ClaimLease::acquire(&flag).is_ok());
    }

    #[test]
    fn test_timestamp_record() {
        let ring = ring(4);
        publish_timestamp(&ring, 1_234).unwrap();
        let h = ring.cells().get_observe(0);
        assert_eq!(kind(h).unwrap(), RecordKind::Timestamp);
        assert_eq!(argument_count(h), 1);
        assert_eq!(ring.cells().get(1), 1_234);
    }
}
