//! Sink trait, output buffer and in-process sinks
//!
//! The drainer writes each record as consecutive 8-byte big-endian words
//! (header first, then arguments) into [`Sink::buffer`] and calls
//! [`Sink::flush`] when the buffer lacks room for the next record. After a
//! flush the buffer must be fetched again before writing.

use byteorder::{BigEndian, ByteOrder};
use fastlog_core::{Error, Record, Result};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Size of one cell on the wire
pub const WORD_BYTES: usize = 8;

/// Buffer size used when none is configured
pub const DEFAULT_BUFFER_BYTES: usize = 64 * 1024;

/// Fixed-capacity byte buffer holding whole 64-bit words
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
    capacity: usize,
}

impl OutputBuffer {
    /// Create a buffer of `capacity` bytes; it must hold at least one word.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < WORD_BYTES {
            return Err(Error::config(format!(
                "output buffer of {} bytes cannot hold a single word",
                capacity
            )));
        }
        Ok(Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        })
    }

    /// Total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written since the last clear
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes still free
    pub fn remaining(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    /// Append one word in big-endian order.
    ///
    /// Fails with `WriteZero` instead of growing past the capacity.
    pub fn put_word(&mut self, word: u64) -> io::Result<()> {
        if self.remaining() < WORD_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "output buffer full",
            ));
        }
        let mut encoded = [0u8; WORD_BYTES];
        BigEndian::write_u64(&mut encoded, word);
        self.bytes.extend_from_slice(&encoded);
        Ok(())
    }

    /// Buffered bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Buffered content decoded back into words
    pub fn words(&self) -> impl Iterator<Item = u64> + '_ {
        self.bytes.chunks_exact(WORD_BYTES).map(BigEndian::read_u64)
    }

    /// Drop the buffered bytes, keeping the allocation.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Drop everything written after the first `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }
}

/// Destination of drained records
pub trait Sink: Send {
    /// The reusable output buffer.
    fn buffer(&mut self) -> &mut OutputBuffer;

    /// Persist or transmit the buffered bytes and empty the buffer.
    fn flush(&mut self) -> io::Result<()>;

    /// Flush and release resources.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn buffer(&mut self) -> &mut OutputBuffer {
        (**self).buffer()
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

// ============================================================================
// MemorySink
// ============================================================================

#[derive(Debug, Default)]
struct MemoryShared {
    bytes: Mutex<Vec<u8>>,
    flushes: AtomicU64,
    closed: AtomicBool,
}

/// Sink keeping every flushed byte in memory
///
/// The sink itself usually moves onto the drainer thread; a
/// [`MemorySinkHandle`] taken beforehand reads what was flushed.
#[derive(Debug)]
pub struct MemorySink {
    buffer: OutputBuffer,
    shared: Arc<MemoryShared>,
}

impl MemorySink {
    /// Create a sink with a `buffer_bytes` output buffer.
    pub fn new(buffer_bytes: usize) -> Result<Self> {
        Ok(Self {
            buffer: OutputBuffer::new(buffer_bytes)?,
            shared: Arc::new(MemoryShared::default()),
        })
    }

    /// Reader side of this sink
    pub fn handle(&self) -> MemorySinkHandle {
        MemorySinkHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Sink for MemorySink {
    fn buffer(&mut self) -> &mut OutputBuffer {
        &mut self.buffer
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.shared
                .bytes
                .lock()
                .extend_from_slice(self.buffer.as_bytes());
            self.buffer.clear();
        }
        self.shared.flushes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.flush()?;
        self.shared.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Shared view of what a [`MemorySink`] has flushed
#[derive(Debug, Clone)]
pub struct MemorySinkHandle {
    shared: Arc<MemoryShared>,
}

impl MemorySinkHandle {
    /// Copy of all flushed bytes
    pub fn bytes(&self) -> Vec<u8> {
        self.shared.bytes.lock().clone()
    }

    /// Flushed bytes decoded into records
    pub fn records(&self) -> Result<Vec<Record>> {
        let bytes = self.bytes();
        crate::reader::RecordReader::new(bytes.as_slice()).read_all()
    }

    /// Number of completed flushes
    pub fn flush_count(&self) -> u64 {
        self.shared.flushes.load(Ordering::Relaxed)
    }

    /// True once the sink has been closed
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

// ============================================================================
// DiscardSink
// ============================================================================

/// Sink that throws its buffer away on flush, counting the bytes
#[derive(Debug)]
pub struct DiscardSink {
    buffer: OutputBuffer,
    discarded: u64,
}

impl DiscardSink {
    /// Create a sink with a `buffer_bytes` output buffer.
    pub fn new(buffer_bytes: usize) -> Result<Self> {
        Ok(Self {
            buffer: OutputBuffer::new(buffer_bytes)?,
            discarded: 0,
        })
    }

    /// Bytes dropped so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Sink for DiscardSink {
    fn buffer(&mut self) -> &mut OutputBuffer {
        &mut self.buffer
    }

    fn flush(&mut self) -> io::Result<()> {
        self.discarded += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }
}
