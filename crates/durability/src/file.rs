//! Append-only file sink
//!
//! Flushed words are appended to a single file in the same big-endian layout
//! the output buffer holds. The file can be read back with
//! [`crate::RecordReader`].

use crate::sink::{OutputBuffer, Sink};
use fastlog_core::Result;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sink appending raw record words to a file
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
    buffer: OutputBuffer,
    written: u64,
}

impl FileSink {
    /// Open `path` for appending, creating it if missing.
    pub fn open(path: impl AsRef<Path>, buffer_bytes: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let buffer = OutputBuffer::new(buffer_bytes)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!(path = %path.display(), buffer_bytes, "opened file sink");
        Ok(Self {
            path,
            file: Some(file),
            buffer,
            written: 0,
        })
    }

    /// Target file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended by this sink so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// True once [`Sink::close`] has run
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }
}

impl Sink for FileSink {
    fn buffer(&mut self) -> &mut OutputBuffer {
        &mut self.buffer
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "file sink closed"))?;
        // On failure the buffer is kept so the next flush retries it.
        file.write_all(self.buffer.as_bytes())?;
        self.written += self.buffer.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if self.file.is_none() {
            return Ok(());
        }
        self.flush()?;
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        debug!(path = %self.path.display(), written = self.written, "closed file sink");
        Ok(())
    }
}
