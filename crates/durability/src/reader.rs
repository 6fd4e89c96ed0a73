//! Decoder for flushed record streams
//!
//! Reads back what a sink flushed: a header word followed by
//! `argument_count` argument words, repeated until the stream ends.

use crate::sink::WORD_BYTES;
use byteorder::{BigEndian, ByteOrder};
use fastlog_core::record::is_valid_header;
use fastlog_core::{Error, Record, RecordHeader, Result};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Iterator of records over a big-endian word stream
///
/// Stops after the first error; a stream ending inside a record yields
/// [`Error::Corruption`].
pub struct RecordReader<R> {
    inner: R,
    offset: u64,
    done: bool,
}

impl RecordReader<BufReader<File>> {
    /// Read records from a file written by [`crate::FileSink`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap a byte source.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            done: false,
        }
    }

    /// Byte offset of the next word
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Collect every remaining record, failing on the first bad one.
    pub fn read_all(self) -> Result<Vec<Record>> {
        self.collect()
    }

    /// Read the next record, `None` at a clean end of stream.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let record_offset = self.offset;
        let word = match self.read_word()? {
            Some(word) => word,
            None => return Ok(None),
        };
        if !is_valid_header(word) {
            return Err(Error::Corruption(format!(
                "invalid header {:#018x} at offset {}",
                word, record_offset
            )));
        }
        let header = RecordHeader::decode(word)?;

        let mut arguments = Vec::with_capacity(header.argument_count as usize);
        for index in 0..header.argument_count {
            match self.read_word()? {
                Some(word) => arguments.push(word),
                None => {
                    return Err(Error::Corruption(format!(
                        "record at offset {} truncated after {} of {} arguments",
                        record_offset, index, header.argument_count
                    )))
                }
            }
        }
        Ok(Some(Record { header, arguments }))
    }

    fn read_word(&mut self) -> Result<Option<u64>> {
        let mut word = [0u8; WORD_BYTES];
        let mut filled = 0;
        while filled < WORD_BYTES {
            match self.inner.read(&mut word[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            WORD_BYTES => {
                self.offset += WORD_BYTES as u64;
                Ok(Some(BigEndian::read_u64(&word)))
            }
            partial => Err(Error::Corruption(format!(
                "stream ends {} bytes into a word at offset {}",
                partial, self.offset
            ))),
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
