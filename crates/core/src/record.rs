//! Record framing
//!
//! A record occupies `argument_count + 1` consecutive cells. The first cell is
//! the header, packed into one 64-bit word:
//!
//! ```text
//!  63            48 47                            16 15             0
//! +----------------+--------------------------------+----------------+
//! |      kind      |           format_id            | argument_count |
//! +----------------+--------------------------------+----------------+
//! ```
//!
//! The header doubles as the publication flag. A cell holding [`NOT_SET`]
//! (or any other non-positive word) has not been published yet; the consumer
//! treats the record as complete only once the header reads as positive.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Sentinel stored in every free or reclaimed cell (`-1` as a signed word)
pub const NOT_SET: u64 = u64::MAX;

const KIND_SHIFT: u32 = 48;
const FORMAT_ID_SHIFT: u32 = 16;
const FORMAT_ID_MASK: u64 = 0xFFFF_FFFF;
const ARGUMENT_COUNT_MASK: u64 = 0xFFFF;

/// Record kinds understood by the drainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum RecordKind {
    /// Formatted log message with its argument words
    LogRecord = 1,
    /// Timestamp marker
    Timestamp = 2,
}

impl RecordKind {
    /// Raw 16-bit id written into the header
    #[inline]
    pub const fn id(self) -> u16 {
        self as u16
    }

    /// Resolve a raw kind id.
    pub fn from_id(id: u16) -> Result<Self> {
        match id {
            1 => Ok(RecordKind::LogRecord),
            2 => Ok(RecordKind::Timestamp),
            kind => Err(Error::UnknownRecordKind { kind }),
        }
    }
}

/// Pack a header from a known kind.
#[inline]
pub fn header(kind: RecordKind, format_id: u32, argument_count: u16) -> u64 {
    pack(kind.id(), format_id, argument_count)
}

/// Pack a header from a raw kind id.
#[inline]
pub const fn pack(raw_kind: u16, format_id: u32, argument_count: u16) -> u64 {
    ((raw_kind as u64) << KIND_SHIFT)
        | ((format_id as u64) << FORMAT_ID_SHIFT)
        | (argument_count as u64)
}

/// True once a header has been published.
#[inline]
pub const fn is_valid_header(header: u64) -> bool {
    (header as i64) > 0
}

/// Raw kind field, without validation.
#[inline]
pub const fn raw_kind(header: u64) -> u16 {
    (header >> KIND_SHIFT) as u16
}

/// Decoded kind; unknown ids are corruption.
#[inline]
pub fn kind(header: u64) -> Result<RecordKind> {
    RecordKind::from_id(raw_kind(header))
}

/// Format id field.
#[inline]
pub const fn format_id(header: u64) -> u32 {
    ((header >> FORMAT_ID_SHIFT) & FORMAT_ID_MASK) as u32
}

/// Argument count field.
#[inline]
pub const fn argument_count(header: u64) -> u16 {
    (header & ARGUMENT_COUNT_MASK) as u16
}

/// Fully decoded record header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Record kind
    pub kind: RecordKind,
    /// Interned format id
    pub format_id: u32,
    /// Number of argument cells following the header
    pub argument_count: u16,
}

impl RecordHeader {
    /// Decode a published header word.
    pub fn decode(word: u64) -> Result<Self> {
        Ok(RecordHeader {
            kind: kind(word)?,
            format_id: format_id(word),
            argument_count: argument_count(word),
        })
    }

    /// Pack back into a header word.
    pub fn encode(&self) -> u64 {
        header(self.kind, self.format_id, self.argument_count)
    }

    /// Cells occupied by the whole record, header included.
    pub fn cells(&self) -> usize {
        self.argument_count as usize + 1
    }
}

/// A record as seen by the consumer: header plus its argument words
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Decoded header
    pub header: RecordHeader,
    /// Raw argument words, in submission order
    pub arguments: Vec<u64>,
}

impl Record {
    /// Argument reinterpreted as a float (the producer stored its bit pattern).
    pub fn f64_argument(&self, index: usize) -> Option<f64> {
        self.arguments.get(index).map(|word| f64::from_bits(*word))
    }

    /// Argument reinterpreted as a signed integer.
    pub fn i64_argument(&self, index: usize) -> Option<i64> {
        self.arguments.get(index).map(|word| *word as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_header_layout() {
        let h = header(RecordKind::LogRecord, 0xABCD_EF01, 0x0203);
        assert_eq!(h, 0x0001_ABCD_EF01_0203);
    }

    #[test]
    fn test_sentinel_is_not_valid() {
        assert!(!is_valid_header(NOT_SET));
        assert!(!is_valid_header(0));
    }

    #[test]
    fn test_known_kinds_are_valid() {
        assert!(is_valid_header(header(RecordKind::LogRecord, 0, 0)));
        assert!(is_valid_header(header(RecordKind::Timestamp, 0, 0)));
        assert!(is_valid_header(header(
            RecordKind::LogRecord,
            u32::MAX,
            u16::MAX
        )));
    }

    #[test]
    fn test_unknown_kind_is_decode_error() {
        let h = pack(7, 1, 1);
        match kind(h) {
            Err(Error::UnknownRecordKind { kind }) => assert_eq!(kind, 7),
            other => panic!("expected UnknownRecordKind, got {:?}", other),
        }
        assert!(RecordHeader::decode(h).is_err());
    }

    #[test]
    fn test_decode_encode() {
        let h = header(RecordKind::Timestamp, 42, 3);
        let decoded = RecordHeader::decode(h).unwrap();
        assert_eq!(decoded.kind, RecordKind::Timestamp);
        assert_eq!(decoded.format_id, 42);
        assert_eq!(decoded.argument_count, 3);
        assert_eq!(decoded.cells(), 4);
        assert_eq!(decoded.encode(), h);
    }

    #[test]
    fn test_record_argument_views() {
        let record = Record {
            header: RecordHeader {
                kind: RecordKind::LogRecord,
                format_id: 1,
                argument_count: 2,
            },
            arguments: vec![5.0f64.to_bits(), (-7i64) as u64],
        };
        assert_eq!(record.f64_argument(0), Some(5.0));
        assert_eq!(record.i64_argument(1), Some(-7));
        assert_eq!(record.i64_argument(2), None);
    }

    proptest! {
        #[test]
        fn prop_header_round_trip(
            raw_kind in 1u16..=u16::MAX,
            format_id in any::<u32>(),
            argument_count in any::<u16>(),
        ) {
            let h = pack(raw_kind, format_id, argument_count);
            prop_assert_eq!(super::raw_kind(h), raw_kind);
            prop_assert_eq!(super::format_id(h), format_id);
            prop_assert_eq!(super::argument_count(h), argument_count);
        }

        #[test]
        fn prop_positive_kinds_publish(
            raw_kind in 1u16..0x8000,
            format_id in any::<u32>(),
            argument_count in any::<u16>(),
        ) {
            prop_assert!(is_valid_header(pack(raw_kind, format_id, argument_count)));
        }
    }
}
