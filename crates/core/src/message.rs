//! Interned message metadata

use crate::error::{Error, Result};

/// Immutable description of one interned format string.
///
/// Created once per distinct format seen by a catalog and shared by every
/// producer that logs with it.
#[derive(Debug, PartialEq, Eq)]
pub struct MessageInfo {
    format: String,
    argument_count: u16,
    format_id: u32,
}

impl MessageInfo {
    /// Build metadata for `format`, counting its placeholders.
    pub fn new(format: impl Into<String>, format_id: u32) -> Result<Self> {
        let format = format.into();
        let count = count_placeholders(&format);
        let argument_count = u16::try_from(count).map_err(|_| {
            Error::InvalidFormat(format!(
                "{} placeholders exceed the {} arguments a record can carry",
                count,
                u16::MAX
            ))
        })?;
        Ok(MessageInfo {
            format,
            argument_count,
            format_id,
        })
    }

    /// The format string
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Arguments expected per record
    pub fn argument_count(&self) -> u16 {
        self.argument_count
    }

    /// Catalog-assigned id, written into every record header
    pub fn format_id(&self) -> u32 {
        self.format_id
    }

    /// Cells claimed per record (header included)
    pub fn record_cells(&self) -> usize {
        self.argument_count as usize + 1
    }
}

/// Count `%` placeholders in a format string; `%%` is an escaped literal.
pub fn count_placeholders(format: &str) -> usize {
    let mut count = 0;
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            if chars.peek() == Some(&'%') {
                chars.next();
            } else {
                count += 1;
            }
        }
    }
    count
}
