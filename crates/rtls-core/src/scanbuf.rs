//! Last-scan buffer for kiosk registration
//!
//! Handheld scanners at the registration desk post raw reads here. The
//! buffer keeps only the most recent one so the kiosk form can prefill the
//! tag field, and creating a work order clears it. Best-effort state: it
//! lives in memory and is lost on restart.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One remembered scanner read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRead {
    pub code: String,
    pub scanned_at: DateTime<Utc>,
}

/// Shared single-slot buffer, safe to hand to concurrent handlers
#[derive(Debug)]
pub struct ScanBuffer {
    latest: Mutex<Option<ScanRead>>,
    field_delimiter: String,
    line_separator: String,
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::with_delimiters(";", "\n")
    }
}

impl ScanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer with default delimiters for feeds that do not name their own
    pub fn with_delimiters(
        field_delimiter: impl Into<String>,
        line_separator: impl Into<String>,
    ) -> Self {
        Self {
            latest: Mutex::new(None),
            field_delimiter: field_delimiter.into(),
            line_separator: line_separator.into(),
        }
    }

    /// Store the code carried by a raw scanner payload
    ///
    /// Scanners send free text, one read per line, sometimes with extra
    /// delimited fields. The first non-empty field of the first non-empty
    /// line wins. Returns `None` without touching the buffer when nothing
    /// usable is found.
    pub fn record(&self, raw: &str) -> Option<ScanRead> {
        self.record_delimited(raw, None, None)
    }

    /// Like [`record`](Self::record) with the delimiters the feed itself
    /// names; `None` falls back to the configured defaults
    pub fn record_delimited(
        &self,
        raw: &str,
        line_separator: Option<&str>,
        field_delimiter: Option<&str>,
    ) -> Option<ScanRead> {
        let line_separator = line_separator.unwrap_or(&self.line_separator);
        let field_delimiter = field_delimiter.unwrap_or(&self.field_delimiter);

        let line = Self::first_unit(raw, line_separator)?;
        let code = Self::first_unit(line, field_delimiter)?.to_string();
        let read = ScanRead {
            code,
            scanned_at: Utc::now(),
        };
        *self.lock() = Some(read.clone());
        Some(read)
    }

    /// The most recent read, if any
    pub fn latest(&self) -> Option<ScanRead> {
        self.lock().clone()
    }

    /// Drop the buffered read
    pub fn clear(&self) {
        *self.lock() = None;
    }

    /// First non-empty piece after trimming; an empty delimiter treats the
    /// whole text as one piece
    fn first_unit<'a>(text: &'a str, delimiter: &str) -> Option<&'a str> {
        if delimiter.is_empty() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        } else {
            text.split(delimiter)
                .map(str::trim)
                .find(|part| !part.is_empty())
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<ScanRead>> {
        self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_latest() {
        let buffer = ScanBuffer::new();
        assert!(buffer.latest().is_none());

        let read = buffer.record("E28011700000020F\n").unwrap();
        assert_eq!(read.code, "E28011700000020F");
        assert_eq!(buffer.latest().unwrap().code, "E28011700000020F");
    }

    #[test]
    fn test_newest_read_wins() {
        let buffer = ScanBuffer::new();
        buffer.record("FIRST");
        buffer.record("SECOND");
        assert_eq!(buffer.latest().unwrap().code, "SECOND");
    }

    #[test]
    fn test_multi_field_payload() {
        let buffer = ScanBuffer::new();
        let read = buffer.record("; E2801170;extra").unwrap();
        assert_eq!(read.code, "E2801170");
    }

    #[test]
    fn test_custom_default_delimiters() {
        let buffer = ScanBuffer::with_delimiters("|", "\n");
        let read = buffer.record("E2801170|shelf-3").unwrap();
        assert_eq!(read.code, "E2801170");
    }

    #[test]
    fn test_feed_names_its_own_delimiters() {
        let buffer = ScanBuffer::new();
        let read = buffer
            .record_delimited("#E2801170,rest#junk", Some("#"), Some(","))
            .unwrap();
        assert_eq!(read.code, "E2801170");
    }

    #[test]
    fn test_empty_delimiter_takes_whole_line() {
        let buffer = ScanBuffer::with_delimiters("", "\n");
        let read = buffer.record("E2801170;shelf-3").unwrap();
        assert_eq!(read.code, "E2801170;shelf-3");
    }

    #[test]
    fn test_blank_payload_keeps_buffer() {
        let buffer = ScanBuffer::new();
        buffer.record("KEPT");
        assert!(buffer.record("  \n ;; \n").is_none());
        assert_eq!(buffer.latest().unwrap().code, "KEPT");
    }

    #[test]
    fn test_clear() {
        let buffer = ScanBuffer::new();
        buffer.record("GONE");
        buffer.clear();
        assert!(buffer.latest().is_none());
    }
}
