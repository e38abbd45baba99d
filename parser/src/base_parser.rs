use crate::{clf, ParseError, ParseOutcome};
use std::io::Read;

/// Base trait that all input formats must implement
/// Uses Box<dyn Read> to be object-safe (dyn compatible)
pub trait Parser: Send + Sync {
    /// Returns the name of this parser (e.g., "clf", "ndjson", "csv")
    fn name(&self) -> &'static str;

    /// Returns the file extensions this parser supports (e.g., ["log", "txt"])
    fn extensions(&self) -> &'static [&'static str];

    /// Checks if this parser can handle the given data by inspecting content
    fn can_parse(&self, data: &[u8]) -> bool;

    /// Parse the whole input. Lines that do not fit the format are reported
    /// in the outcome; only I/O and decoding problems are errors.
    fn parse(&self, reader: Box<dyn Read>) -> Result<ParseOutcome, ParseError>;
}

/// Helper to detect format from content
pub fn detect_format(data: &[u8]) -> FormatHint {
    let sample = String::from_utf8_lossy(data);
    let trimmed = sample.trim_start();
    let first_line = trimmed.lines().next().unwrap_or("");

    if first_line.starts_with("host,client_identd,") {
        return FormatHint::Csv;
    }

    if first_line.starts_with('{') {
        return FormatHint::Ndjson;
    }

    if clf::is_apache_log_line(first_line) {
        return FormatHint::Clf;
    }

    FormatHint::Unknown
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Clf,
    Csv,
    Ndjson,
    Unknown,
}

impl FormatHint {
    pub fn parser_name(&self) -> Option<&'static str> {
        match self {
            FormatHint::Clf => Some("clf"),
            FormatHint::Csv => Some("csv"),
            FormatHint::Ndjson => Some("ndjson"),
            FormatHint::Unknown => None,
        }
    }
}
