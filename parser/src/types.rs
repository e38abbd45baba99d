use serde::{Deserialize, Serialize};

/// Field names of a Common Log Format record, in capture order.
pub const FIELD_NAMES: [&str; 9] = [
    "host",
    "client_identd",
    "user_id",
    "date_time",
    "method",
    "endpoint",
    "protocol",
    "response_code",
    "content_size",
];

/// The nine raw fields captured from one CLF line.
///
/// Values are the literal matched substrings. Type coercion (status code,
/// content size, timestamp) is left to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFields {
    pub host: String,
    pub client_identd: String,
    pub user_id: String,
    pub date_time: String,
    pub method: String,
    pub endpoint: String,
    pub protocol: String,
    pub response_code: String,
    pub content_size: String,
}

impl ParsedFields {
    /// Name/value pairs in the fixed field order.
    pub fn entries(&self) -> [(&'static str, &str); 9] {
        [
            (FIELD_NAMES[0], self.host.as_str()),
            (FIELD_NAMES[1], self.client_identd.as_str()),
            (FIELD_NAMES[2], self.user_id.as_str()),
            (FIELD_NAMES[3], self.date_time.as_str()),
            (FIELD_NAMES[4], self.method.as_str()),
            (FIELD_NAMES[5], self.endpoint.as_str()),
            (FIELD_NAMES[6], self.protocol.as_str()),
            (FIELD_NAMES[7], self.response_code.as_str()),
            (FIELD_NAMES[8], self.content_size.as_str()),
        ]
    }

    /// Render the fields back as a Common Log Format line.
    pub fn to_log_line(&self) -> String {
        let request = if self.protocol.is_empty() {
            format!("{} {}", self.method, self.endpoint)
        } else {
            format!("{} {} {}", self.method, self.endpoint, self.protocol)
        };

        format!(
            "{} {} {} [{}] \"{}\" {} {}",
            self.host,
            self.client_identd,
            self.user_id,
            self.date_time,
            request,
            self.response_code,
            self.content_size
        )
    }
}

/// Why a line did not become a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoMatch,
    EmptyHost,
    InvalidTimestamp,
    InvalidResponseCode,
    InvalidContentSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedLine {
    /// 1-based line number in the source file
    pub line_no: usize,
    pub raw: String,
    pub reason: RejectReason,
}

/// A successfully parsed line together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub line_no: usize,
    /// The input text the fields came from
    pub raw: String,
    pub fields: ParsedFields,
}

/// Result of parsing a whole input: matched lines plus the ones that
/// did not fit the grammar.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub parsed: Vec<ParsedLine>,
    pub rejected: Vec<RejectedLine>,
    pub blank_lines: usize,
}

impl ParseOutcome {
    pub fn total_lines(&self) -> usize {
        self.parsed.len() + self.rejected.len() + self.blank_lines
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Unable to detect format")]
    UnknownFormat,
    #[error("{0}")]
    Custom(String),
}

impl From<String> for ParseError {
    fn from(msg: String) -> Self {
        ParseError::Custom(msg)
    }
}

impl From<&str> for ParseError {
    fn from(msg: &str) -> Self {
        ParseError::Custom(msg.to_string())
    }
}
