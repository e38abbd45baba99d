use clf_parser::{ParsedFields, RejectReason};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub source: String,
    pub format: String,
    pub row_count: usize,
    pub rejected_count: usize,
    pub blank_lines: usize,
    pub t_min_ns: i64,
    pub t_max_ns: i64,
    pub distinct_hosts: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub meta: SessionMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParseLineRequest {
    pub line: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseLineResponse {
    pub matched: bool,
    /// Field name/value pairs in capture order
    pub fields: Option<Vec<(String, String)>>,
    /// RFC 3339, keeping the log's own offset
    pub timestamp: Option<String>,
}

impl ParseLineResponse {
    pub fn from_line(line: &str) -> Self {
        match clf_parser::parse_apache_log_line(line) {
            Some(fields) => {
                let timestamp =
                    clf_parser::parse_apache_time(&fields.date_time).map(|dt| dt.to_rfc3339());
                let pairs = fields
                    .entries()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();

                Self {
                    matched: true,
                    fields: Some(pairs),
                    timestamp,
                }
            }
            None => Self {
                matched: false,
                fields: None,
                timestamp: None,
            },
        }
    }
}

/// One log line after type coercion, ready for Arrow storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub host: String,
    pub client_identd: String,
    pub user_id: String,
    /// UTC instant
    pub ts_ns: i64,
    /// Offset the line was written in, seconds east of UTC
    pub utc_offset_secs: i32,
    pub method: String,
    pub endpoint: String,
    pub protocol: String,
    pub response_code: u16,
    pub content_size: u64,
    pub row_id: u32,
}

impl LogRecord {
    /// Coerce the raw string fields. A `-` content size counts as zero bytes.
    ///
    /// NDJSON and CSV rows bypass the line grammar, so an empty host is
    /// checked here as well.
    pub fn from_parsed(fields: &ParsedFields, row_id: u32) -> Result<Self, RejectReason> {
        if fields.host.trim().is_empty() {
            return Err(RejectReason::EmptyHost);
        }

        let dt = clf_parser::parse_apache_time(&fields.date_time)
            .ok_or(RejectReason::InvalidTimestamp)?;
        let ts_ns = dt
            .timestamp_nanos_opt()
            .ok_or(RejectReason::InvalidTimestamp)?;

        let response_code = fields
            .response_code
            .parse::<u16>()
            .map_err(|_| RejectReason::InvalidResponseCode)?;

        let content_size = parse_content_size(&fields.content_size)
            .ok_or(RejectReason::InvalidContentSize)?;

        Ok(LogRecord {
            host: fields.host.clone(),
            client_identd: fields.client_identd.clone(),
            user_id: fields.user_id.clone(),
            ts_ns,
            utc_offset_secs: dt.offset().local_minus_utc(),
            method: fields.method.clone(),
            endpoint: fields.endpoint.clone(),
            protocol: fields.protocol.clone(),
            response_code,
            content_size,
            row_id,
        })
    }
}

fn parse_content_size(raw: &str) -> Option<u64> {
    if raw == "-" {
        return Some(0);
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(date_time: &str, code: &str, size: &str) -> ParsedFields {
        ParsedFields {
            host: "uplherc.upl.com".into(),
            client_identd: "-".into(),
            user_id: "-".into(),
            date_time: date_time.into(),
            method: "GET".into(),
            endpoint: "/images/ksclogo-medium.gif".into(),
            protocol: "HTTP/1.0".into(),
            response_code: code.into(),
            content_size: size.into(),
        }
    }

    #[test]
    fn test_from_parsed() {
        let rec = LogRecord::from_parsed(&fields("01/Aug/1995:00:00:08 -0400", "304", "1204"), 7)
            .unwrap();

        assert_eq!(rec.response_code, 304);
        assert_eq!(rec.content_size, 1204);
        assert_eq!(rec.utc_offset_secs, -4 * 3600);
        // 1995-08-01T04:00:08Z
        assert_eq!(rec.ts_ns, 807_249_608 * 1_000_000_000);
        assert_eq!(rec.row_id, 7);
    }

    #[test]
    fn test_dash_content_size_is_zero() {
        let rec =
            LogRecord::from_parsed(&fields("01/Aug/1995:00:00:08 -0400", "404", "-"), 0).unwrap();
        assert_eq!(rec.content_size, 0);
    }

    #[test]
    fn test_coercion_failures() {
        let bad_time = LogRecord::from_parsed(&fields("01/Foo/1995:00:00:08 -0400", "200", "1"), 0);
        assert_eq!(bad_time, Err(RejectReason::InvalidTimestamp));

        let bad_size = LogRecord::from_parsed(&fields("01/Aug/1995:00:00:08 -0400", "200", "1k"), 0);
        assert_eq!(bad_size, Err(RejectReason::InvalidContentSize));

        let bad_code = LogRecord::from_parsed(&fields("01/Aug/1995:00:00:08 -0400", "2x0", "1"), 0);
        assert_eq!(bad_code, Err(RejectReason::InvalidResponseCode));

        let mut no_host = fields("01/Aug/1995:00:00:08 -0400", "200", "1");
        no_host.host = String::new();
        assert_eq!(LogRecord::from_parsed(&no_host, 0), Err(RejectReason::EmptyHost));
    }

    #[test]
    fn test_parse_line_response() {
        let resp = ParseLineResponse::from_line(
            r#"uplherc.upl.com - - [01/Aug/1995:00:00:08 -0400] "GET /images/ksclogo-medium.gif HTTP/1.0" 304 0"#,
        );
        assert!(resp.matched);
        assert_eq!(resp.timestamp.as_deref(), Some("1995-08-01T00:00:08-04:00"));
        let fields = resp.fields.unwrap();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[0], ("host".to_string(), "uplherc.upl.com".to_string()));

        let resp = ParseLineResponse::from_line("nope");
        assert!(!resp.matched);
        assert!(resp.fields.is_none());
    }
}
