use crate::ParsedFields;
use regex::Regex;
use std::sync::LazyLock;

/// Common Log Format, anchored at the start of the line.
///
/// The request protocol is optional and whitespace before the closing quote
/// is not part of it. Anything after the content size is ignored.
pub const APACHE_ACCESS_LOG_PATTERN: &str =
    r#"^(\S+) (\S+) (\S+) \[([\w:/]+\s[+\-]\d{4})\] "(\S+) (\S+)\s*(\S*)\s*" (\d{3}) (\S+)"#;

static CLF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(APACHE_ACCESS_LOG_PATTERN).expect("CLF pattern is a valid regex")
});

/// Parse one access log line.
///
/// Returns `None` when the line does not match the grammar. A match always
/// fills all nine fields.
pub fn parse_apache_log_line(line: &str) -> Option<ParsedFields> {
    let caps = CLF_REGEX.captures(line)?;
    let group = |i: usize| caps.get(i).map_or_else(String::new, |m| m.as_str().to_string());

    Some(ParsedFields {
        host: group(1),
        client_identd: group(2),
        user_id: group(3),
        date_time: group(4),
        method: group(5),
        endpoint: group(6),
        protocol: group(7),
        response_code: group(8),
        content_size: group(9),
    })
}

/// Cheap check used by format detection.
pub fn is_apache_log_line(line: &str) -> bool {
    CLF_REGEX.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FIELD_NAMES;

    const SAMPLE: &str = r#"uplherc.upl.com - - [01/Aug/1995:00:00:08 -0400] "GET /images/ksclogo-medium.gif HTTP/1.0" 304 0"#;

    #[test]
    fn test_parse_sample_line() {
        let fields = parse_apache_log_line(SAMPLE).unwrap();

        assert_eq!(fields.host, "uplherc.upl.com");
        assert_eq!(fields.client_identd, "-");
        assert_eq!(fields.user_id, "-");
        assert_eq!(fields.date_time, "01/Aug/1995:00:00:08 -0400");
        assert_eq!(fields.method, "GET");
        assert_eq!(fields.endpoint, "/images/ksclogo-medium.gif");
        assert_eq!(fields.protocol, "HTTP/1.0");
        assert_eq!(fields.response_code, "304");
        assert_eq!(fields.content_size, "0");
    }

    #[test]
    fn test_entries_follow_field_order() {
        let fields = parse_apache_log_line(SAMPLE).unwrap();
        let names: Vec<&str> = fields.entries().iter().map(|(k, _)| *k).collect();
        assert_eq!(names, FIELD_NAMES);
        assert_eq!(fields.entries()[5], ("endpoint", "/images/ksclogo-medium.gif"));
    }

    #[test]
    fn test_missing_protocol() {
        let line = r#"host1 - - [01/Aug/1995:00:00:08 -0400] "GET /path" 200 12"#;
        let fields = parse_apache_log_line(line).unwrap();
        assert_eq!(fields.endpoint, "/path");
        assert_eq!(fields.protocol, "");
        assert_eq!(fields.response_code, "200");
    }

    #[test]
    fn test_trailing_space_before_quote() {
        let line = r#"host1 - - [01/Aug/1995:00:00:08 -0400] "GET /path HTTP/1.0 " 200 12"#;
        let fields = parse_apache_log_line(line).unwrap();
        assert_eq!(fields.protocol, "HTTP/1.0");

        let line = r#"host1 - - [01/Aug/1995:00:00:08 -0400] "GET /path " 200 12"#;
        let fields = parse_apache_log_line(line).unwrap();
        assert_eq!(fields.endpoint, "/path");
        assert_eq!(fields.protocol, "");
    }

    #[test]
    fn test_dash_content_size_kept_raw() {
        let line = r#"host1 - - [01/Aug/1995:00:00:08 -0400] "GET /missing.html HTTP/1.0" 404 -"#;
        let fields = parse_apache_log_line(line).unwrap();
        assert_eq!(fields.content_size, "-");
        assert_eq!(fields.response_code, "404");
    }

    #[test]
    fn test_control_characters_are_data() {
        let line = "host\u{1}x - - [01/Aug/1995:00:00:08 -0400] \"GET /a\u{7}b HTTP/1.0\" 200 5";
        let fields = parse_apache_log_line(line).unwrap();
        assert_eq!(fields.host, "host\u{1}x");
        assert_eq!(fields.endpoint, "/a\u{7}b");
    }

    #[test]
    fn test_combined_format_suffix_ignored() {
        let line = r#"10.0.0.1 - bob [10/Oct/2000:13:55:36 -0700] "GET /a.gif HTTP/1.0" 200 2326 "http://ref/" "Mozilla/4.08""#;
        let fields = parse_apache_log_line(line).unwrap();
        assert_eq!(fields.user_id, "bob");
        assert_eq!(fields.content_size, "2326");
    }

    #[test]
    fn test_non_matching_lines() {
        assert!(parse_apache_log_line("").is_none());
        assert!(parse_apache_log_line("garbage").is_none());
        // status must be exactly three digits
        assert!(parse_apache_log_line(
            r#"h - - [01/Aug/1995:00:00:08 -0400] "GET /a HTTP/1.0" 20 5"#
        )
        .is_none());
        // missing bracketed timestamp
        assert!(parse_apache_log_line(r#"h - - "GET /a HTTP/1.0" 200 5"#).is_none());
        // request with only a method
        assert!(parse_apache_log_line(
            r#"h - - [01/Aug/1995:00:00:08 -0400] "GET" 200 5"#
        )
        .is_none());
        assert!(!is_apache_log_line("garbage"));
    }

    #[test]
    fn test_to_log_line_reparses() {
        let fields = parse_apache_log_line(SAMPLE).unwrap();
        assert_eq!(fields.to_log_line(), SAMPLE);

        let line = r#"h - - [01/Aug/1995:00:00:08 -0400] "GET /path" 200 -"#;
        let fields = parse_apache_log_line(line).unwrap();
        assert_eq!(fields.to_log_line(), line);
        assert_eq!(parse_apache_log_line(&fields.to_log_line()), Some(fields));
    }

    #[test]
    fn test_parse_is_idempotent() {
        assert_eq!(parse_apache_log_line(SAMPLE), parse_apache_log_line(SAMPLE));
        assert_eq!(parse_apache_log_line("bad"), parse_apache_log_line("bad"));
    }
}
