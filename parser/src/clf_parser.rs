use crate::{
    base_parser::Parser, clf, ParseError, ParseOutcome, ParsedLine, RejectReason, RejectedLine,
};
use std::io::{BufRead, BufReader, Read};
use tracing::{debug, info};

/// Plain-text access log, one Common Log Format record per line
pub struct ClfParser;

impl Parser for ClfParser {
    fn name(&self) -> &'static str {
        "clf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["log", "txt", "clf"]
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        // any line in the sample will do, the first one may be junk
        let sample = String::from_utf8_lossy(data);
        sample.lines().any(clf::is_apache_log_line)
    }

    fn parse(&self, reader: Box<dyn Read>) -> Result<ParseOutcome, ParseError> {
        let mut buf_reader = BufReader::new(reader);
        let mut outcome = ParseOutcome::default();
        let mut buf = Vec::new();
        let mut line_no = 0;

        // Read raw bytes: a log may carry client-supplied bytes that are not UTF-8.
        while buf_reader.read_until(b'\n', &mut buf)? > 0 {
            line_no += 1;
            let decoded = String::from_utf8_lossy(&buf);
            let line = decoded.trim_end_matches(['\n', '\r']);

            if line.trim().is_empty() {
                outcome.blank_lines += 1;
            } else if let Some(fields) = clf::parse_apache_log_line(line) {
                outcome.parsed.push(ParsedLine {
                    line_no,
                    raw: line.to_string(),
                    fields,
                });
            } else {
                debug!("Line {} did not match the access log pattern", line_no);
                outcome.rejected.push(RejectedLine {
                    line_no,
                    raw: line.to_string(),
                    reason: RejectReason::NoMatch,
                });
            }
            buf.clear();
        }

        info!(
            "CLF parsing complete: {} parsed, {} rejected, {} blank",
            outcome.parsed.len(),
            outcome.rejected.len(),
            outcome.blank_lines
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_clf_parse_mixed_lines() {
        let parser = ClfParser;
        let data = "199.72.81.55 - - [01/Jul/1995:00:00:01 -0400] \"GET /history/apollo/ HTTP/1.0\" 200 6245\r\n\
                    \n\
                    this is not a log line\n\
                    burger.letters.com - - [01/Jul/1995:00:00:12 -0400] \"GET /images/NASA-logosmall.gif HTTP/1.0\" 304 0";

        let outcome = parser.parse(Box::new(Cursor::new(data))).unwrap();

        assert_eq!(outcome.parsed.len(), 2);
        assert_eq!(outcome.parsed[0].line_no, 1);
        assert_eq!(outcome.parsed[0].fields.content_size, "6245");
        assert!(outcome.parsed[0].raw.ends_with("200 6245"));
        assert_eq!(outcome.parsed[1].line_no, 4);
        assert_eq!(outcome.parsed[1].fields.host, "burger.letters.com");

        assert_eq!(outcome.blank_lines, 1);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].line_no, 3);
        assert_eq!(outcome.rejected[0].reason, RejectReason::NoMatch);
        assert_eq!(outcome.total_lines(), 4);
    }

    #[test]
    fn test_clf_parse_invalid_utf8() {
        let parser = ClfParser;
        let mut data = b"h - - [01/Jul/1995:00:00:01 -0400] \"GET /a".to_vec();
        data.push(0xff);
        data.extend_from_slice(b" HTTP/1.0\" 200 1\n");

        let outcome = parser.parse(Box::new(Cursor::new(data))).unwrap();
        assert_eq!(outcome.parsed.len(), 1);
        assert_eq!(outcome.parsed[0].fields.endpoint, "/a\u{fffd}");
    }

    #[test]
    fn test_clf_can_parse() {
        let parser = ClfParser;
        assert!(parser.can_parse(
            b"\nh - - [01/Jul/1995:00:00:01 -0400] \"GET /a HTTP/1.0\" 200 1\n"
        ));
        assert!(parser.can_parse(
            b"junk header\nh - - [01/Jul/1995:00:00:01 -0400] \"GET /a HTTP/1.0\" 200 1\n"
        ));
        assert!(!parser.can_parse(b"{\"host\":\"h\"}"));
    }
}
