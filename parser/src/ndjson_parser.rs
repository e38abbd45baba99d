use crate::{base_parser::Parser, ParseError, ParseOutcome, ParsedFields, ParsedLine};
use std::io::{BufRead, BufReader, Read};

/// NDJSON parser - one already-split record per line
pub struct NdjsonParser;

impl Parser for NdjsonParser {
    fn name(&self) -> &'static str {
        "ndjson"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ndjson", "jsonl"]
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let sample = String::from_utf8_lossy(data);
        let trimmed = sample.trim();

        if !trimmed.starts_with('{') {
            return false;
        }

        // Check if first line is a valid record
        if let Some(first_line) = trimmed.lines().next() {
            serde_json::from_str::<ParsedFields>(first_line).is_ok()
        } else {
            false
        }
    }

    fn parse(&self, reader: Box<dyn Read>) -> Result<ParseOutcome, ParseError> {
        let buf_reader = BufReader::new(reader);
        let mut outcome = ParseOutcome::default();

        for (idx, line_result) in buf_reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();

            if line.is_empty() {
                outcome.blank_lines += 1;
                continue;
            }

            let fields: ParsedFields = serde_json::from_str(line)?;
            outcome.parsed.push(ParsedLine {
                line_no: idx + 1,
                raw: line.to_string(),
                fields,
            });
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const ROW: &str = r#"{"host":"h1","client_identd":"-","user_id":"-","date_time":"01/Aug/1995:00:00:08 -0400","method":"GET","endpoint":"/","protocol":"HTTP/1.0","response_code":"200","content_size":"-"}"#;

    #[test]
    fn test_ndjson_can_parse() {
        let parser = NdjsonParser;
        assert!(parser.can_parse(ROW.as_bytes()));
        assert!(!parser.can_parse(br#"{"ts_iso":"x"}"#));
        assert!(!parser.can_parse(b"host,client_identd\n"));
    }

    #[test]
    fn test_ndjson_parse() {
        let parser = NdjsonParser;
        let data = format!("{}\n\n{}\n", ROW, ROW.replace("h1", "h2"));

        let outcome = parser.parse(Box::new(Cursor::new(data))).unwrap();

        assert_eq!(outcome.parsed.len(), 2);
        assert_eq!(outcome.parsed[0].fields.content_size, "-");
        assert_eq!(outcome.parsed[1].fields.host, "h2");
        assert_eq!(outcome.parsed[1].line_no, 3);
        assert_eq!(outcome.parsed[0].raw, ROW);
        assert_eq!(outcome.blank_lines, 1);
    }

    #[test]
    fn test_ndjson_bad_record_is_error() {
        let parser = NdjsonParser;
        let result = parser.parse(Box::new(Cursor::new("{\"host\":1}\n")));
        assert!(matches!(result, Err(ParseError::Json(_))));
    }
}
