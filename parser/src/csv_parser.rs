use crate::{base_parser::Parser, ParseError, ParseOutcome, ParsedFields, ParsedLine};
use csv::{Reader, StringRecord, Writer};
use std::io::Read;

/// CSV parser - a header row with the nine field names, then one record per row
pub struct CsvParser;

impl Parser for CsvParser {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let sample = String::from_utf8_lossy(data);
        sample.trim_start().starts_with("host,client_identd,")
    }

    fn parse(&self, reader: Box<dyn Read>) -> Result<ParseOutcome, ParseError> {
        let mut csv_reader = Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut outcome = ParseOutcome::default();

        for record_result in csv_reader.records() {
            let record = record_result?;
            let fields: ParsedFields = record.deserialize(Some(&headers))?;
            // line the record starts on; quoted fields may span several
            let line_no = record.position().map_or(0, |pos| pos.line() as usize);
            outcome.parsed.push(ParsedLine {
                line_no,
                raw: record_text(&record)?,
                fields,
            });
        }

        Ok(outcome)
    }
}

/// The record written back as one CSV row, without the terminator.
fn record_text(record: &StringRecord) -> Result<String, ParseError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(record)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ParseError::Custom(format!("CSV writer error: {}", e)))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_end_matches(['\n', '\r']).to_string())
}
