use crate::base_parser::{detect_format, Parser};
use crate::parsers::all_parsers;
use crate::{ParseError, ParseOutcome};
use std::io::{Cursor, Read};
use tracing::{debug, error, info, warn};

const SAMPLE_SIZE: usize = 512;

/// ParserRegistry - manages available input formats and auto-detects them
///
/// New formats are registered in `parsers.rs`; this file does not change.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        info!("Initializing ParserRegistry");
        let parsers = all_parsers();

        info!(
            "Registered {} parsers: {}",
            parsers.len(),
            parsers.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
        );

        Self { parsers }
    }

    /// Register a custom parser
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        info!("Registering custom parser: {}", parser.name());
        debug!("Parser supports extensions: {:?}", parser.extensions());
        self.parsers.push(parser);
    }

    /// Get parser by name
    pub fn get_parser(&self, name: &str) -> Option<&dyn Parser> {
        let result = self.parsers.iter().find(|p| p.name() == name).map(|p| p.as_ref());

        if result.is_none() {
            warn!("Parser not found: {}", name);
        }

        result
    }

    /// Get parser by file extension
    pub fn get_parser_by_extension(&self, extension: &str) -> Option<&dyn Parser> {
        let extension = extension.to_ascii_lowercase();
        let result = self
            .parsers
            .iter()
            .find(|p| p.extensions().contains(&extension.as_str()))
            .map(|p| p.as_ref());

        match result {
            Some(parser) => info!("Selected parser '{}' for extension '.{}'", parser.name(), extension),
            None => debug!("No parser registered for extension '.{}'", extension),
        }

        result
    }

    /// Auto-detect the format from the first bytes and parse.
    ///
    /// Returns the name of the parser used alongside the outcome.
    pub fn parse_auto(
        &self,
        mut reader: Box<dyn Read>,
    ) -> Result<(&'static str, ParseOutcome), ParseError> {
        info!("Starting auto-detection of file format");

        let sample = read_sample(&mut reader)?;
        debug!("Read {} byte sample for format detection", sample.len());

        let format = detect_format(&sample);
        info!("Format hint from content analysis: {:?}", format);

        let parser = match format.parser_name() {
            Some(name) => self.get_parser(name),
            None => {
                warn!("Format unknown, trying parsers individually");
                self.parsers
                    .iter()
                    .find(|p| {
                        let can_parse = p.can_parse(&sample);
                        debug!("Parser '{}' can_parse result: {}", p.name(), can_parse);
                        can_parse
                    })
                    .map(|p| p.as_ref())
            }
        };

        let Some(parser) = parser else {
            error!("Unable to detect format - no suitable parser found");
            return Err(ParseError::UnknownFormat);
        };

        info!("Selected parser: {}", parser.name());
        let combined = Box::new(Cursor::new(sample).chain(reader));
        Ok((parser.name(), parser.parse(combined)?))
    }

    /// Parse with explicit format hint (filename extension)
    pub fn parse_with_hint(
        &self,
        reader: Box<dyn Read>,
        filename: &str,
    ) -> Result<(&'static str, ParseOutcome), ParseError> {
        info!("Parsing file with hint: {}", filename);

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or("");

        if let Some(parser) = self.get_parser_by_extension(extension) {
            info!("Using parser '{}' for file '{}'", parser.name(), filename);
            Ok((parser.name(), parser.parse(reader)?))
        } else {
            warn!(
                "No parser found for extension '{}', falling back to auto-detection",
                extension
            );
            self.parse_auto(reader)
        }
    }

    /// Parser by name, or auto-detection when `format` is `None`.
    pub fn parse_as(
        &self,
        reader: Box<dyn Read>,
        format: Option<&str>,
    ) -> Result<(&'static str, ParseOutcome), ParseError> {
        match format {
            Some(name) => {
                let parser = self
                    .get_parser(name)
                    .ok_or_else(|| ParseError::Custom(format!("Unknown format: {}", name)))?;
                Ok((parser.name(), parser.parse(reader)?))
            }
            None => self.parse_auto(reader),
        }
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A single `read` may return fewer bytes than asked; keep going until the
/// sample is full or the input ends.
fn read_sample(reader: &mut Box<dyn Read>) -> std::io::Result<Vec<u8>> {
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    reader.by_ref().take(SAMPLE_SIZE as u64).read_to_end(&mut sample)?;
    Ok(sample)
}
