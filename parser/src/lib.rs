// Parser crate for Apache Common Log Format access logs

pub mod types;
pub mod clf;
pub mod timestamp;
pub mod base_parser;
pub mod parsers;
pub mod registry_parser;

// Input formats
pub mod clf_parser;
pub mod ndjson_parser;
pub mod csv_parser;

// Re-export main types
pub use types::*;
pub use clf::{parse_apache_log_line, APACHE_ACCESS_LOG_PATTERN};
pub use timestamp::{format_apache_time, parse_apache_time};
pub use base_parser::{FormatHint, Parser};
pub use registry_parser::ParserRegistry;

// Re-export parsers
pub use clf_parser::ClfParser;
pub use csv_parser::CsvParser;
pub use ndjson_parser::NdjsonParser;
