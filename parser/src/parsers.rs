//! Central list of input formats.
//!
//! A new format only needs its own module, a re-export in `lib.rs`, and a
//! line in [`all_parsers`]. The registry picks it up from here.

use crate::base_parser::Parser;
use crate::{ClfParser, CsvParser, NdjsonParser};
use tracing::info;

/// Returns every available input format, most common first.
pub fn all_parsers() -> Vec<Box<dyn Parser>> {
    info!("Initializing parser collection");

    crate::register_parsers![ClfParser, NdjsonParser, CsvParser]
}

/// Boxes a list of parsers as `Vec<Box<dyn Parser>>`.
///
/// ```rust,ignore
/// let parsers = register_parsers![ClfParser, CsvParser];
/// ```
#[macro_export]
macro_rules! register_parsers {
    ($($parser:expr),* $(,)?) => {
        vec![
            $(Box::new($parser) as Box<dyn $crate::base_parser::Parser>),*
        ]
    };
}
