//! Ordered, first-match dispatch over the lab-specific parsers.

use crate::error::ExtractError;
use crate::parsers::{default_parsers, LabParser};
use crate::record::{ResultRecord, UNKNOWN_LAB};
use std::panic::{self, AssertUnwindSafe};

/// Records from a registry parse, with the provenance of whichever parser
/// produced them
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub records: Vec<ResultRecord>,
    pub lab_name: String,
    /// Method tag of the matched parser, `None` when nothing matched
    pub method_tag: Option<&'static str>,
}

impl ParseOutcome {
    fn unmatched() -> Self {
        Self {
            records: Vec::new(),
            lab_name: UNKNOWN_LAB.to_string(),
            method_tag: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.method_tag.is_some()
    }
}

/// Holds parsers in registration order. The first parser whose detection
/// accepts the text wins; there is no scoring between parsers.
///
/// A parser that panics, or returns an error from `parse`, is treated as not
/// matching and dispatch falls through to the next one.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn LabParser>>,
}

impl ParserRegistry {
    /// An empty registry. Nothing matches until parsers are registered.
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Registry preloaded with the built-in parsers
    pub fn with_defaults() -> Self {
        Self {
            parsers: default_parsers(),
        }
    }

    /// Append a parser; it is tried after every parser already registered
    pub fn register(&mut self, parser: Box<dyn LabParser>) {
        tracing::debug!(parser = parser.name(), "Registered lab parser");
        self.parsers.push(parser);
    }

    /// Parser names in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }

    /// First parser, in registration order, whose detection accepts `text`
    pub fn match_parser(&self, text: &str) -> Option<&dyn LabParser> {
        self.parsers
            .iter()
            .map(|p| p.as_ref())
            .find(|parser| detects(*parser, text))
    }

    /// Parse with the first parser that both detects the text and parses it
    /// without faulting. Records carry the matched parser's lab name.
    pub fn parse(&self, text: &str) -> ParseOutcome {
        for parser in &self.parsers {
            if !detects(parser.as_ref(), text) {
                continue;
            }

            let mut records = match parse_isolated(parser.as_ref(), text) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(error = %e, "Lab parser faulted; treating as no match");
                    continue;
                }
            };
            for record in &mut records {
                record.lab_name = parser.name().to_string();
            }

            tracing::debug!(
                parser = parser.name(),
                count = records.len(),
                "Lab parser matched"
            );
            return ParseOutcome {
                records,
                lab_name: parser.name().to_string(),
                method_tag: Some(parser.method_tag()),
            };
        }

        ParseOutcome::unmatched()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn detects(parser: &dyn LabParser, text: &str) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| parser.detect(text))) {
        Ok(accepted) => accepted,
        Err(payload) => {
            tracing::warn!(
                parser = parser.name(),
                panic = panic_message(payload.as_ref()),
                "Lab parser detection panicked; treating as no match"
            );
            false
        }
    }
}

/// Run `parse`, reporting a panic as a [`ExtractError::ParserFault`]
fn parse_isolated(parser: &dyn LabParser, text: &str) -> Result<Vec<ResultRecord>, ExtractError> {
    panic::catch_unwind(AssertUnwindSafe(|| parser.parse(text))).unwrap_or_else(|payload| {
        Err(ExtractError::ParserFault {
            parser: parser.name().to_string(),
            message: format!("panicked: {}", panic_message(payload.as_ref())),
        })
    })
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
