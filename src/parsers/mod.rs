//! Lab-specific report parsers.
//!
//! Each parser recognizes one lab's layout and turns its text into
//! [`ResultRecord`]s. Parsers are stateless and safe to share across threads;
//! the [`ParserRegistry`](crate::registry::ParserRegistry) decides which one
//! runs.

pub mod common;
pub mod labcorp;
pub mod mychart;
pub mod quest;

use crate::error::ExtractError;
use crate::record::ResultRecord;

pub use labcorp::LabCorpParser;
pub use mychart::MyChartParser;
pub use quest::QuestParser;

/// A parser for one lab's report layout
pub trait LabParser: Send + Sync {
    /// Lab name stamped on every record this parser produces
    fn name(&self) -> &'static str;

    /// Method tag reported when this parser's records are returned
    fn method_tag(&self) -> &'static str;

    /// Confidence assigned to this parser's records
    fn confidence(&self) -> f32;

    /// Whether `text` looks like this lab's layout. Pure; never fails.
    fn detect(&self, text: &str) -> bool;

    /// Parse results in document order. An empty list is a valid outcome.
    fn parse(&self, text: &str) -> Result<Vec<ResultRecord>, ExtractError>;
}

/// Built-in parsers in priority order: the most distinctive layouts first,
/// the patient-portal export last.
pub fn default_parsers() -> Vec<Box<dyn LabParser>> {
    vec![
        Box::new(LabCorpParser),
        Box::new(QuestParser),
        Box::new(MyChartParser),
    ]
}
