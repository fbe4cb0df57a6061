//! Lab report extraction engine.
//!
//! Turns laboratory report PDFs into structured test results. The native
//! text layer is tried first; scanned or sparsely parsed reports fall back
//! to optical recognition when an engine is compiled in.
//!
//! ```no_run
//! use lab_report_extract::{
//!     ExtractionConfig, ExtractionOrchestrator, NativeTextExtractor, ParserRegistry,
//!     UnavailableOcr,
//! };
//!
//! let orchestrator = ExtractionOrchestrator::new(
//!     Box::new(NativeTextExtractor),
//!     Box::new(UnavailableOcr),
//!     ParserRegistry::with_defaults(),
//!     ExtractionConfig::default(),
//! );
//! let pdf = std::fs::read("report.pdf").unwrap();
//! let result = orchestrator.extract(&pdf, "report.pdf");
//! for record in &result.records {
//!     println!("{} = {:?} {}", record.test_name, record.value, record.unit);
//! }
//! ```

pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod extractors;
pub mod noise;
pub mod normalize;
pub mod orchestrator;
pub mod parsers;
pub mod preprocessing;
pub mod record;
pub mod registry;
pub mod server;

pub use config::{Config, ExtractionConfig, OcrConfig};
pub use error::ExtractError;
pub use extractors::{
    NativeTextExtractor, NativeTextSource, OpticalTextSource, RasterOcrExtractor, UnavailableOcr,
};
pub use orchestrator::ExtractionOrchestrator;
pub use parsers::LabParser;
pub use record::{ExtractionMethod, ExtractionResult, ResultRecord};
pub use registry::{ParseOutcome, ParserRegistry};
