//! Raw text producers.
//!
//! The orchestrator only sees these two traits, so the PDF library and the
//! recognition engine can be swapped (or mocked in tests) without touching
//! the extraction policy.

pub mod native;
pub mod optical;
pub mod pages;

pub use native::NativeTextExtractor;
pub use optical::{RasterOcrExtractor, UnavailableOcr};

use crate::error::ExtractError;

/// Reads a PDF's embedded digital text layer
pub trait NativeTextSource: Send + Sync {
    /// Plain text of every page, in page order
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractError>;
}

/// Rasterize-and-recognize text producer
pub trait OpticalTextSource: Send + Sync {
    /// Cheap availability check, called once when the orchestrator is built.
    /// Returns an engine identifier when recognition is usable.
    fn probe(&self) -> Option<String>;

    /// Recognized text of every page, in page order
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractError>;
}
