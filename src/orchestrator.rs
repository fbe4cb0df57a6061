//! Extraction entry point: picks the text path, dispatches to the lab
//! parsers and applies the quality-gated OCR fallback.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extractors::{NativeTextSource, OpticalTextSource};
use crate::noise::filter_noise;
use crate::record::{
    ExtractionMethod, ExtractionResult, ResultRecord, NATIVE_TEXT_CONFIDENCE, OCR_CONFIDENCE,
};
use crate::registry::{panic_message, ParseOutcome, ParserRegistry};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

pub struct ExtractionOrchestrator {
    native: Box<dyn NativeTextSource>,
    optical: Box<dyn OpticalTextSource>,
    registry: ParserRegistry,
    config: ExtractionConfig,
    /// Probed once at construction
    ocr_engine: Option<String>,
}

/// Text of one extraction path, pages joined
struct PathText {
    text: String,
    page_count: usize,
}

impl PathText {
    fn from_pages(pages: Vec<String>) -> Self {
        Self {
            page_count: pages.len(),
            text: pages.join("\n"),
        }
    }
}

impl ExtractionOrchestrator {
    pub fn new(
        native: Box<dyn NativeTextSource>,
        optical: Box<dyn OpticalTextSource>,
        registry: ParserRegistry,
        config: ExtractionConfig,
    ) -> Self {
        let ocr_engine = optical.probe();
        match &ocr_engine {
            Some(engine) => tracing::info!(engine = %engine, "Optical recognition available"),
            None => tracing::info!("Optical recognition unavailable; scanned reports will fail"),
        }

        Self {
            native,
            optical,
            registry,
            config,
            ocr_engine,
        }
    }

    pub fn ocr_available(&self) -> bool {
        self.ocr_engine.is_some()
    }

    /// Identifier reported by the optical probe
    pub fn ocr_engine(&self) -> Option<&str> {
        self.ocr_engine.as_deref()
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract text and results from one PDF. Never fails: every error and
    /// panic comes back as a result with method `failed`.
    pub fn extract(&self, pdf: &[u8], filename: &str) -> ExtractionResult {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(pdf, filename)));

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(filename, code = e.code(), error = %e, "Extraction failed");
                ExtractionResult::failed(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(filename, panic = %message, "Extraction panicked");
                ExtractionResult::failed(ExtractError::Internal(message).to_string())
            }
        };

        tracing::info!(
            filename,
            method = result.method.as_str(),
            test_count = result.test_count,
            native_test_count = result.native_test_count,
            fallback_triggered = result.fallback_triggered,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extraction finished"
        );
        result
    }

    fn run(&self, pdf: &[u8], filename: &str) -> Result<ExtractionResult, ExtractError> {
        let native = match self.native.extract_pages(pdf) {
            Ok(pages) => PathText::from_pages(pages),
            Err(ExtractError::PasswordProtected) => return Err(ExtractError::PasswordProtected),
            Err(e) => {
                // A scanned PDF with a broken text layer may still be readable optically
                tracing::warn!(filename, error = %e, "Native text extraction failed");
                return self.optical_only(pdf, filename, Some(e));
            }
        };

        if !self.is_usable(&native.text) {
            tracing::info!(
                filename,
                chars = native.text.trim().chars().count(),
                "Native text unusable"
            );
            return self.optical_only(pdf, filename, None);
        }

        let outcome = self.registry.parse(&native.text);
        let Some(tag) = outcome.method_tag.filter(|_| !outcome.records.is_empty()) else {
            tracing::info!(filename, "No lab parser matched; returning cleaned text");
            let cleaned = filter_noise(&native.text);
            return Ok(ExtractionResult::unstructured(
                cleaned,
                ExtractionMethod::NativeText,
                NATIVE_TEXT_CONFIDENCE,
                native.page_count,
            ));
        };

        let native_count = outcome.records.len();
        tracing::info!(
            filename,
            lab = %outcome.lab_name,
            count = native_count,
            "Lab parser matched"
        );

        let wants_fallback = native_count < self.config.min_structured_results
            && self.config.ocr_fallback
            && self.ocr_available();
        if wants_fallback {
            if let Some(better) = self.try_ocr_fallback(pdf, filename, native_count) {
                return Ok(better);
            }
        }

        let mut result = structured(
            native.text,
            ExtractionMethod::Structured(tag),
            outcome.records,
        );
        result.page_count = native.page_count;
        result.native_test_count = native_count;
        Ok(result)
    }

    /// Native text was unusable: OCR is the only remaining path
    fn optical_only(
        &self,
        pdf: &[u8],
        filename: &str,
        native_error: Option<ExtractError>,
    ) -> Result<ExtractionResult, ExtractError> {
        if !self.ocr_available() {
            return Err(native_error.unwrap_or(ExtractError::OcrUnavailable));
        }

        let ocr = match self.optical_pages(pdf) {
            Ok(ocr) => ocr,
            Err(e) => return Err(native_error.unwrap_or(e)),
        };
        if ocr.text.trim().is_empty() {
            return Err(native_error.unwrap_or(ExtractError::NoExtractableText));
        }

        let outcome = self.registry.parse(&ocr.text);
        if outcome.is_matched() && !outcome.records.is_empty() {
            tracing::info!(
                filename,
                lab = %outcome.lab_name,
                count = outcome.records.len(),
                "Lab parser matched OCR text"
            );
            let mut result = structured(ocr.text, ExtractionMethod::Ocr, restamp(outcome));
            result.page_count = ocr.page_count;
            return Ok(result);
        }

        let cleaned = filter_noise(&ocr.text);
        if cleaned.is_empty() {
            return Err(native_error.unwrap_or(ExtractError::NoExtractableText));
        }
        Ok(ExtractionResult::unstructured(
            cleaned,
            ExtractionMethod::Ocr,
            OCR_CONFIDENCE,
            ocr.page_count,
        ))
    }

    /// OCR the document again and keep its records only when strictly more
    /// were found
    fn try_ocr_fallback(
        &self,
        pdf: &[u8],
        filename: &str,
        native_count: usize,
    ) -> Option<ExtractionResult> {
        tracing::info!(
            filename,
            native_count,
            floor = self.config.min_structured_results,
            "Few structured results; trying OCR fallback"
        );

        let ocr = match self.optical_pages(pdf) {
            Ok(ocr) => ocr,
            Err(e) => {
                tracing::warn!(filename, error = %e, "OCR fallback failed; keeping native results");
                return None;
            }
        };

        let outcome = self.registry.parse(&ocr.text);
        let ocr_count = outcome.records.len();
        if ocr_count <= native_count {
            tracing::info!(
                filename,
                native_count,
                ocr_count,
                "OCR fallback did not improve results"
            );
            return None;
        }

        tracing::info!(filename, native_count, ocr_count, "OCR fallback adopted");
        let mut result = structured(ocr.text, ExtractionMethod::Ocr, restamp(outcome));
        result.page_count = ocr.page_count;
        result.native_test_count = native_count;
        result.fallback_triggered = true;
        Some(result)
    }

    fn optical_pages(&self, pdf: &[u8]) -> Result<PathText, ExtractError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.optical.extract_pages(pdf)))
            .map_err(|payload| {
                ExtractError::OcrProcessing(format!(
                    "engine panicked: {}",
                    panic_message(payload.as_ref())
                ))
            })?
            .map(PathText::from_pages)
    }

    /// Long enough and numeric enough to hold lab results
    fn is_usable(&self, text: &str) -> bool {
        let text = text.trim();
        let total = text.chars().count();
        if total < self.config.min_text_chars || total == 0 {
            return false;
        }
        let digits = text.chars().filter(char::is_ascii_digit).count();
        digits as f32 / total as f32 >= self.config.min_digit_ratio
    }
}

fn structured(
    text: String,
    method: ExtractionMethod,
    records: Vec<ResultRecord>,
) -> ExtractionResult {
    let confidence = records
        .iter()
        .map(|r| r.confidence)
        .fold(0.0_f32, f32::max);
    let test_count = records.len();
    ExtractionResult {
        char_count: text.chars().count(),
        text,
        method,
        confidence,
        page_count: 0,
        error: None,
        test_count,
        native_test_count: 0,
        fallback_triggered: false,
        records,
    }
}

/// Records read from OCR text carry the optical confidence
fn restamp(outcome: ParseOutcome) -> Vec<ResultRecord> {
    outcome
        .records
        .into_iter()
        .map(|mut record| {
            record.confidence = OCR_CONFIDENCE;
            record
        })
        .collect()
}
