//! Output types shared by every parser and the orchestrator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

/// Lab name stamped on records when no lab-specific parser matched
pub const UNKNOWN_LAB: &str = "Unknown";

/// Confidence for native text that only went through generic cleanup
pub const NATIVE_TEXT_CONFIDENCE: f32 = 0.95;

/// Confidence for anything recovered through optical recognition
pub const OCR_CONFIDENCE: f32 = 0.80;

/// One parsed test observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub test_name: String,
    pub value: Option<f64>,
    pub unit: String,
    /// Kept as printed ("lo - hi", "<N", ">=N" or empty)
    pub reference_range: String,
    /// "High", "Low", "Critical" or empty
    pub flag: String,
    pub confidence: f32,
    pub test_date: Option<NaiveDate>,
    pub lab_name: String,
}

impl ResultRecord {
    pub fn new(test_name: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            test_name: test_name.into(),
            value,
            unit: String::new(),
            reference_range: String::new(),
            flag: String::new(),
            confidence: 0.0,
            test_date: None,
            lab_name: UNKNOWN_LAB.to_string(),
        }
    }
}

/// How the returned text and records were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Digital text layer, generic cleanup only
    NativeText,
    /// Rasterize-and-recognize path
    Ocr,
    /// Digital text layer parsed by a lab-specific parser (carries its tag)
    Structured(&'static str),
    Failed,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NativeText => "native_text",
            Self::Ocr => "ocr",
            Self::Structured(tag) => tag,
            Self::Failed => "failed",
        }
    }
}

impl Serialize for ExtractionMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The orchestrator's single return value
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    pub method: ExtractionMethod,
    pub confidence: f32,
    pub page_count: usize,
    pub char_count: usize,
    pub error: Option<String>,
    pub test_count: usize,
    pub native_test_count: usize,
    pub fallback_triggered: bool,
    pub records: Vec<ResultRecord>,
}

impl ExtractionResult {
    /// A failed extraction. Always carries a non-empty message and no records.
    pub fn failed(error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "Extraction failed".to_string();
        }
        Self {
            text: String::new(),
            method: ExtractionMethod::Failed,
            confidence: 0.0,
            page_count: 0,
            char_count: 0,
            error: Some(error),
            test_count: 0,
            native_test_count: 0,
            fallback_triggered: false,
            records: Vec::new(),
        }
    }

    /// Unstructured text result: no records, generic cleanup applied upstream
    pub fn unstructured(
        text: String,
        method: ExtractionMethod,
        confidence: f32,
        page_count: usize,
    ) -> Self {
        Self {
            char_count: text.chars().count(),
            text,
            method,
            confidence,
            page_count,
            error: None,
            test_count: 0,
            native_test_count: 0,
            fallback_triggered: false,
            records: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.method == ExtractionMethod::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_serializes_as_tag() {
        let json = serde_json::to_string(&ExtractionMethod::Structured("labcorp_parser")).unwrap();
        assert_eq!(json, "\"labcorp_parser\"");
        assert_eq!(ExtractionMethod::Failed.as_str(), "failed");
        assert_eq!(ExtractionMethod::Ocr.as_str(), "ocr");
    }

    #[test]
    fn test_failed_result_never_has_empty_error() {
        let result = ExtractionResult::failed("");
        assert!(result.is_failed());
        assert_eq!(result.test_count, 0);
        assert!(!result.error.unwrap().is_empty());
    }

    #[test]
    fn test_unstructured_counts_chars() {
        let result = ExtractionResult::unstructured(
            "Glucose 92 µg".to_string(),
            ExtractionMethod::NativeText,
            NATIVE_TEXT_CONFIDENCE,
            1,
        );
        assert_eq!(result.char_count, 13);
        assert!(result.records.is_empty());
    }
}
