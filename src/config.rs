use crate::preprocessing::Preset;
use clap::Parser;
use serde::Serialize;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "lab-report-extract-server")]
#[command(about = "Extracts structured test results from laboratory report PDFs")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "LAB_EXTRACT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "LAB_EXTRACT_PORT", default_value = "9393")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 50MB)
    #[arg(long, env = "LAB_EXTRACT_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Preferred OCR engine ("ocrs" or "tesseract"); first available if unset
    #[arg(long, env = "LAB_EXTRACT_OCR_ENGINE")]
    pub ocr_engine: Option<String>,

    /// Run without optical recognition even if an engine is compiled in
    #[arg(long, env = "LAB_EXTRACT_DISABLE_OCR")]
    pub disable_ocr: bool,

    /// Page image preprocessing before recognition
    #[arg(long, env = "LAB_EXTRACT_PREPROCESS", value_enum, default_value_t = Preset::Default)]
    pub preprocess: Preset,

    /// Structured results below this count trigger the OCR fallback
    #[arg(long, env = "LAB_EXTRACT_MIN_RESULTS", default_value = "5")]
    pub min_results: usize,

    /// Native text shorter than this is treated as missing
    #[arg(long, env = "LAB_EXTRACT_MIN_TEXT_CHARS", default_value = "50")]
    pub min_text_chars: usize,

    /// Upper bound on one extraction, OCR included
    #[arg(long, env = "LAB_EXTRACT_TIMEOUT_SECS", default_value = "120")]
    pub extraction_timeout_secs: u64,

    /// Recognition language (Tesseract only; ocrs reads Latin script)
    #[arg(long, env = "LAB_EXTRACT_OCR_LANGUAGE", default_value = "eng")]
    pub ocr_language: String,

    /// Path to tessdata directory (uses TESSDATA_PREFIX env var if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Thresholds of the quality-gated extraction
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionConfig {
    pub min_text_chars: usize,
    /// Minimum share of digit characters; text without numbers holds no results
    pub min_digit_ratio: f32,
    pub min_structured_results: usize,
    pub ocr_fallback: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 50,
            min_digit_ratio: 0.01,
            min_structured_results: 5,
            ocr_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OcrConfig {
    pub preferred_engine: Option<String>,
    pub language: String,
    pub tessdata_path: Option<String>,
    pub preprocess: Preset,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            preferred_engine: None,
            language: "eng".to_string(),
            tessdata_path: None,
            preprocess: Preset::Default,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub disable_ocr: bool,
    pub extraction_timeout: Duration,
    pub min_results: usize,
    pub min_text_chars: usize,
    pub ocr_engine: Option<String>,
    pub ocr_language: String,
    pub tessdata_path: Option<String>,
    pub preprocess: Preset,
}

impl Config {
    pub fn extraction(&self) -> ExtractionConfig {
        ExtractionConfig {
            min_text_chars: self.min_text_chars,
            min_structured_results: self.min_results,
            ocr_fallback: !self.disable_ocr,
            ..ExtractionConfig::default()
        }
    }

    pub fn ocr(&self) -> OcrConfig {
        OcrConfig {
            preferred_engine: self.ocr_engine.clone(),
            language: self.ocr_language.clone(),
            tessdata_path: self.tessdata_path.clone(),
            preprocess: self.preprocess,
        }
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            disable_ocr: args.disable_ocr,
            extraction_timeout: Duration::from_secs(args.extraction_timeout_secs),
            min_results: args.min_results,
            min_text_chars: args.min_text_chars,
            ocr_engine: args.ocr_engine,
            ocr_language: args.ocr_language,
            tessdata_path: args.tessdata_path,
            preprocess: args.preprocess,
        }
    }
}
