//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first use.

use super::models;
use crate::config::OcrConfig;
use crate::engine::OcrEngine;
use crate::error::ExtractError;
use image::{DynamicImage, Rgb, RgbImage};
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams};
use rten::Model;

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

pub struct OcrsEngine {
    engine: OcrsOcrEngine,
}

impl OcrsEngine {
    /// Create the engine, downloading models if needed
    pub fn new(_config: &OcrConfig) -> Result<Self, ExtractError> {
        tracing::info!("Initializing ocrs OCR engine...");

        let cache = models::cache_dir("ocrs")?;
        let detection_path =
            models::ensure_file(&cache, "text-detection.rten", DETECTION_MODEL_URL)?;
        let recognition_path =
            models::ensure_file(&cache, "text-recognition.rten", RECOGNITION_MODEL_URL)?;

        let detection_model = Model::load_file(&detection_path).map_err(|e| {
            ExtractError::InitializationError(format!("Failed to load detection model: {e}"))
        })?;
        let recognition_model = Model::load_file(&recognition_path).map_err(|e| {
            ExtractError::InitializationError(format!("Failed to load recognition model: {e}"))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            ExtractError::InitializationError(format!("Failed to create OCR engine: {e}"))
        })?;

        tracing::info!("ocrs engine initialized successfully");
        Ok(Self { engine })
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn probe(&self) -> Result<String, ExtractError> {
        // A blank page must run through detection without error
        let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([255, 255, 255])));
        self.recognize(&blank)?;
        Ok(format!("ocrs (lab-report-extract {})", env!("CARGO_PKG_VERSION")))
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractError> {
        // ImageSource::from_bytes expects HWC RGB samples
        let rgb = image.to_rgb8();
        let dimensions = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), dimensions).map_err(|e| {
            ExtractError::OcrProcessing(format!("Failed to create image source: {e}"))
        })?;

        let input = self
            .engine
            .prepare_input(source)
            .map_err(|e| ExtractError::OcrProcessing(format!("Failed to prepare input: {e}")))?;
        let word_rects = self
            .engine
            .detect_words(&input)
            .map_err(|e| ExtractError::OcrProcessing(format!("Failed to detect words: {e}")))?;
        let line_rects = self.engine.find_text_lines(&input, &word_rects);
        let lines = self
            .engine
            .recognize_text(&input, &line_rects)
            .map_err(|e| ExtractError::OcrProcessing(format!("Failed to recognize text: {e}")))?;

        // Words are re-joined with single spaces; parsers split on whitespace
        let text = lines
            .iter()
            .flatten()
            .map(|line| line.words().map(|w| w.to_string()).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!(
            width = dimensions.0,
            height = dimensions.1,
            lines = line_rects.len(),
            chars = text.len(),
            "ocrs page recognized"
        );
        Ok(text)
    }
}
