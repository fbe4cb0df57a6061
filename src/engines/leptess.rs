//! Tesseract engine implementation
//!
//! Uses the tesseract-static crate for static linking (no system dependencies).
//! Downloads tessdata (training data) on first use unless a tessdata
//! directory is configured.

use super::models;
use crate::config::OcrConfig;
use crate::engine::OcrEngine;
use crate::error::ExtractError;
use image::{DynamicImage, GrayImage, Luma};
use std::path::PathBuf;
use tesseract_static::tesseract::Tesseract;

/// tessdata_fast keeps downloads small; accuracy is sufficient for printed reports
const TESSDATA_BASE_URL: &str = "https://github.com/tesseract-ocr/tessdata_fast/raw/main";

pub struct TesseractEngine {
    tessdata_path: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(config: &OcrConfig) -> Result<Self, ExtractError> {
        let language = config.language.clone();
        let tessdata_path = match &config.tessdata_path {
            Some(path) => path.clone(),
            None => cached_tessdata(&language)?,
        };

        // Fail at startup rather than on the first scanned upload
        Tesseract::new(Some(&tessdata_path), Some(&language)).map_err(|e| {
            ExtractError::InitializationError(format!("Failed to initialize Tesseract: {e}"))
        })?;

        tracing::info!(
            tessdata = %tessdata_path,
            language = %language,
            "Tesseract engine initialized"
        );
        Ok(Self {
            tessdata_path,
            language,
        })
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine - tolerant of faxed and photocopied pages"
    }

    fn probe(&self) -> Result<String, ExtractError> {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 32, Luma([255])));
        self.recognize(&blank)?;
        Ok(format!("tesseract ({})", self.language))
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractError> {
        // BMP is always readable by leptonica
        let mut bmp = Vec::new();
        image
            .to_rgb8()
            .write_to(&mut std::io::Cursor::new(&mut bmp), image::ImageFormat::Bmp)
            .map_err(|e| ExtractError::OcrProcessing(format!("Failed to convert to BMP: {e}")))?;

        let tess = Tesseract::new(Some(&self.tessdata_path), Some(&self.language))
            .map_err(|e| ExtractError::OcrProcessing(format!("Failed to create Tesseract: {e}")))?;
        let mut tess = tess
            .set_image_from_mem(&bmp)
            .map_err(|e| ExtractError::OcrProcessing(format!("Failed to set image: {e}")))?
            .recognize()
            .map_err(|e| ExtractError::OcrProcessing(format!("Failed to recognize text: {e}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractError::OcrProcessing(format!("Failed to get text: {e}")))?;

        tracing::debug!(
            width = image.width(),
            height = image.height(),
            mean_confidence = tess.mean_text_conf(),
            "tesseract page recognized"
        );
        Ok(text.trim().to_string())
    }
}

/// Cached tessdata directory holding `<language>.traineddata`
fn cached_tessdata(language: &str) -> Result<String, ExtractError> {
    let dir: PathBuf = models::cache_dir("tessdata")?;
    let filename = format!("{language}.traineddata");
    models::ensure_file(&dir, &filename, &format!("{TESSDATA_BASE_URL}/{filename}"))?;

    // Tesseract expects the directory, not the file
    dir.to_str()
        .map(str::to_string)
        .ok_or_else(|| ExtractError::InitializationError("Invalid tessdata path".to_string()))
}
