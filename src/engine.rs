use crate::error::ExtractError;
use image::DynamicImage;

/// A character recognition backend that turns one page image into text
pub trait OcrEngine: Send + Sync {
    /// Engine identifier (e.g. "ocrs", "tesseract")
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Self-test on a synthetic image. Returns an identifier with version
    /// details when the engine is usable.
    fn probe(&self) -> Result<String, ExtractError>;

    /// Recognize the text of one page image, lines separated by `\n`
    fn recognize(&self, image: &DynamicImage) -> Result<String, ExtractError>;
}
