//! Optical path: page images, preprocessing, recognition.

use super::{pages, OpticalTextSource};
use crate::engine::OcrEngine;
use crate::engines::EngineRegistry;
use crate::error::ExtractError;
use crate::preprocessing::Pipeline;
use std::sync::Arc;
use std::time::Instant;

/// Recognizes the page images of scanned PDFs with one OCR engine
pub struct RasterOcrExtractor {
    engine: Arc<dyn OcrEngine>,
    pipeline: Pipeline,
}

impl RasterOcrExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, pipeline: Pipeline) -> Self {
        Self { engine, pipeline }
    }

    /// Extractor over the registry's default engine; `UnavailableOcr` when
    /// no engine could be started
    pub fn from_registry(
        registry: &EngineRegistry,
        pipeline: Pipeline,
    ) -> Box<dyn OpticalTextSource> {
        match registry.default() {
            Some(engine) => Box::new(Self::new(engine, pipeline)),
            None => Box::new(UnavailableOcr),
        }
    }

    fn recognize_page(
        &self,
        page: usize,
        images: Vec<image::DynamicImage>,
    ) -> Result<String, ExtractError> {
        let mut text = Vec::with_capacity(images.len());
        for image in images {
            let (prepared, _) = self.pipeline.process(image)?;
            let recognized = self.engine.recognize(&prepared)?;
            if !recognized.trim().is_empty() {
                text.push(recognized);
            }
        }
        tracing::debug!(
            page,
            chars = text.iter().map(String::len).sum::<usize>(),
            "Page recognized"
        );
        Ok(text.join("\n"))
    }
}

impl OpticalTextSource for RasterOcrExtractor {
    fn probe(&self) -> Option<String> {
        match self.engine.probe() {
            Ok(identifier) => Some(identifier),
            Err(e) => {
                tracing::warn!(
                    engine = self.engine.name(),
                    error = %e,
                    "OCR engine self-test failed"
                );
                None
            }
        }
    }

    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractError> {
        let started = Instant::now();
        let page_images = pages::page_images(pdf)?;
        let page_count = page_images.len();

        let mut texts = Vec::with_capacity(page_count);
        let mut last_error = None;
        let mut failed = 0;

        for (index, images) in page_images.into_iter().enumerate() {
            let page = index + 1;
            match self.recognize_page(page, images) {
                Ok(text) => texts.push(text),
                Err(e) => {
                    // One bad page should not cost the rest of the report
                    tracing::warn!(page, error = %e, "Page recognition failed");
                    texts.push(String::new());
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if failed > 0 && failed == page_count {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        tracing::info!(
            engine = self.engine.name(),
            preset = %self.pipeline.preset(),
            pages = page_count,
            failed_pages = failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OCR extraction finished"
        );
        Ok(texts)
    }
}

/// Stand-in when no engine is compiled in or none could start
pub struct UnavailableOcr;

impl OpticalTextSource for UnavailableOcr {
    fn probe(&self) -> Option<String> {
        None
    }

    fn extract_pages(&self, _pdf: &[u8]) -> Result<Vec<String>, ExtractError> {
        Err(ExtractError::OcrUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::tests::FixedEngine;
    use crate::extractors::pages::tests::{gray_stream, make_scanned_pdf};
    use crate::preprocessing::Preset;
    use image::DynamicImage;

    struct BrokenEngine;

    impl OcrEngine for BrokenEngine {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn description(&self) -> &'static str {
            "always fails"
        }

        fn probe(&self) -> Result<String, ExtractError> {
            Err(ExtractError::InitializationError("model missing".to_string()))
        }

        fn recognize(&self, _image: &DynamicImage) -> Result<String, ExtractError> {
            Err(ExtractError::OcrProcessing("engine crashed".to_string()))
        }
    }

    fn extractor(engine: impl OcrEngine + 'static) -> RasterOcrExtractor {
        RasterOcrExtractor::new(Arc::new(engine), Pipeline::new(Preset::None))
    }

    #[test]
    fn test_recognizes_each_page_in_order() {
        let extractor = extractor(FixedEngine {
            name: "fixed",
            text: "Glucose 92 mg/dL".to_string(),
        });
        let pdf = make_scanned_pdf(gray_stream(4, 4, vec![255; 16]), true);

        let pages = extractor.extract_pages(&pdf).unwrap();
        assert_eq!(pages, vec!["Glucose 92 mg/dL".to_string(), String::new()]);
        assert_eq!(extractor.probe().as_deref(), Some("fixed (test)"));
    }

    #[test]
    fn test_all_pages_failing_is_an_error() {
        let extractor = extractor(BrokenEngine);
        let pdf = make_scanned_pdf(gray_stream(4, 4, vec![255; 16]), false);

        assert!(matches!(
            extractor.extract_pages(&pdf),
            Err(ExtractError::OcrProcessing(_))
        ));
        assert!(extractor.probe().is_none());
    }

    #[test]
    fn test_partial_page_failure_keeps_other_pages() {
        // Page two has no images, so only page one reaches the engine
        let extractor = extractor(BrokenEngine);
        let pdf = make_scanned_pdf(gray_stream(4, 4, vec![255; 16]), true);

        let pages = extractor.extract_pages(&pdf).unwrap();
        assert_eq!(pages, vec![String::new(), String::new()]);
    }

    #[test]
    fn test_unavailable_reports_not_installed() {
        assert!(UnavailableOcr.probe().is_none());
        assert!(matches!(
            UnavailableOcr.extract_pages(b"%PDF-1.4"),
            Err(ExtractError::OcrUnavailable)
        ));
    }

    #[test]
    fn test_empty_registry_yields_unavailable() {
        let registry = EngineRegistry::from_engines(Vec::new(), None);
        let source = RasterOcrExtractor::from_registry(&registry, Pipeline::new(Preset::Default));
        assert!(source.probe().is_none());
    }
}
