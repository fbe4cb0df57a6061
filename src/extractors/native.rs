//! Digital text layer extraction with `pdf-extract`.

use super::NativeTextSource;
use crate::error::ExtractError;
use crate::registry::panic_message;
use std::panic::{self, AssertUnwindSafe};

pub struct NativeTextExtractor;

impl NativeTextSource for NativeTextExtractor {
    fn extract_pages(&self, pdf: &[u8]) -> Result<Vec<String>, ExtractError> {
        if !pdf.starts_with(b"%PDF") {
            return Err(ExtractError::CorruptDocument(
                "missing %PDF header".to_string(),
            ));
        }

        // pdf-extract panics on some malformed font and xref tables
        let pages = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(pdf)
        }))
        .map_err(|payload| {
            ExtractError::CorruptDocument(format!(
                "PDF reader crashed: {}",
                panic_message(payload.as_ref())
            ))
        })?
        .map_err(|e| classify_error(&e.to_string()))?;

        tracing::debug!(pages = pages.len(), "Native text extracted");
        Ok(pages)
    }
}

fn classify_error(message: &str) -> ExtractError {
    let lower = message.to_lowercase();
    if lower.contains("encrypt") || lower.contains("password") {
        ExtractError::PasswordProtected
    } else {
        ExtractError::CorruptDocument(message.to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    /// Build a single-page PDF whose text layer holds `lines`, one per row.
    pub(crate) fn make_text_pdf(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut content = String::from("BT /F1 11 Tf 14 TL 72 740 Td");
        for line in lines {
            let escaped = line.replace('\\', r"\\").replace('(', r"\(").replace(')', r"\)");
            content.push_str(&format!(" ({escaped}) Tj T*"));
        }
        content.push_str(" ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_extracts_text_layer() {
        let pdf = make_text_pdf(&["Glucose 92 mg/dL", "Sodium 140 mmol/L"]);
        let pages = NativeTextExtractor.extract_pages(&pdf).unwrap();

        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("Glucose"), "got: {:?}", pages[0]);
        assert!(pages[0].contains("Sodium"), "got: {:?}", pages[0]);
    }

    #[test]
    fn test_garbage_is_corrupt_document() {
        let err = NativeTextExtractor.extract_pages(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::CorruptDocument(_)));

        let err = NativeTextExtractor
            .extract_pages(b"%PDF-1.4\n%%EOF garbage")
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::CorruptDocument(_) | ExtractError::PasswordProtected
        ));
    }

    #[test]
    fn test_encryption_errors_are_password_protected() {
        assert!(matches!(
            classify_error("PDF is encrypted"),
            ExtractError::PasswordProtected
        ));
        assert!(matches!(
            classify_error("Invalid password"),
            ExtractError::PasswordProtected
        ));
        assert!(matches!(
            classify_error("invalid xref"),
            ExtractError::CorruptDocument(_)
        ));
    }
}
