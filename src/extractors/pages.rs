//! Page images of scanned PDFs.
//!
//! A scanned report page is one or more image XObjects drawn over an empty
//! text layer. We collect the images referenced from each page's resources
//! (following `Parent` for inherited resources) and decode them with `image`.

use crate::error::ExtractError;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// How far up the page tree inherited resources are looked for
const MAX_TREE_DEPTH: usize = 16;

/// Decoded images of every page, in page order. A page without images
/// yields an empty list so page numbering is preserved.
pub fn page_images(pdf: &[u8]) -> Result<Vec<Vec<DynamicImage>>, ExtractError> {
    let doc = Document::load_mem(pdf).map_err(|e| {
        let message = e.to_string();
        if message.to_lowercase().contains("encrypt") {
            ExtractError::PasswordProtected
        } else {
            ExtractError::CorruptDocument(message)
        }
    })?;

    let pages = doc.get_pages();
    let mut result = Vec::with_capacity(pages.len());

    for (page_number, page_id) in pages {
        let mut images = Vec::new();
        for (name, stream) in image_xobjects(&doc, page_id) {
            match decode_image(&doc, stream) {
                Ok(img) => images.push(img),
                Err(e) => tracing::warn!(
                    page = page_number,
                    xobject = %String::from_utf8_lossy(&name),
                    error = %e,
                    "Skipping undecodable page image"
                ),
            }
        }
        tracing::debug!(page = page_number, images = images.len(), "Collected page images");
        result.push(images);
    }

    Ok(result)
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object.as_reference() {
        Ok(id) => doc.get_object(id).unwrap_or(object),
        Err(_) => object,
    }
}

/// The page's own `Resources`, or the nearest ancestor's
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources).as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn image_xobjects(doc: &Document, page_id: ObjectId) -> Vec<(Vec<u8>, &Stream)> {
    let Some(xobjects) = page_resources(doc, page_id)
        .and_then(|resources| resources.get(b"XObject").ok())
        .and_then(|xobjects| resolve(doc, xobjects).as_dict().ok())
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(name, object)| {
            let stream = resolve(doc, object).as_stream().ok()?;
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .is_ok_and(|subtype| subtype == b"Image");
            is_image.then(|| (name.clone(), stream))
        })
        .collect()
}

fn filter_names(doc: &Document, stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter").map(|f| resolve(doc, f)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(filters)) => filters
            .iter()
            .filter_map(|f| f.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(stream: &Stream, key: &[u8]) -> Result<u32, ExtractError> {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|v| v.as_i64().ok())
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| {
            ExtractError::OcrProcessing(format!(
                "Missing image {}",
                String::from_utf8_lossy(key).to_lowercase()
            ))
        })
}

fn decode_image(doc: &Document, stream: &Stream) -> Result<DynamicImage, ExtractError> {
    let filters = filter_names(doc, stream);

    match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") if filters.len() == 1 => {
            return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| ExtractError::OcrProcessing(format!("Invalid JPEG image: {e}")));
        }
        Some(b"DCTDecode")
        | Some(b"JPXDecode")
        | Some(b"JBIG2Decode")
        | Some(b"CCITTFaxDecode") => {
            let names: Vec<_> = filters.iter().map(|f| String::from_utf8_lossy(f)).collect();
            return Err(ExtractError::OcrProcessing(format!(
                "Unsupported image filter chain: {}",
                names.join(", ")
            )));
        }
        _ => {}
    }

    let width = dimension(stream, b"Width")?;
    let height = dimension(stream, b"Height")?;
    let bits = stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|b| b.as_i64().ok())
        .unwrap_or(8);

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| ExtractError::OcrProcessing(format!("Failed to decompress image: {e}")))?
    };

    let color_space = color_space(doc, stream);
    tracing::debug!(width, height, bits, %color_space, len = data.len(), "Decoding page image");

    let pixels = width as usize * height as usize;
    let components = match color_space.as_str() {
        "DeviceGray" | "CalGray" => 1,
        "DeviceRGB" | "CalRGB" => 3,
        "DeviceCMYK" => 4,
        // ICC profiles carry their own component count; infer it from the data
        "ICCBased" if bits == 8 && pixels > 0 => data.len() / pixels,
        other => {
            return Err(ExtractError::OcrProcessing(format!(
                "Unsupported color space: {other}"
            )))
        }
    };

    match (bits, components) {
        (1, 1) => Ok(DynamicImage::ImageLuma8(unpack_bilevel(&data, width, height)?)),
        (8, 1) => {
            let img = GrayImage::from_raw(width, height, truncated(data, pixels)?)
                .ok_or_else(|| ExtractError::OcrProcessing("Invalid grayscale image data".into()))?;
            Ok(DynamicImage::ImageLuma8(img))
        }
        (8, 3) => {
            let img = RgbImage::from_raw(width, height, truncated(data, pixels * 3)?)
                .ok_or_else(|| ExtractError::OcrProcessing("Invalid RGB image data".into()))?;
            Ok(DynamicImage::ImageRgb8(img))
        }
        (8, 4) => {
            let rgb = cmyk_to_rgb(&truncated(data, pixels * 4)?);
            let img = RgbImage::from_raw(width, height, rgb)
                .ok_or_else(|| ExtractError::OcrProcessing("Invalid CMYK image data".into()))?;
            Ok(DynamicImage::ImageRgb8(img))
        }
        _ => Err(ExtractError::OcrProcessing(format!(
            "Unsupported sample layout: {bits} bits x {components} components"
        ))),
    }
}

/// Trim trailing padding; fail when the stream is short
fn truncated(mut data: Vec<u8>, expected: usize) -> Result<Vec<u8>, ExtractError> {
    if data.len() < expected {
        return Err(ExtractError::OcrProcessing(format!(
            "Image data too short: {} bytes, expected {expected}",
            data.len()
        )));
    }
    data.truncate(expected);
    Ok(data)
}

/// 1-bit samples, rows padded to a byte; 0 is black
fn unpack_bilevel(data: &[u8], width: u32, height: u32) -> Result<GrayImage, ExtractError> {
    let row_bytes = (width as usize).div_ceil(8);
    if data.len() < row_bytes * height as usize {
        return Err(ExtractError::OcrProcessing(
            "Bilevel image data too short".to_string(),
        ));
    }

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let byte = data[y as usize * row_bytes + x as usize / 8];
        let bit = (byte >> (7 - (x % 8))) & 1;
        image::Luma([if bit == 1 { 255 } else { 0 }])
    }))
}

fn cmyk_to_rgb(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|px| {
            let k = 1.0 - px[3] as f32 / 255.0;
            let channel = |c: u8| ((1.0 - c as f32 / 255.0) * k * 255.0) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}

/// Color space family name, resolving references and `[/ICCBased ...]` arrays
fn color_space(doc: &Document, stream: &Stream) -> String {
    let Ok(object) = stream.dict.get(b"ColorSpace") else {
        return "DeviceRGB".to_string();
    };

    let family = match resolve(doc, object) {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(items) => items.first().and_then(|first| first.as_name().ok()),
        _ => None,
    };

    family
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .unwrap_or_else(|| "DeviceRGB".to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::dictionary;
    use std::io::Cursor;

    /// Two-page PDF; the image sits on the `Pages` node so both pages inherit it
    /// unless `second_page_blank` gives page two its own empty resources.
    pub(crate) fn make_scanned_pdf(image: Stream, second_page_blank: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let image_id = doc.add_object(image);
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            b"q 100 0 0 100 0 0 cm /Im0 Do Q".to_vec(),
        ));

        let first = doc.add_object(dictionary! {
            "Type" => "Page",
            "Contents" => content_id,
        });
        let mut second = dictionary! { "Type" => "Page" };
        if second_page_blank {
            second.set("Resources", dictionary! {});
        }
        let second = doc.add_object(second);

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![first.into(), second.into()],
            "Count" => 2,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        });
        for page in [first, second] {
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page) {
                dict.set("Parent", pages_id);
            }
        }
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    pub(crate) fn gray_stream(width: i64, height: i64, data: Vec<u8>) -> Stream {
        Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            data,
        )
    }

    #[test]
    fn test_inherited_resources_and_page_order() {
        let pdf = make_scanned_pdf(gray_stream(4, 3, vec![128; 12]), true);
        let pages = page_images(&pdf).unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), 1);
        assert_eq!(pages[0][0].width(), 4);
        assert_eq!(pages[0][0].height(), 3);
        assert!(pages[1].is_empty());
    }

    #[test]
    fn test_jpeg_page_image() {
        let source = RgbImage::from_pixel(8, 8, image::Rgb([200, 200, 200]));
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(source)
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 8,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        let pages = page_images(&make_scanned_pdf(stream, false)).unwrap();
        assert_eq!(pages[0][0].width(), 8);
        assert_eq!(pages[1].len(), 1);
    }

    #[test]
    fn test_short_image_is_skipped_not_fatal() {
        let pdf = make_scanned_pdf(gray_stream(10, 10, vec![0; 5]), true);
        let pages = page_images(&pdf).unwrap();
        assert!(pages[0].is_empty());
    }

    #[test]
    fn test_bilevel_unpacking() {
        // 10 px wide: two bytes per row, first pixel white, rest black
        let img = unpack_bilevel(&[0b1000_0000, 0, 0b1000_0000, 0], 10, 2).unwrap();
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert_eq!(img.get_pixel(1, 0)[0], 0);
        assert_eq!(img.get_pixel(0, 1)[0], 255);
        assert!(unpack_bilevel(&[0], 10, 2).is_err());
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0]), vec![255, 255, 255]);
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 255]), vec![0, 0, 0]);
    }

    #[test]
    fn test_not_a_pdf() {
        assert!(matches!(
            page_images(b"plain text"),
            Err(ExtractError::CorruptDocument(_))
        ));
    }
}
