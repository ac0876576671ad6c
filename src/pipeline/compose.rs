//! PDF composition: cleaned images in, one multi-page document out.
//!
//! Each cleaned image becomes exactly one page. The image is embedded as a
//! single raster XObject: JPEG bytes pass straight through behind a
//! `DCTDecode` filter, everything else is decoded to raw pixels (with a
//! separate `SMask` stream when the source carries alpha) and flate-compressed
//! by `Document::compress`. Geometry comes from [`crate::pipeline::layout`];
//! this module only converts layout units to points while emitting content
//! streams.

use crate::error::Scan2PdfError;
use crate::pipeline::datauri::DataUri;
use crate::pipeline::layout::{fit_to_page, PageFormat, PT_PER_UNIT};
use image::{ColorType, GenericImageView, ImageFormat};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use tracing::debug;

/// Pixel payload of one embedded image.
enum PixelData {
    /// Original JPEG bytes, embedded as-is with a `DCTDecode` filter.
    Jpeg { bytes: Vec<u8>, gray: bool },
    /// Raw 8-bit RGB samples.
    Rgb(Vec<u8>),
    /// Raw 8-bit RGB samples plus an 8-bit alpha channel for an `SMask`.
    RgbAlpha { rgb: Vec<u8>, alpha: Vec<u8> },
}

struct PreparedImage {
    width: u32,
    height: u32,
    pixels: PixelData,
}

/// Decode one cleaned image far enough to embed it.
///
/// JPEG keeps its compressed bytes (PDF readers decode DCT natively); other
/// formats are expanded to raw samples.
fn prepare_image(bytes: &[u8]) -> Result<PreparedImage, String> {
    let format = image::guess_format(bytes).map_err(|e| e.to_string())?;
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let (width, height) = img.dimensions();

    let pixels = match (format, img.color()) {
        (ImageFormat::Jpeg, ColorType::Rgb8) => PixelData::Jpeg {
            bytes: bytes.to_vec(),
            gray: false,
        },
        (ImageFormat::Jpeg, ColorType::L8) => PixelData::Jpeg {
            bytes: bytes.to_vec(),
            gray: true,
        },
        (_, color) if color.has_alpha() => {
            let rgba = img.to_rgba8();
            let mut rgb = Vec::with_capacity((width * height * 3) as usize);
            let mut alpha = Vec::with_capacity((width * height) as usize);
            for pixel in rgba.pixels() {
                rgb.extend_from_slice(&pixel.0[..3]);
                alpha.push(pixel.0[3]);
            }
            PixelData::RgbAlpha { rgb, alpha }
        }
        _ => PixelData::Rgb(img.to_rgb8().into_raw()),
    };

    Ok(PreparedImage {
        width,
        height,
        pixels,
    })
}

/// Add the XObject stream(s) for one image and return the image's object id.
fn add_image_object(doc: &mut Document, prepared: PreparedImage) -> lopdf::ObjectId {
    let (width, height) = (prepared.width as i64, prepared.height as i64);
    match prepared.pixels {
        PixelData::Jpeg { bytes, gray } => doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => if gray { "DeviceGray" } else { "DeviceRGB" },
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes,
        )),
        PixelData::Rgb(rgb) => doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb,
        )),
        PixelData::RgbAlpha { rgb, alpha } => {
            let smask_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha,
            ));
            doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "SMask" => smask_id,
                },
                rgb,
            ))
        }
    }
}

/// Compose the cleaned images into a single PDF, one page per image.
///
/// Images are placed in sequence order at the size and position computed by
/// [`fit_to_page`]. Returns the serialised document bytes.
pub fn compose_document(
    images: &[DataUri],
    format: &PageFormat,
) -> Result<Vec<u8>, Scan2PdfError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(images.len());

    let page_w_pt = (format.width * PT_PER_UNIT) as f32;
    let page_h_pt = (format.height * PT_PER_UNIT) as f32;

    for (i, uri) in images.iter().enumerate() {
        let bytes = uri.decode()?;
        let prepared = prepare_image(&bytes).map_err(|detail| Scan2PdfError::ImageDecode {
            index: i + 1,
            detail,
        })?;

        let aspect = prepared.width as f64 / prepared.height as f64;
        let placement = fit_to_page(aspect, format);
        debug!(
            "Page {}: {}x{} px, placed {:.1}x{:.1} at ({:.1}, {:.1})",
            i + 1,
            prepared.width,
            prepared.height,
            placement.width,
            placement.height,
            placement.x,
            placement.y
        );

        let image_id = add_image_object(&mut doc, prepared);
        let name = format!("Im{}", i + 1);

        let content = format!(
            "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /{} Do Q\n",
            placement.width * PT_PER_UNIT,
            placement.height * PT_PER_UNIT,
            placement.x * PT_PER_UNIT,
            placement.y * PT_PER_UNIT,
            name
        );
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let mut xobjects = Dictionary::new();
        xobjects.set(name, image_id);
        let resources = dictionary! { "XObject" => xobjects };

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(page_w_pt),
                Object::Real(page_h_pt),
            ],
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| Scan2PdfError::PdfWrite(e.to_string()))?;
    debug!("Composed {} pages into {} bytes", page_count, buf.len());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_data_uri(width: u32, height: u32) -> DataUri {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        DataUri::from_bytes("image/png", &buf)
    }

    fn jpeg_data_uri(width: u32, height: u32) -> DataUri {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 120, 120]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .expect("jpeg encode");
        DataUri::from_bytes("image/jpeg", &buf)
    }

    #[test]
    fn one_page_per_image() {
        let images = vec![png_data_uri(30, 20), jpeg_data_uri(20, 40), png_data_uri(45, 30)];
        let bytes = compose_document(&images, &PageFormat::A4).expect("compose");

        let doc = Document::load_mem(&bytes).expect("produced PDF must parse");
        assert_eq!(doc.get_pages().len(), 3);
    }

    fn obj_to_f64(obj: &Object) -> Option<f64> {
        match obj {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(f) => Some((*f).into()),
            _ => None,
        }
    }

    #[test]
    fn media_box_is_a4_in_points() {
        let bytes = compose_document(&[png_data_uri(10, 10)], &PageFormat::A4).expect("compose");
        let doc = Document::load_mem(&bytes).expect("parse");

        let (_, page_id) = doc.get_pages().into_iter().next().expect("one page");
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .expect("page dict");
        let media_box = page
            .get(b"MediaBox")
            .and_then(Object::as_array)
            .expect("media box");

        let w = obj_to_f64(&media_box[2]).expect("width");
        let h = obj_to_f64(&media_box[3]).expect("height");
        assert!((w - 595.28).abs() < 0.1, "got width {w}");
        assert!((h - 841.89).abs() < 0.1, "got height {h}");
    }

    #[test]
    fn jpeg_bytes_pass_through_with_dct_filter() {
        let uri = jpeg_data_uri(16, 16);
        let bytes = compose_document(&[uri], &PageFormat::A4).expect("compose");
        let doc = Document::load_mem(&bytes).expect("parse");

        let has_dct = doc.objects.values().any(|obj| match obj {
            Object::Stream(s) => s
                .dict
                .get(b"Filter")
                .and_then(Object::as_name)
                .map(|n| n == b"DCTDecode".as_slice())
                .unwrap_or(false),
            _ => false,
        });
        assert!(has_dct, "JPEG page should embed a DCTDecode stream");
    }

    #[test]
    fn alpha_source_gets_an_smask() {
        let img = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 128]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encode");
        let uri = DataUri::from_bytes("image/png", &buf);

        let bytes = compose_document(&[uri], &PageFormat::A4).expect("compose");
        let doc = Document::load_mem(&bytes).expect("parse");

        let has_smask = doc.objects.values().any(|obj| match obj {
            Object::Stream(s) => s.dict.get(b"SMask").is_ok(),
            _ => false,
        });
        assert!(has_smask, "RGBA source should carry an SMask stream");
    }

    #[test]
    fn garbage_payload_reports_the_item_position() {
        let bad = DataUri::from_bytes("image/png", b"not an image at all");
        let err = compose_document(&[png_data_uri(4, 4), bad], &PageFormat::A4).unwrap_err();
        match err {
            Scan2PdfError::ImageDecode { index, .. } => assert_eq!(index, 2),
            other => panic!("expected ImageDecode, got {other}"),
        }
    }

    #[test]
    fn no_images_yields_an_empty_document() {
        let bytes = compose_document(&[], &PageFormat::A4).expect("compose");
        let doc = Document::load_mem(&bytes).expect("parse");
        assert_eq!(doc.get_pages().len(), 0);
    }
}
