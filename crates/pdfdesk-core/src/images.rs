//! Conversion between PDF pages and raster images
//!
//! Rasterizing goes through the [`PageRenderer`] trait; [`PdfiumRenderer`]
//! is the production implementation. Building a PDF from images only needs
//! `image` and `lopdf`.

use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdfium_render::prelude::*;
use tracing::{debug, info};

use crate::error::PdfDeskError;

/// Keep a quality value inside the JPEG encoder's `1..=100` range
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(1, 100)
}

/// Turns every page of a PDF into an RGB bitmap
pub trait PageRenderer: Send + Sync {
    fn render(&self, pdf: &[u8], dpi: u16) -> Result<Vec<RgbImage>, PdfDeskError>;
}

/// Renderer backed by the pdfium library.
///
/// The library is looked up in `library_dir` (or the working directory) and
/// then among the system libraries. Binding happens per call so a missing
/// library only fails the conversion operations.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    fn bind(&self) -> Result<Pdfium, PdfDeskError> {
        let dir = self
            .library_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("./"));
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| PdfDeskError::ConversionFailed(format!("pdfium not available: {}", e)))?;
        Ok(Pdfium::new(bindings))
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render(&self, pdf: &[u8], dpi: u16) -> Result<Vec<RgbImage>, PdfDeskError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PdfDeskError::ConversionFailed(format!("Failed to load PDF: {}", e)))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);

        let mut images = Vec::new();
        for (index, page) in document.pages().iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                PdfDeskError::ConversionFailed(format!("Failed to render page {}: {}", index + 1, e))
            })?;
            let width = bitmap.width() as u32;
            let height = bitmap.height() as u32;
            let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
                PdfDeskError::ConversionFailed(format!("Page {} bitmap has the wrong size", index + 1))
            })?;
            images.push(DynamicImage::ImageRgba8(rgba).to_rgb8());
        }

        Ok(images)
    }
}

/// One encoded page image
#[derive(Debug, Clone)]
pub struct PageImage {
    /// `page_<n>.jpg`, 1-based
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Encode an RGB image as baseline JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PdfDeskError> {
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, clamp_quality(quality));
    encoder
        .encode_image(image)
        .map_err(|e| PdfDeskError::ConversionFailed(format!("Failed to encode JPEG: {}", e)))?;
    Ok(bytes)
}

/// Render every page and encode it as JPEG, in page order
pub fn pdf_to_images(
    renderer: &dyn PageRenderer,
    pdf: &[u8],
    dpi: u16,
    quality: u8,
) -> Result<Vec<PageImage>, PdfDeskError> {
    let rendered = renderer.render(pdf, dpi)?;

    let pages = rendered
        .iter()
        .enumerate()
        .map(|(index, image)| {
            Ok(PageImage {
                file_name: format!("page_{}.jpg", index + 1),
                bytes: encode_jpeg(image, quality)?,
            })
        })
        .collect::<Result<Vec<_>, PdfDeskError>>()?;

    info!("Rendered {} pages at {} dpi", pages.len(), dpi);
    Ok(pages)
}

/// Shrink `image` so neither side exceeds `max_dimension`, keeping the aspect
/// ratio. Smaller images are returned untouched.
pub fn fit_within(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return image;
    }
    image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

/// Compose one page per image, in input order.
///
/// Each image is converted to RGB, downscaled to fit `max_dimension` and
/// embedded as a JPEG; the page is sized to the image in points. Any image
/// that fails to decode fails the whole batch.
pub fn images_to_pdf(
    images: &[Vec<u8>],
    quality: u8,
    max_dimension: u32,
) -> Result<Document, PdfDeskError> {
    if images.is_empty() {
        return Err(PdfDeskError::NoValidInput("No images to convert".into()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(images.len());

    for (index, bytes) in images.iter().enumerate() {
        let decoded = image::load_from_memory(bytes).map_err(|e| {
            PdfDeskError::ConversionFailed(format!("Image #{} could not be decoded: {}", index + 1, e))
        })?;
        let rgb = fit_within(decoded, max_dimension).to_rgb8();
        let (width, height) = rgb.dimensions();
        let jpeg = encode_jpeg(&rgb, quality)?;

        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = doc.add_object(image_stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(width as i64),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(height as i64),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| PdfDeskError::AssemblyFailed(format!("Content encoding failed: {}", e)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), Object::Integer(width as i64), Object::Integer(height as i64)],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(Object::Reference(page_id));

        debug!("Image #{} placed as {}x{} page", index + 1, width, height);
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    Ok(doc)
}
