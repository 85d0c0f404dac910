//! Size reduction pass
//!
//! Prunes unreachable objects, flate-compresses unfiltered streams and
//! re-encodes embedded baseline JPEG images at a lower quality when that
//! makes them smaller. Best effort: the output is never guaranteed to be
//! smaller than the input.

use image::ImageFormat;
use lopdf::{Document, Object, Stream};
use tracing::{debug, info};

use crate::error::PdfDeskError;
use crate::images::{clamp_quality, encode_jpeg};

/// What the pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressStats {
    pub images_reencoded: usize,
    pub image_bytes_saved: usize,
}

/// Compress `doc` in place
pub fn compress_document(doc: &mut Document, quality: u8) -> Result<CompressStats, PdfDeskError> {
    let quality = clamp_quality(quality);
    let mut stats = CompressStats::default();

    doc.prune_objects();

    for (id, object) in doc.objects.iter_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if !is_plain_jpeg(stream) {
            continue;
        }

        let before = stream.content.len();
        match reencode_jpeg(stream, quality) {
            Some(smaller) if smaller.len() < before => {
                stats.images_reencoded += 1;
                stats.image_bytes_saved += before - smaller.len();
                stream.set_content(smaller);
            }
            Some(_) => debug!("Image {:?} already smaller than re-encoded copy", id),
            None => debug!("Image {:?} left untouched", id),
        }
    }

    doc.compress();

    info!(
        "Compression re-encoded {} images, saved {} bytes",
        stats.images_reencoded, stats.image_bytes_saved
    );
    Ok(stats)
}

/// DCTDecode as the only filter, 8 bits per component, RGB or gray
fn is_plain_jpeg(stream: &Stream) -> bool {
    let dict = &stream.dict;
    let is_image = dict
        .get(b"Subtype")
        .and_then(|o| o.as_name())
        .map(|n| n == b"Image")
        .unwrap_or(false);
    let is_dct = dict
        .get(b"Filter")
        .and_then(|o| o.as_name())
        .map(|n| n == b"DCTDecode")
        .unwrap_or(false);
    let is_8bit = dict
        .get(b"BitsPerComponent")
        .and_then(|o| o.as_i64())
        .map(|b| b == 8)
        .unwrap_or(false);
    let plain_colorspace = dict
        .get(b"ColorSpace")
        .and_then(|o| o.as_name())
        .map(|n| n == b"DeviceRGB" || n == b"DeviceGray")
        .unwrap_or(false);

    is_image && is_dct && is_8bit && plain_colorspace
}

fn reencode_jpeg(stream: &Stream, quality: u8) -> Option<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok()?;

    let gray = stream
        .dict
        .get(b"ColorSpace")
        .and_then(|o| o.as_name())
        .map(|n| n == b"DeviceGray")
        .unwrap_or(false);

    if gray {
        let luma = decoded.to_luma8();
        let mut bytes = Vec::new();
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder.encode_image(&luma).ok()?;
        Some(bytes)
    } else {
        encode_jpeg(&decoded.to_rgb8(), quality).ok()
    }
}
