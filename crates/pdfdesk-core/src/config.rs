//! Runtime configuration for the operations
//!
//! Everything the orchestrator needs is carried in a [`DeskConfig`] value
//! handed to [`crate::PdfDesk::new`]; nothing is read from process-wide state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Largest width or height (in pixels) an image keeps when converted to a PDF page
pub const DEFAULT_MAX_IMAGE_DIMENSION: u32 = 2000;

/// Resolution used when rasterizing PDF pages
pub const DEFAULT_RENDER_DPI: u16 = 150;

/// JPEG quality for PDF→images and images→PDF when the caller sends none
pub const DEFAULT_IMAGE_QUALITY: u8 = 95;

/// Quality hint for compression when the caller sends none
pub const DEFAULT_COMPRESS_QUALITY: u8 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeskConfig {
    /// Incoming area: uploads are staged here and removed after use
    pub upload_dir: PathBuf,
    /// Outgoing area: finished artifacts wait here for download
    pub output_dir: PathBuf,
    #[serde(default = "default_max_image_dimension")]
    pub max_image_dimension: u32,
    #[serde(default = "default_render_dpi")]
    pub render_dpi: u16,
    /// Directory holding the pdfium shared library; the working directory and
    /// the system search path are tried when unset
    #[serde(default)]
    pub pdfium_dir: Option<PathBuf>,
}

fn default_max_image_dimension() -> u32 {
    DEFAULT_MAX_IMAGE_DIMENSION
}

fn default_render_dpi() -> u16 {
    DEFAULT_RENDER_DPI
}

impl DeskConfig {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            max_image_dimension: DEFAULT_MAX_IMAGE_DIMENSION,
            render_dpi: DEFAULT_RENDER_DPI,
            pdfium_dir: None,
        }
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self::new("uploads", "processed")
    }
}
