//! PDF desk operations
//!
//! Unlock, protect, merge, split, reorder, convert and compress PDFs using
//! lopdf, with page rasterization through pdfium.
//!
//! [`PdfDesk`] is the entry point: every operation takes uploads, writes a
//! single artifact (a file or a zip archive) to the outgoing area and
//! returns its name. The building blocks are public for callers that
//! work on documents in memory:
//! - [`selection`]: page range and page order grammars
//! - [`assemble`]: build a document from selected pages, encrypt, serialize
//! - [`images`]: PDF to JPEG pages and images to PDF
//! - [`compress`]: size reduction pass

pub mod assemble;
pub mod command;
pub mod compress;
pub mod config;
pub mod document;
pub mod error;
pub mod images;
pub mod operations;
pub mod package;
pub mod selection;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use command::{Artifact, OperationKind, OperationResult, PdfInfo, SplitMode, Upload};
pub use config::DeskConfig;
pub use document::PdfHandle;
pub use error::PdfDeskError;
pub use images::{PageRenderer, PdfiumRenderer};
pub use operations::PdfDesk;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<usize, PdfDeskError> {
    Ok(PdfHandle::open(bytes)?.page_count())
}
