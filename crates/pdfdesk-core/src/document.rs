//! Document handle
//!
//! Wraps a parsed `lopdf::Document` and exposes page count, encryption status
//! and decrypt-with-password.

use lopdf::Document;
use tracing::debug;

use crate::error::PdfDeskError;

/// An opened PDF owned by a single operation
#[derive(Debug)]
pub struct PdfHandle {
    document: Document,
    encrypted: bool,
}

impl PdfHandle {
    /// Parse PDF bytes. The document may still be encrypted afterwards; call
    /// [`PdfHandle::unlock`] before reading page content.
    pub fn open(bytes: &[u8]) -> Result<Self, PdfDeskError> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(PdfDeskError::InvalidFormat(
                "Not a valid PDF file (missing %PDF- header)".into(),
            ));
        }

        let document = Document::load_mem(bytes).map_err(|e| {
            if looks_encrypted(bytes) {
                PdfDeskError::DecryptionFailed(e.to_string())
            } else {
                PdfDeskError::InvalidFormat(format!("Failed to parse PDF: {}", e))
            }
        })?;

        // A document with an empty user password is decrypted while loading,
        // which drops `Encrypt` from the trailer but keeps the state.
        let encrypted = document.is_encrypted() || document.encryption_state.is_some();
        Ok(Self {
            document,
            encrypted,
        })
    }

    /// Parse and decrypt in one step
    pub fn open_with_password(bytes: &[u8], password: &str) -> Result<Self, PdfDeskError> {
        let mut handle = Self::open(bytes)?;
        handle.unlock(password)?;
        Ok(handle)
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Decrypt with `password`. A no-op for documents that are not encrypted.
    ///
    /// On success the handle no longer carries any encryption state, so a
    /// document saved from it opens without a password.
    pub fn unlock(&mut self, password: &str) -> Result<(), PdfDeskError> {
        if !self.encrypted {
            return Ok(());
        }

        // Already decrypted with the empty user password while loading
        if self.document.encryption_state.is_none() {
            self.document
                .decrypt(password)
                .map_err(|e| PdfDeskError::DecryptionFailed(e.to_string()))?;
        }

        if let Ok(encrypt_ref) = self
            .document
            .trailer
            .get(b"Encrypt")
            .and_then(|o| o.as_reference())
        {
            self.document.objects.remove(&encrypt_ref);
        }
        self.document.trailer.remove(b"Encrypt");
        self.document.encryption_state = None;
        self.encrypted = false;

        debug!("Decrypted document ({} pages)", self.page_count());
        Ok(())
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

/// Cheap check used to classify load failures
fn looks_encrypted(bytes: &[u8]) -> bool {
    bytes.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt")
}
