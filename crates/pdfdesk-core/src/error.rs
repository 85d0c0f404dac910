use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfDeskError {
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Failed to decrypt PDF: {0}")]
    DecryptionFailed(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("No valid input: {0}")]
    NoValidInput(String),

    #[error("PDF operation failed: {0}")]
    AssemblyFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfDeskError {
    /// Stable machine-readable reason
    pub fn code(&self) -> &'static str {
        match self {
            PdfDeskError::InvalidFileType(_) => "INVALID_FILE_TYPE",
            PdfDeskError::InvalidFormat(_) => "INVALID_FORMAT",
            PdfDeskError::DecryptionFailed(_) => "DECRYPTION_FAILED",
            PdfDeskError::ConversionFailed(_) => "CONVERSION_FAILED",
            PdfDeskError::NoValidInput(_) => "NO_VALID_INPUT",
            PdfDeskError::AssemblyFailed(_) => "ASSEMBLY_FAILED",
            PdfDeskError::NotFound(_) => "NOT_FOUND",
            PdfDeskError::MissingInput(_) => "MISSING_INPUT",
            PdfDeskError::Io(_) => "IO_ERROR",
        }
    }

    /// True when the failure was caused by the caller's input rather than
    /// by the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            PdfDeskError::AssemblyFailed(_) | PdfDeskError::Io(_)
        )
    }
}
