use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PdfDeskError;

/// A file as delivered by the HTTP layer
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// The user-facing operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Unlock,
    Protect,
    Merge,
    Split,
    Reorder,
    PdfToImages,
    ImagesToPdf,
    Compress,
    Inspect,
}

impl OperationKind {
    /// Minimum number of accepted input files
    pub fn min_inputs(self) -> usize {
        match self {
            OperationKind::Merge => 2,
            _ => 1,
        }
    }

    /// Prefix given to the delivered artifact name
    pub fn output_prefix(self) -> &'static str {
        match self {
            OperationKind::Unlock => "unlocked",
            OperationKind::Protect => "protected",
            OperationKind::Merge => "merged",
            OperationKind::Split => "split",
            OperationKind::Reorder => "reordered",
            OperationKind::PdfToImages => "images",
            OperationKind::ImagesToPdf => "converted",
            OperationKind::Compress => "compressed",
            OperationKind::Inspect => "inspected",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Unlock => "unlock",
            OperationKind::Protect => "protect",
            OperationKind::Merge => "merge",
            OperationKind::Split => "split",
            OperationKind::Reorder => "reorder",
            OperationKind::PdfToImages => "pdf-to-images",
            OperationKind::ImagesToPdf => "images-to-pdf",
            OperationKind::Compress => "compress",
            OperationKind::Inspect => "inspect",
        };
        f.write_str(name)
    }
}

/// How a split should cut the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMode {
    /// One file per page
    All,
    /// A single `"<start>-<end>"` or `"<n>"` range
    Range(String),
}

impl SplitMode {
    /// Build from the `split_type` / `page_range` form fields
    pub fn from_form(split_type: &str, page_range: &str) -> Result<Self, PdfDeskError> {
        match split_type.trim() {
            "" | "all" => Ok(SplitMode::All),
            "range" => {
                if page_range.trim().is_empty() {
                    Err(PdfDeskError::MissingInput("page_range is required".into()))
                } else {
                    Ok(SplitMode::Range(page_range.to_string()))
                }
            }
            other => Err(PdfDeskError::InvalidFormat(format!(
                "Unknown split type '{}'",
                other
            ))),
        }
    }
}

/// A finished artifact sitting in the outgoing area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub is_zip: bool,
}

/// Outcome surfaced to callers
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_zip: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl OperationResult {
    pub fn succeeded(artifact: &Artifact) -> Self {
        Self {
            success: true,
            filename: Some(artifact.filename.clone()),
            is_zip: Some(artifact.is_zip),
            error: None,
            code: None,
        }
    }
}

/// Encryption and size report for an uploaded PDF
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PdfInfo {
    pub is_encrypted: bool,
    /// Zero when the document is encrypted
    pub page_count: usize,
    pub filename: String,
}
