//! Page selection
//!
//! Translates user-supplied page specifications into validated, ordered
//! lists of 0-based page indices. Three grammars are supported:
//!
//! - **all**: every page, in order
//! - **range**: `"<start>-<end>"` (1-based, inclusive, clamped to the
//!   document) or a single `"<n>"`
//! - **order**: `"3,1,2"`, an explicit permutation or subset; out-of-range
//!   entries are skipped with a warning

use tracing::warn;

use crate::error::PdfDeskError;

/// One page of one source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRef {
    /// Position of the source in the list handed to the assembler
    pub source: usize,
    /// 0-based page index within the source
    pub index: usize,
}

/// Ordered sequence of pages to copy into a new document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelection {
    refs: Vec<PageRef>,
}

impl PageSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every page of `source`, in order
    pub fn whole(source: usize, page_count: usize) -> Self {
        Self::from_indices(source, select_all(page_count))
    }

    pub fn from_indices(source: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            refs: indices
                .into_iter()
                .map(|index| PageRef { source, index })
                .collect(),
        }
    }

    /// Append every page of another source (merge)
    pub fn extend_whole(&mut self, source: usize, page_count: usize) {
        self.refs
            .extend((0..page_count).map(|index| PageRef { source, index }));
    }

    pub fn push(&mut self, page: PageRef) {
        self.refs.push(page);
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageRef> {
        self.refs.iter()
    }
}

/// Indices `0..page_count`
pub fn select_all(page_count: usize) -> Vec<usize> {
    (0..page_count).collect()
}

/// A parsed range, already validated against the page count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSelection {
    /// 0-based indices in ascending order; empty when a single page was out
    /// of range
    pub indices: Vec<usize>,
    /// Output file name for the extracted pages
    pub file_name: String,
}

fn parse_number(part: &str, input: &str) -> Result<i64, PdfDeskError> {
    part.trim()
        .parse::<i64>()
        .map_err(|_| PdfDeskError::InvalidFormat(format!("Invalid page range: '{}'", input)))
}

/// Parse a split range against a document of `page_count` pages.
///
/// `"<start>-<end>"` is clamped to `1..=page_count`; a range that is empty
/// after clamping is rejected. A single `"<n>"` outside the document yields
/// an empty selection.
pub fn parse_range(input: &str, page_count: usize) -> Result<RangeSelection, PdfDeskError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PdfDeskError::InvalidFormat("Page range is empty".into()));
    }

    if trimmed.contains('-') {
        let parts: Vec<&str> = trimmed.split('-').collect();
        if parts.len() != 2 {
            return Err(PdfDeskError::InvalidFormat(format!(
                "Invalid page range: '{}'",
                input
            )));
        }

        let start = parse_number(parts[0], input)?.max(1);
        let end = parse_number(parts[1], input)?.min(page_count as i64);

        if start > end {
            return Err(PdfDeskError::InvalidFormat(format!(
                "Page range '{}' selects no pages (document has {} pages)",
                input, page_count
            )));
        }

        let (start, end) = (start as usize, end as usize);
        Ok(RangeSelection {
            indices: (start - 1..end).collect(),
            file_name: format!("pages_{}-{}.pdf", start, end),
        })
    } else {
        let page = parse_number(trimmed, input)?;
        if page >= 1 && page <= page_count as i64 {
            Ok(RangeSelection {
                indices: vec![page as usize - 1],
                file_name: format!("page_{}.pdf", page),
            })
        } else {
            warn!(
                "Page {} is outside the document ({} pages)",
                page, page_count
            );
            Ok(RangeSelection {
                indices: Vec::new(),
                file_name: format!("page_{}.pdf", page),
            })
        }
    }
}

/// Result of parsing a page order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSelection {
    /// Valid 0-based indices in the requested order, duplicates preserved
    pub indices: Vec<usize>,
    /// 1-based values that were dropped for being out of range
    pub skipped: Vec<i64>,
}

/// Parse a comma-separated list of 1-based page numbers.
///
/// Any entry that is not an integer fails the whole parse. Integers outside
/// `1..=page_count` are skipped and reported in [`OrderSelection::skipped`].
pub fn parse_order(input: &str, page_count: usize) -> Result<OrderSelection, PdfDeskError> {
    let values = input
        .split(',')
        .map(|part| {
            part.trim().parse::<i64>().map_err(|_| {
                PdfDeskError::InvalidFormat(format!("Invalid page order: '{}'", input))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut indices = Vec::with_capacity(values.len());
    let mut skipped = Vec::new();
    for value in values {
        if value >= 1 && value <= page_count as i64 {
            indices.push(value as usize - 1);
        } else {
            warn!("Invalid page index: {}", value);
            skipped.push(value);
        }
    }

    Ok(OrderSelection { indices, skipped })
}
