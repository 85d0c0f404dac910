//! Incoming and outgoing file areas
//!
//! Uploads are staged in the incoming area under a `<uuid>_<name>` file name
//! and removed when their [`StagedUpload`] guard drops. Intermediate outputs
//! live in a [`WorkDir`] under the outgoing area, which is likewise removed
//! on drop. Removal failures are logged and never escalated.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::command::Upload;
use crate::config::DeskConfig;
use crate::error::PdfDeskError;

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["pdf", "jpg", "jpeg", "png"];

pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Longest name [`secure_filename`] returns. Leaves room for the staging
/// and output prefixes under the usual 255-byte filesystem limit.
pub const MAX_FILENAME_LEN: usize = 200;

/// Lower-cased extension of `filename`, if it has one
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// True if `filename` carries one of [`ALLOWED_EXTENSIONS`]
pub fn allowed_file(filename: &str) -> bool {
    extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// True if `filename` carries one of [`IMAGE_EXTENSIONS`]
pub fn is_image_file(filename: &str) -> bool {
    extension(filename)
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to a safe base name.
///
/// Directory components are dropped, whitespace becomes `_`, and anything
/// other than ASCII alphanumerics, `.`, `-` and `_` is removed. Leading dots
/// and underscores are stripped so the result can never be `..` or hidden.
/// Names longer than [`MAX_FILENAME_LEN`] lose the end of their stem but
/// keep their extension. Falls back to `document.pdf` when nothing usable
/// is left.
pub fn secure_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else {
                None
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches(['.', '_']);
    if cleaned.is_empty() {
        "document.pdf".to_string()
    } else {
        truncate_name(cleaned)
    }
}

// Only sees ASCII, so byte offsets are char boundaries
fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_FILENAME_LEN {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() < MAX_FILENAME_LEN / 2 => {
            let keep = MAX_FILENAME_LEN - ext.len() - 1;
            format!("{}.{}", &stem[..keep], ext)
        }
        _ => name[..MAX_FILENAME_LEN].to_string(),
    }
}

/// File name without its final extension
pub fn file_stem(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}

pub(crate) fn remove_file_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// An upload written to the incoming area. Deleted on drop.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    safe_name: String,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sanitized original file name (without the unique prefix)
    pub fn safe_name(&self) -> &str {
        &self.safe_name
    }

    pub fn read(&self) -> Result<Vec<u8>, PdfDeskError> {
        Ok(fs::read(&self.path)?)
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        debug!("Removing staged upload {}", self.path.display());
        remove_file_quietly(&self.path);
    }
}

/// Per-operation scratch directory under the outgoing area. Removed with its
/// remaining contents on drop.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!("Failed to remove work dir {}: {}", self.path.display(), e);
        }
    }
}

/// The two storage areas the core is allowed to touch
#[derive(Debug, Clone)]
pub struct Storage {
    incoming: PathBuf,
    outgoing: PathBuf,
}

impl Storage {
    pub fn new(config: &DeskConfig) -> Self {
        Self {
            incoming: config.upload_dir.clone(),
            outgoing: config.output_dir.clone(),
        }
    }

    pub fn ensure_dirs(&self) -> Result<(), PdfDeskError> {
        fs::create_dir_all(&self.incoming)?;
        fs::create_dir_all(&self.outgoing)?;
        Ok(())
    }

    pub fn outgoing(&self) -> &Path {
        &self.outgoing
    }

    /// Write an upload to the incoming area under a unique name
    pub fn stage(&self, upload: &Upload) -> Result<StagedUpload, PdfDeskError> {
        let safe_name = secure_filename(&upload.file_name);
        let path = self
            .incoming
            .join(format!("{}_{}", Uuid::new_v4(), safe_name));
        fs::write(&path, &upload.bytes)?;
        debug!(
            "Staged {} ({} bytes) at {}",
            upload.file_name,
            upload.bytes.len(),
            path.display()
        );
        Ok(StagedUpload { path, safe_name })
    }

    /// Create a fresh `<prefix>_<uuid>` directory under the outgoing area
    pub fn work_dir(&self, prefix: &str) -> Result<WorkDir, PdfDeskError> {
        let path = self.outgoing.join(format!("{}_{}", prefix, Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        Ok(WorkDir { path })
    }

    /// Locate a finished artifact by name
    pub fn resolve_download(&self, filename: &str) -> Result<PathBuf, PdfDeskError> {
        let traverses = filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename == "..";
        if traverses {
            return Err(PdfDeskError::NotFound(filename.to_string()));
        }

        let path = self.outgoing.join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PdfDeskError::NotFound(filename.to_string()))
        }
    }
}
