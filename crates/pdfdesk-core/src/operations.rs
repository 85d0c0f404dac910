//! Operation orchestrator
//!
//! [`PdfDesk`] runs each user-facing operation through the same pipeline:
//! the upload is received and staged, validated and opened, processed by the
//! assembler or the image bridge, and finally packaged into the outgoing
//! area. Staged uploads and work directories are dropped on every path.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::assemble::{assemble, protect, to_bytes};
use crate::command::{Artifact, OperationKind, PdfInfo, SplitMode, Upload};
use crate::compress::compress_document;
use crate::config::DeskConfig;
use crate::document::PdfHandle;
use crate::error::PdfDeskError;
use crate::images::{self, PageRenderer, PdfiumRenderer};
use crate::package::Packager;
use crate::selection::{parse_order, parse_range, select_all, PageSelection};
use crate::storage::{allowed_file, file_stem, is_image_file, StagedUpload, Storage};

/// Pipeline position of a running operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Validated,
    Processed,
    Packaged,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Received => "RECEIVED",
            Stage::Validated => "VALIDATED",
            Stage::Processed => "PROCESSED",
            Stage::Packaged => "PACKAGED",
        })
    }
}

fn advance(kind: OperationKind, stage: Stage) {
    debug!(operation = %kind, %stage, "stage reached");
}

fn write_pdf(doc: &mut Document, path: &Path) -> Result<(), PdfDeskError> {
    fs::write(path, to_bytes(doc)?)?;
    Ok(())
}

/// Entry point for every operation
pub struct PdfDesk {
    config: DeskConfig,
    storage: Storage,
    packager: Packager,
    renderer: Box<dyn PageRenderer>,
}

impl fmt::Debug for PdfDesk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfDesk")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PdfDesk {
    /// Create the orchestrator with the pdfium renderer and make sure both
    /// storage areas exist.
    pub fn new(config: DeskConfig) -> Result<Self, PdfDeskError> {
        let renderer = PdfiumRenderer::new(config.pdfium_dir.clone());
        Self::with_renderer(config, Box::new(renderer))
    }

    pub fn with_renderer(
        config: DeskConfig,
        renderer: Box<dyn PageRenderer>,
    ) -> Result<Self, PdfDeskError> {
        let storage = Storage::new(&config);
        storage.ensure_dirs()?;
        let packager = Packager::new(storage.outgoing());
        Ok(Self {
            config,
            storage,
            packager,
            renderer,
        })
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    fn run<T>(
        &self,
        kind: OperationKind,
        body: impl FnOnce() -> Result<T, PdfDeskError>,
    ) -> Result<T, PdfDeskError> {
        let span = info_span!("operation", kind = %kind);
        let _entered = span.enter();

        advance(kind, Stage::Received);
        let result = body();
        match &result {
            Ok(_) => info!("{} succeeded", kind),
            Err(e) if e.is_client_error() => warn!(code = e.code(), "{} failed: {}", kind, e),
            Err(e) => error!(code = e.code(), "{} failed: {}", kind, e),
        }
        result
    }

    /// Reject a single upload without an allowed extension, otherwise stage it
    fn accept(&self, upload: &Upload) -> Result<StagedUpload, PdfDeskError> {
        if !allowed_file(&upload.file_name) {
            return Err(PdfDeskError::InvalidFileType(upload.file_name.clone()));
        }
        self.storage.stage(upload)
    }

    /// Stage, read and decrypt a single PDF upload
    fn open_pdf(
        &self,
        kind: OperationKind,
        upload: &Upload,
        password: &str,
    ) -> Result<(StagedUpload, Document), PdfDeskError> {
        let staged = self.accept(upload)?;
        let bytes = staged.read()?;
        let handle = PdfHandle::open_with_password(&bytes, password)?;
        advance(kind, Stage::Validated);
        Ok((staged, handle.into_document()))
    }

    /// Write `doc` into a fresh work dir as `name` and deliver it
    fn deliver_pdf(
        &self,
        kind: OperationKind,
        mut doc: Document,
        name: &str,
    ) -> Result<Artifact, PdfDeskError> {
        let work = self.storage.work_dir(kind.output_prefix())?;
        let out = work.join(name);
        write_pdf(&mut doc, &out)?;
        advance(kind, Stage::Processed);

        let artifact = self
            .packager
            .deliver(&[out], kind.output_prefix(), file_stem(name), work)?;
        advance(kind, Stage::Packaged);
        Ok(artifact)
    }

    /// Remove the password from a PDF. An unencrypted input is passed through.
    pub fn unlock(&self, upload: &Upload, password: &str) -> Result<Artifact, PdfDeskError> {
        let kind = OperationKind::Unlock;
        self.run(kind, || {
            let (staged, doc) = self.open_pdf(kind, upload, password)?;
            self.deliver_pdf(kind, doc, staged.safe_name())
        })
    }

    /// Encrypt a PDF with `password` as both user and owner password
    pub fn protect(&self, upload: &Upload, password: &str) -> Result<Artifact, PdfDeskError> {
        let kind = OperationKind::Protect;
        self.run(kind, || {
            if password.is_empty() {
                return Err(PdfDeskError::MissingInput("password is required".into()));
            }
            let (staged, mut doc) = self.open_pdf(kind, upload, "")?;
            protect(&mut doc, password)?;
            self.deliver_pdf(kind, doc, staged.safe_name())
        })
    }

    /// Concatenate all pages of every usable upload, in upload order.
    ///
    /// Files with a disallowed extension, or that cannot be opened with the
    /// empty password, are skipped. At least two must remain.
    pub fn merge(&self, uploads: &[Upload]) -> Result<Artifact, PdfDeskError> {
        let kind = OperationKind::Merge;
        self.run(kind, || {
            let opened: Vec<(String, Result<Document, PdfDeskError>)> = uploads
                .iter()
                .filter(|u| allowed_file(&u.file_name))
                .map(|upload| {
                    let result = self.storage.stage(upload).and_then(|staged| {
                        let bytes = staged.read()?;
                        Ok(PdfHandle::open_with_password(&bytes, "")?.into_document())
                    });
                    (upload.file_name.clone(), result)
                })
                .collect();

            let mut sources = Vec::with_capacity(opened.len());
            for (name, result) in opened {
                match result {
                    Ok(doc) => sources.push(doc),
                    Err(e) => warn!("Skipping {}: {}", name, e),
                }
            }

            if sources.len() < kind.min_inputs() {
                return Err(PdfDeskError::NoValidInput(format!(
                    "Need at least {} readable PDFs to merge, got {}",
                    kind.min_inputs(),
                    sources.len()
                )));
            }
            advance(kind, Stage::Validated);

            let mut selection = PageSelection::new();
            for (source, doc) in sources.iter().enumerate() {
                selection.extend_whole(source, doc.get_pages().len());
            }
            let merged = assemble(&sources, &selection)?;
            info!(
                "Merged {} documents into {} pages",
                sources.len(),
                selection.len()
            );

            self.deliver_pdf(kind, merged, &format!("{}.pdf", Uuid::new_v4()))
        })
    }

    /// Split into one file per page, or extract a single range
    pub fn split(&self, upload: &Upload, mode: &SplitMode) -> Result<Artifact, PdfDeskError> {
        let kind = OperationKind::Split;
        self.run(kind, || {
            let (staged, doc) = self.open_pdf(kind, upload, "")?;
            let stem = file_stem(staged.safe_name());
            let page_count = doc.get_pages().len();
            let sources = std::slice::from_ref(&doc);

            let parts: Vec<(String, Vec<usize>)> = match mode {
                SplitMode::All => select_all(page_count)
                    .into_iter()
                    .map(|i| (format!("page_{}.pdf", i + 1), vec![i]))
                    .collect(),
                SplitMode::Range(input) => {
                    let range = parse_range(input, page_count)?;
                    if range.indices.is_empty() {
                        Vec::new()
                    } else {
                        vec![(range.file_name, range.indices)]
                    }
                }
            };

            if parts.is_empty() {
                return Err(PdfDeskError::NoValidInput("Failed to split PDF".into()));
            }

            let work = self.storage.work_dir(kind.output_prefix())?;
            let mut files = Vec::with_capacity(parts.len());
            for (name, indices) in parts {
                let mut part = assemble(sources, &PageSelection::from_indices(0, indices))?;
                let path = work.join(&name);
                write_pdf(&mut part, &path)?;
                files.push(path);
            }
            advance(kind, Stage::Processed);

            let artifact = self.packager.deliver(
                &files,
                kind.output_prefix(),
                stem,
                work,
            )?;
            advance(kind, Stage::Packaged);
            Ok(artifact)
        })
    }

    /// Rebuild the document with pages in `page_order` (1-based, comma
    /// separated). Out-of-range entries are skipped.
    pub fn reorder(&self, upload: &Upload, page_order: &str) -> Result<Artifact, PdfDeskError> {
        let kind = OperationKind::Reorder;
        self.run(kind, || {
            if page_order.trim().is_empty() {
                return Err(PdfDeskError::MissingInput("page_order is required".into()));
            }
            let (staged, doc) = self.open_pdf(kind, upload, "")?;

            let order = parse_order(page_order, doc.get_pages().len())?;
            if order.indices.is_empty() {
                return Err(PdfDeskError::NoValidInput(format!(
                    "No valid pages in '{}'",
                    page_order
                )));
            }

            let reordered = assemble(
                std::slice::from_ref(&doc),
                &PageSelection::from_indices(0, order.indices),
            )?;
            self.deliver_pdf(kind, reordered, staged.safe_name())
        })
    }

    /// Render every page to a JPEG
    pub fn pdf_to_images(&self, upload: &Upload, quality: u8) -> Result<Artifact, PdfDeskError> {
        let kind = OperationKind::PdfToImages;
        self.run(kind, || {
            let staged = self.accept(upload)?;
            let bytes = staged.read()?;
            let handle = PdfHandle::open(&bytes)?;
            debug!("Rendering {} pages", handle.page_count());
            advance(kind, Stage::Validated);

            let pages = images::pdf_to_images(
                self.renderer.as_ref(),
                &bytes,
                self.config.render_dpi,
                quality,
            )?;

            let stem = file_stem(staged.safe_name());
            // A lone page is delivered unzipped and keeps the source name
            let single = pages.len() == 1;
            let work = self.storage.work_dir(kind.output_prefix())?;
            let mut files = Vec::with_capacity(pages.len());
            for page in pages {
                let name = if single {
                    format!("{}_{}", stem, page.file_name)
                } else {
                    page.file_name
                };
                let path = work.join(&name);
                fs::write(&path, &page.bytes)?;
                files.push(path);
            }
            advance(kind, Stage::Processed);

            let artifact = self.packager.deliver(
                &files,
                kind.output_prefix(),
                stem,
                work,
            )?;
            advance(kind, Stage::Packaged);
            Ok(artifact)
        })
    }

    /// Build a PDF with one page per image. Non-image uploads are skipped;
    /// an image that fails to decode fails the whole batch.
    pub fn images_to_pdf(&self, uploads: &[Upload], quality: u8) -> Result<Artifact, PdfDeskError> {
        let kind = OperationKind::ImagesToPdf;
        self.run(kind, || {
            let staged: Vec<StagedUpload> = uploads
                .iter()
                .filter(|u| {
                    let usable = allowed_file(&u.file_name) && is_image_file(&u.file_name);
                    if !usable {
                        debug!("Skipping non-image upload {}", u.file_name);
                    }
                    usable
                })
                .map(|u| self.storage.stage(u))
                .collect::<Result<_, _>>()?;

            if staged.len() < kind.min_inputs() {
                return Err(PdfDeskError::NoValidInput("No image files provided".into()));
            }
            let images = staged
                .iter()
                .map(StagedUpload::read)
                .collect::<Result<Vec<_>, _>>()?;
            advance(kind, Stage::Validated);

            let doc = images::images_to_pdf(&images, quality, self.config.max_image_dimension)?;
            self.deliver_pdf(kind, doc, &format!("{}.pdf", Uuid::new_v4()))
        })
    }

    /// Shrink a PDF; `quality` applies to re-encoded JPEG images
    pub fn compress(&self, upload: &Upload, quality: u8) -> Result<Artifact, PdfDeskError> {
        let kind = OperationKind::Compress;
        self.run(kind, || {
            let (staged, mut doc) = self.open_pdf(kind, upload, "")?;
            compress_document(&mut doc, quality)?;
            self.deliver_pdf(kind, doc, staged.safe_name())
        })
    }

    /// Report whether a PDF is encrypted and, if not, how many pages it has
    pub fn inspect(&self, upload: &Upload) -> Result<PdfInfo, PdfDeskError> {
        self.run(OperationKind::Inspect, || {
            let staged = self.accept(upload)?;
            let handle = PdfHandle::open(&staged.read()?)?;
            let is_encrypted = handle.is_encrypted();
            debug!("{} encrypted: {}", staged.safe_name(), is_encrypted);

            Ok(PdfInfo {
                is_encrypted,
                page_count: if is_encrypted { 0 } else { handle.page_count() },
                filename: staged.safe_name().to_string(),
            })
        })
    }

    /// Path of a finished artifact in the outgoing area
    pub fn download_path(&self, filename: &str) -> Result<PathBuf, PdfDeskError> {
        self.storage.resolve_download(filename)
    }
}
