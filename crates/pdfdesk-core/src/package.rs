//! Result packaging
//!
//! One output file is delivered as-is; several are bundled into a zip.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::command::Artifact;
use crate::error::PdfDeskError;
use crate::storage::{remove_file_quietly, WorkDir};

/// Moves finished outputs into the outgoing area
#[derive(Debug, Clone)]
pub struct Packager {
    output_dir: PathBuf,
}

impl Packager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Deliver `files` (all inside `work`) as a single artifact.
    ///
    /// A single file becomes `<prefix>_<basename>`. Several files become
    /// `<prefix>_<archive_stem>.zip` with the base names as members, in the
    /// given order. `work` is removed when this returns.
    pub fn deliver(
        &self,
        files: &[PathBuf],
        prefix: &str,
        archive_stem: &str,
        work: WorkDir,
    ) -> Result<Artifact, PdfDeskError> {
        let artifact = match files {
            [] => {
                return Err(PdfDeskError::AssemblyFailed("no output produced".into()));
            }
            [single] => {
                let filename = format!("{}_{}", prefix, base_name(single)?);
                fs::rename(single, self.output_dir.join(&filename))?;
                Artifact {
                    filename,
                    is_zip: false,
                }
            }
            many => {
                let filename = format!("{}_{}.zip", prefix, archive_stem);
                let target = self.output_dir.join(&filename);
                if let Err(e) = write_archive(&target, many) {
                    remove_file_quietly(&target);
                    return Err(e);
                }
                for file in many {
                    remove_file_quietly(file);
                }
                Artifact {
                    filename,
                    is_zip: true,
                }
            }
        };

        debug!("Dropping work dir {}", work.path().display());
        drop(work);

        info!(
            "Packaged {} file(s) as {}",
            files.len(),
            artifact.filename
        );
        Ok(artifact)
    }
}

fn base_name(path: &Path) -> Result<&str, PdfDeskError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| PdfDeskError::AssemblyFailed(format!("bad output path {}", path.display())))
}

fn zip_error(e: zip::result::ZipError) -> PdfDeskError {
    PdfDeskError::AssemblyFailed(format!("Failed to write archive: {}", e))
}

fn write_archive(target: &Path, files: &[PathBuf]) -> Result<(), PdfDeskError> {
    let mut zip = ZipWriter::new(File::create(target)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in files {
        zip.start_file(base_name(path)?, options).map_err(zip_error)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut zip)?;
    }

    zip.finish().map_err(zip_error)?;
    Ok(())
}
