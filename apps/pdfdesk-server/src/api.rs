//! API handlers for the pdfdesk server
//!
//! Every operation endpoint takes a multipart form, runs the operation on the
//! blocking pool and answers with an [`OperationResult`]. Artifacts are
//! fetched afterwards through `GET /download/:filename`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdfdesk_core::config::{DEFAULT_COMPRESS_QUALITY, DEFAULT_IMAGE_QUALITY};
use pdfdesk_core::{OperationResult, PdfDesk, PdfDeskError, PdfInfo, SplitMode, Upload};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::ServerError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<PdfDesk>,
}

/// Routes with CORS, request tracing and the upload size limit applied
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/unlock-pdf", post(handle_unlock))
        .route("/api/protect-pdf", post(handle_protect))
        .route("/api/merge-pdfs", post(handle_merge))
        .route("/api/split-pdf", post(handle_split))
        .route("/api/reorder-pdf", post(handle_reorder))
        .route("/api/convert-pdf-to-images", post(handle_pdf_to_images))
        .route("/api/convert-images-to-pdf", post(handle_images_to_pdf))
        .route("/api/compress-pdf", post(handle_compress))
        .route("/api/check-pdf-encryption", post(handle_check_encryption))
        .route("/download/:filename", get(handle_download))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfdesk-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// A parsed multipart form: uploads keyed by field name plus text fields
#[derive(Default)]
struct UploadForm {
    files: Vec<(String, Upload)>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::InvalidRequest(format!("Malformed form: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ServerError::InvalidRequest(format!("Upload failed: {}", e)))?;
                    // Browsers send an empty part for an untouched file input
                    if file_name.is_empty() {
                        continue;
                    }
                    debug!("Received {} ({} bytes) as '{}'", file_name, bytes.len(), name);
                    form.files.push((name, Upload::new(file_name, bytes.to_vec())));
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| ServerError::InvalidRequest(format!("Bad field {}: {}", name, e)))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// First upload sent under `name`
    fn file(&mut self, name: &str) -> Result<Upload, ServerError> {
        let position = self
            .files
            .iter()
            .position(|(field, _)| field == name)
            .ok_or_else(|| PdfDeskError::MissingInput("No file uploaded".into()))?;
        Ok(self.files.remove(position).1)
    }

    /// Every upload sent under `name`, in order
    fn files(&mut self, name: &str) -> Vec<Upload> {
        let (matching, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = rest;
        matching.into_iter().map(|(_, upload)| upload).collect()
    }

    fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    fn quality(&self, default: u8) -> Result<u8, ServerError> {
        parse_quality(self.text("quality"), default)
    }
}

/// Quality form value clamped to 1..=100, `default` when blank
pub(crate) fn parse_quality(raw: &str, default: u8) -> Result<u8, ServerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    let value: i64 = raw
        .parse()
        .map_err(|_| ServerError::InvalidRequest(format!("quality must be a number, got '{}'", raw)))?;
    Ok(value.clamp(1, 100) as u8)
}

/// Run a core operation on the blocking pool
async fn run_blocking<T, F>(state: &AppState, op: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce(&PdfDesk) -> Result<T, PdfDeskError> + Send + 'static,
{
    let desk = Arc::clone(&state.desk);
    let outcome = tokio::task::spawn_blocking(move || op(&desk))
        .await
        .map_err(|e| ServerError::Internal(format!("Worker task failed: {}", e)))?;
    Ok(outcome?)
}

fn succeeded(artifact: pdfdesk_core::Artifact) -> Json<OperationResult> {
    info!("Produced {} (zip: {})", artifact.filename, artifact.is_zip);
    Json(OperationResult::succeeded(&artifact))
}

/// Handler: POST /api/unlock-pdf
pub async fn handle_unlock(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResult>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.file("file")?;
    let password = form.text("password").to_string();

    let artifact = run_blocking(&state, move |desk| desk.unlock(&upload, &password)).await?;
    Ok(succeeded(artifact))
}

/// Handler: POST /api/protect-pdf
pub async fn handle_protect(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResult>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.file("file")?;
    let password = form.text("password").to_string();

    let artifact = run_blocking(&state, move |desk| desk.protect(&upload, &password)).await?;
    Ok(succeeded(artifact))
}

/// Handler: POST /api/merge-pdfs
pub async fn handle_merge(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResult>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;
    let uploads = form.files("files");
    if uploads.len() < 2 {
        return Err(PdfDeskError::MissingInput("Please select at least 2 PDF files".into()).into());
    }

    let artifact = run_blocking(&state, move |desk| desk.merge(&uploads)).await?;
    Ok(succeeded(artifact))
}

/// Handler: POST /api/split-pdf
pub async fn handle_split(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResult>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.file("file")?;
    let mode = SplitMode::from_form(form.text("split_type"), form.text("page_range"))?;

    let artifact = run_blocking(&state, move |desk| desk.split(&upload, &mode)).await?;
    Ok(succeeded(artifact))
}

/// Handler: POST /api/reorder-pdf
pub async fn handle_reorder(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResult>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.file("file")?;
    let page_order = form.text("page_order").to_string();

    let artifact = run_blocking(&state, move |desk| desk.reorder(&upload, &page_order)).await?;
    Ok(succeeded(artifact))
}

/// Handler: POST /api/convert-pdf-to-images
pub async fn handle_pdf_to_images(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResult>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.file("file")?;
    let quality = form.quality(DEFAULT_IMAGE_QUALITY)?;

    let artifact = run_blocking(&state, move |desk| desk.pdf_to_images(&upload, quality)).await?;
    Ok(succeeded(artifact))
}

/// Handler: POST /api/convert-images-to-pdf
pub async fn handle_images_to_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResult>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;
    let uploads = form.files("files");
    if uploads.is_empty() {
        return Err(PdfDeskError::MissingInput("No files uploaded".into()).into());
    }
    let quality = form.quality(DEFAULT_IMAGE_QUALITY)?;

    let artifact = run_blocking(&state, move |desk| desk.images_to_pdf(&uploads, quality)).await?;
    Ok(succeeded(artifact))
}

/// Handler: POST /api/compress-pdf
pub async fn handle_compress(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<OperationResult>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.file("file")?;
    let quality = form.quality(DEFAULT_COMPRESS_QUALITY)?;

    let artifact = run_blocking(&state, move |desk| desk.compress(&upload, quality)).await?;
    Ok(succeeded(artifact))
}

/// Encryption check response
#[derive(Serialize)]
pub struct EncryptionResponse {
    pub success: bool,
    #[serde(flatten)]
    pub info: PdfInfo,
}

/// Handler: POST /api/check-pdf-encryption
pub async fn handle_check_encryption(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<EncryptionResponse>, ServerError> {
    let mut form = UploadForm::read(multipart).await?;
    let upload = form.file("file")?;

    let info = run_blocking(&state, move |desk| desk.inspect(&upload)).await?;
    Ok(Json(EncryptionResponse {
        success: true,
        info,
    }))
}

pub(crate) fn content_type_for(filename: &str) -> &'static str {
    match pdfdesk_core::storage::extension(filename).as_deref() {
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Handler: GET /download/:filename
pub async fn handle_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ServerError> {
    let path = state.desk.download_path(&filename)?;
    let bytes = tokio::fs::read(&path).await.map_err(PdfDeskError::from)?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&filename).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from(bytes),
    )
        .into_response())
}
