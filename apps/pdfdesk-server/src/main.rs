//! pdfdesk Server
//!
//! Serves the pdfdesk operations over HTTP. Each operation endpoint takes a
//! multipart upload and returns a JSON outcome naming the produced artifact,
//! which is then fetched from `/download/:filename`:
//!
//! - Unlock / protect with a password
//! - Merge, split and reorder pages
//! - PDF to JPEG pages and images to PDF
//! - Compression and encryption checks
//!
//! Configuration comes from the command line, `PDFDESK_*` environment
//! variables or a `.env` file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pdfdesk_core::{DeskConfig, PdfDesk};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
#[cfg(test)]
mod tests;

use api::AppState;

/// Command-line arguments for the pdfdesk server
#[derive(Parser, Debug)]
#[command(name = "pdfdesk-server")]
#[command(about = "PDF unlock, protect, merge, split, convert and compress server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PDFDESK_PORT", default_value = "5000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "PDFDESK_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Where uploads are staged while an operation runs
    #[arg(long, env = "PDFDESK_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Where finished artifacts wait for download
    #[arg(long, env = "PDFDESK_OUTPUT_DIR", default_value = "processed")]
    output_dir: PathBuf,

    /// Directory containing the pdfium shared library
    #[arg(long, env = "PDFDESK_PDFIUM_DIR")]
    pdfium_dir: Option<PathBuf>,

    /// Largest accepted request body in megabytes
    #[arg(long, env = "PDFDESK_MAX_UPLOAD_MB", default_value = "100")]
    max_upload_mb: usize,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "PDFDESK_RATE_LIMIT", default_value = "10")]
    rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn desk_config(&self) -> DeskConfig {
        let mut config = DeskConfig::new(&self.upload_dir, &self.output_dir);
        config.pdfium_dir = self.pdfium_dir.clone();
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting pdfdesk server on {}:{}", args.host, args.port);

    let desk = PdfDesk::new(args.desk_config()).context("Failed to prepare storage directories")?;
    let state = AppState {
        desk: Arc::new(desk),
    };

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .context("Invalid rate limit configuration")?,
    );

    let app = api::router(state, args.max_upload_mb * 1024 * 1024).layer(GovernorLayer {
        config: governor_conf,
    });

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Uploads: {}", args.upload_dir.display());
    info!("Artifacts: {}", args.output_dir.display());
    info!("Rate limit: {} requests/second per IP", args.rate_limit);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
