//! Tender Binder Web - HTTP server for the tender document assembly API.

mod helpers;
mod routes;
mod state;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tender_binder_core::AppConfig;

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "tender-binder-web")]
#[command(author, version, about = "Tender Binder Web Server", long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Section tree directory (one numbered folder per section)
    #[arg(long, env = "TENDER_SECTIONS_DIR")]
    sections_dir: Option<PathBuf>,

    /// SQLite database file for uploaded images
    #[arg(long, env = "TENDER_DATABASE")]
    database: Option<PathBuf>,

    /// Directory the merged binder is written to after edits
    #[arg(long, env = "TENDER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load or create config, then apply CLI/env overrides
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    if let Some(sections_dir) = args.sections_dir {
        config.sections_dir = sections_dir;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    info!(
        "Sections: {}, database: {}",
        config.sections_dir.display(),
        config.database_path.display()
    );

    // Create application state (opens the image store - fails fast if locked)
    let state = Arc::new(AppState::new(config).context("Failed to initialize application state")?);

    // Build router
    let app = Router::new()
        .route("/api/tender/sections", get(routes::list_sections))
        .route("/api/tender/add-image", post(routes::add_image))
        .route("/api/tender/download", get(routes::download_tender))
        .route("/api/tender/images", get(routes::list_images))
        .route(
            "/api/tender/images/{id}",
            put(routes::update_image).delete(routes::delete_image),
        )
        .route("/api/tender/images/{id}/blob", get(routes::image_blob))
        // Middleware
        .layer(CompressionLayer::new()) // Gzip compression for responses
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024)) // 50MB limit for uploads
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
