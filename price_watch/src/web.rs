//! HTTP trigger surface
//!
//! - `GET /api/update-prices` scrapes and returns the price sheet as a CSV download
//! - `GET /api/update-prices-pdf` runs the full job (diff, reports, notifications)
//! - `GET /reports/*` serves the generated report files

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::report::CsvReport;

const DOWNLOAD_NAME: &str = "precios.csv";

/// Shared application state (pipeline + run lock, one run at a time)
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    run_lock: Arc<Mutex<()>>,
}

fn text_response(status: StatusCode, text: &str) -> Response {
    let mut response = Response::new(Body::from(text.to_string()));
    *response.status_mut() = status;
    response
}

async fn export_sheet(pipeline: &Pipeline) -> Result<Vec<u8>> {
    let snapshot = pipeline.scrape().await?;
    std::fs::create_dir_all(pipeline.report_dir())?;
    let path = pipeline.report_dir().join(DOWNLOAD_NAME);
    CsvReport::write_to(&path, &snapshot)?;
    Ok(std::fs::read(&path)?)
}

/// GET /api/update-prices
async fn export_handler(State(state): State<AppState>) -> Response {
    let _guard = state.run_lock.lock().await;

    match export_sheet(&state.pipeline).await {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/csv; charset=utf-8"));
            headers.insert(
                header::CONTENT_DISPOSITION,
                header::HeaderValue::from_static("attachment; filename=\"precios.csv\""),
            );
            response
        }
        Err(e) => {
            log::error!("Export failed: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}

/// GET /api/update-prices-pdf
async fn job_handler(State(state): State<AppState>) -> Response {
    let _guard = state.run_lock.lock().await;

    match state.pipeline.run_job().await {
        Ok(report) => {
            log::info!(
                "Job finished ({}): {} change(s), persisted: {}",
                report.state,
                report.changes.len(),
                report.persisted
            );
            text_response(StatusCode::OK, "Done")
        }
        Err(e) => {
            log::error!("Job failed: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}

/// Build the web server router
pub fn create_router(pipeline: Arc<Pipeline>) -> Router {
    let reports = ServeDir::new(pipeline.report_dir());
    let state = AppState {
        pipeline,
        run_lock: Arc::new(Mutex::new(())),
    };

    Router::new()
        .route("/api/update-prices", get(export_handler))
        .route("/api/update-prices-pdf", get(job_handler))
        .nest_service("/reports", reports)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web server (async)
///
/// Binds to 0.0.0.0 (all interfaces) to work with Docker port mapping.
pub async fn serve(pipeline: Arc<Pipeline>, port: u16) -> Result<()> {
    let app = create_router(pipeline);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Web server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
