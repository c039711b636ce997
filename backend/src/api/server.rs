//! HTTP Server for the splitledger API.
//!
//! Provides REST endpoints for report reconciliation.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                          |
//! |--------|-------------------|--------------------------------------|
//! | GET    | `/health`         | Health check                         |
//! | POST   | `/api/reconcile`  | Reconcile a JSON report body         |
//! | POST   | `/api/upload`     | Upload a report file (multipart)     |
//! | GET    | `/api/logs`       | SSE stream for real-time logs        |
//!
//! Both POST routes accept `strategy`, `keep_standalone` and `uid` query
//! parameters.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, LOG_BROADCASTER};
use super::types::{error_response, ReconcileQuery, ReconcileResponse};
use crate::config::MAX_UPLOAD_BYTES;
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::transform::pipeline::{reconcile_bytes, reconcile_report, ReconcileOutput};

type ApiError = (StatusCode, Json<Value>);

/// Build the application router.
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/reconcile", post(reconcile_json))
        .route("/api/upload", post(upload_report))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    eprintln!("splitledger server running on http://localhost:{}", port);
    eprintln!("   POST /api/reconcile - Reconcile a JSON report");
    eprintln!("   POST /api/upload    - Upload a report file");
    eprintln!("   GET  /api/logs      - SSE log stream");
    eprintln!("   GET  /health        - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "splitledger",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "reconcile": "POST /api/reconcile",
            "upload": "POST /api/upload",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Reconcile a report posted as a JSON body
async fn reconcile_json(
    Query(query): Query<ReconcileQuery>,
    Json(document): Json<Value>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    log_info("New report received");
    let output = reconcile_report(&document, &query.options()).map_err(ServerError::from);
    respond(output)
}

/// Upload a report file
async fn upload_report(
    Query(query): Query<ReconcileQuery>,
    mut multipart: Multipart,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            file_data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Read error: {}", e)))?
                    .to_vec(),
            );
        }
    }

    let bytes = file_data.ok_or_else(|| bad_request("No file provided".to_string()))?;

    log_info(format!(
        "New upload: {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let output = reconcile_bytes(&bytes, &query.options()).map_err(ServerError::from);
    respond(output)
}

fn respond(output: ServerResult<ReconcileOutput>) -> Result<Json<ReconcileResponse>, ApiError> {
    let output = output.map_err(into_api_error)?;
    ReconcileResponse::from_output(output)
        .map(Json)
        .map_err(|e| into_api_error(PipelineError::from(e).into()))
}

fn bad_request(message: String) -> ApiError {
    into_api_error(ServerError::BadRequest(message))
}

/// Map an error to a status code; report and source problems are the
/// client's fault.
fn into_api_error(error: ServerError) -> ApiError {
    let status = match &error {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Report(_))
        | ServerError::Pipeline(PipelineError::Source(_))
        | ServerError::Pipeline(PipelineError::Validation { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(error_response(&error.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;

    #[test]
    fn test_report_errors_are_unprocessable() {
        let (status, body) = into_api_error(PipelineError::from(ReportError::EmptyReport).into());
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.0["status"], "error");
    }

    #[test]
    fn test_bad_request() {
        let (status, body) = bad_request("No file provided".to_string());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0["error"].as_str().unwrap().contains("No file provided"));
    }

    #[tokio::test]
    async fn test_reconcile_json_handler() {
        let document = json!({
            "Columns": { "Column": [{ "ColTitle": "Account" }] },
            "Rows": { "Row": [{
                "Rows": { "Row": [
                    { "ColData": [{ "value": "Checking", "id": "35" }] },
                    { "ColData": [{ "value": "Fees", "id": "80" }] }
                ]}
            }]}
        });

        let Json(response) = reconcile_json(Query(ReconcileQuery::default()), Json(document))
            .await
            .unwrap();
        assert_eq!(response.records.len(), 2);
        assert_eq!(response.records[0]["to_account_id"], "80");
    }
}
