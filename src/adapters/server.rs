use crate::core::ingress::IngressQueue;
use crate::domain::model::{CoinsRequest, Item};
use crate::utils::error::{Result, TokenError};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const CSV_HEADER: &str = "coins";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResponse {
    pub batch: u64,
    pub accepted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone)]
struct AppState {
    queue: IngressQueue,
    batches: Arc<AtomicU64>,
}

/// HTTP front door: turns request bodies into items on the ingress queue.
///
/// The handler answers as soon as every item is queued. Verification happens
/// later, and its outcome is never reported back to the client.
pub struct IngressServer {
    addr: SocketAddr,
    router: Router,
}

impl IngressServer {
    pub fn new(queue: IngressQueue, addr: SocketAddr, api_version: &str) -> Self {
        Self {
            addr,
            router: router(queue, api_version),
        }
    }

    /// Binds and serves until `shutdown` resolves. A bind failure is returned
    /// before any request is accepted.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|source| TokenError::BindError {
                addr: self.addr.to_string(),
                source,
            })?;
        tracing::info!("🌐 Listening on {}", self.addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

pub fn router(queue: IngressQueue, api_version: &str) -> Router {
    let state = AppState {
        queue,
        batches: Arc::new(AtomicU64::new(0)),
    };

    Router::new()
        .route(&format!("/api/{}/parse", api_version), post(handle_parse))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_parse(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let ids = match content_type.as_str() {
        "application/json" => parse_json_body(&body),
        "text/csv" => parse_csv_body(&body),
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Unable to parse request format. Set your 'Content-Type' header to 'application/json' or 'text/csv'",
            )
        }
    };

    let ids = match ids {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!("Rejected request body: {}", e);
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let batch = state.batches.fetch_add(1, Ordering::SeqCst) + 1;
    let mut accepted = 0;
    for id in ids {
        let item = match Item::new(id, batch) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!("Batch {}: skipping identifier: {}", batch, e);
                continue;
            }
        };

        // 佇列滿時在這裡等待，把背壓傳回給呼叫端
        if let Err(e) = state.queue.push(item).await {
            tracing::error!("Batch {}: {}", batch, e);
            return error_response(StatusCode::SERVICE_UNAVAILABLE, &e.to_string());
        }
        accepted += 1;
    }

    tracing::info!("📥 Batch {} accepted {} identifiers", batch, accepted);
    (
        StatusCode::ACCEPTED,
        Json(ParseResponse { batch, accepted }),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// `{"coins": ["bitcoin", "eth"]}`
pub fn parse_json_body(body: &[u8]) -> Result<Vec<String>> {
    let request: CoinsRequest = serde_json::from_slice(body)?;
    Ok(request.coins.into_iter().map(|id| id.trim().to_string()).collect())
}

/// A `coins` header column followed by one identifier per row. A body with
/// only the header, or nothing at all, is an empty batch.
pub fn parse_csv_body(body: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let column = headers
        .iter()
        .position(|h| h == CSV_HEADER)
        .ok_or_else(|| TokenError::ValidationError {
            message: "Unexpected body in request; Expecting 'coins' csv header".to_string(),
        })?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(id) = record.get(column) {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}
