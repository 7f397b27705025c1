use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::{QuadcladError, Result};
use crate::interface::{QueryInterface, QueryOptions};

#[derive(Deserialize)]
pub struct QueryRequest {
    pub script: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub status: String,
    pub elapsed_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limited: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn status_of(e: &QuadcladError) -> StatusCode {
    match e {
        QuadcladError::Parse { .. }
        | QuadcladError::PathCompilation(_)
        | QuadcladError::InvalidQuad(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn router(interface: Arc<QueryInterface>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/v1/query", post(query))
        .route("/v1/quads", post(import_quads).get(export_quads))
        .layer(cors)
        .with_state(interface)
}

async fn query(
    State(interface): State<Arc<QueryInterface>>,
    Json(request): Json<QueryRequest>,
) -> (StatusCode, Json<QueryResponse>) {
    let started = Instant::now();
    let options = QueryOptions {
        stream_results: true,
        timeout: request.timeout_ms.map(Duration::from_millis),
    };
    // the engine is synchronous, so the query runs off the async workers
    let result = tokio::task::spawn_blocking(move || {
        interface.start_query(request.script, options)?.collect()
    })
    .await
    .unwrap_or_else(|e| Err(QuadcladError::Lock(format!("query task failed: {}", e))));
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    match result {
        Ok(result) => {
            info!(ms = elapsed_ms, rows = result.row_count, limited = result.limited, "query complete");
            let body = QueryResponse {
                status: "ok".into(),
                elapsed_ms,
                row_count: Some(result.row_count),
                limited: Some(result.limited),
                values: Some(result.values),
                error: None,
            };
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            let status = status_of(&e);
            let msg = e.to_string();
            warn!(%msg, code = %status.as_u16(), "query error");
            let body = QueryResponse {
                status: "error".into(),
                elapsed_ms,
                row_count: None,
                limited: None,
                values: None,
                error: Some(msg),
            };
            (status, Json(body))
        }
    }
}

async fn import_quads(
    State(interface): State<Arc<QueryInterface>>,
    body: String,
) -> (StatusCode, Json<ImportResponse>) {
    let store = Arc::clone(interface.store());
    let result = tokio::task::spawn_blocking(move || store.import_nquads(body.as_bytes()))
        .await
        .unwrap_or_else(|e| Err(QuadcladError::Lock(format!("import task failed: {}", e))));
    match result {
        Ok(inserted) => {
            info!(inserted, "imported quads");
            let body = ImportResponse {
                status: "ok".into(),
                inserted: Some(inserted),
                error: None,
            };
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            let status = status_of(&e);
            warn!(error = %e, "import error");
            let body = ImportResponse {
                status: "error".into(),
                inserted: None,
                error: Some(e.to_string()),
            };
            (status, Json(body))
        }
    }
}

async fn export_quads(State(interface): State<Arc<QueryInterface>>) -> impl IntoResponse {
    let store = Arc::clone(interface.store());
    let result = tokio::task::spawn_blocking(move || store.to_nquads())
        .await
        .unwrap_or_else(|e| Err(QuadcladError::Lock(format!("export task failed: {}", e))));
    match result {
        Ok(document) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/n-quads")],
            document,
        ),
        Err(e) => {
            warn!(error = %e, "export error");
            (
                status_of(&e),
                [(header::CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
        }
    }
}

/// Serves until ctrl-c.
pub async fn serve(interface: Arc<QueryInterface>, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %listener.local_addr()?, "listening");
    axum::serve(listener, router(interface))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for shutdown");
            }
        })
        .await?;
    Ok(())
}
