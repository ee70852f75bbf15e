//!
//! catalogd HTTP server
//! --------------------
//! Axum surface over a shared `Catalog`.
//!
//! Responsibilities:
//! - Snapshot export for workers (JSON, or bincode with `encoding=bincode`).
//! - The version propagation channel: DDL callers poll `/v1/catalog/wait`
//!   until a snapshot covering their `new_version` was produced.
//! - DDL dispatch and single-table lookup.
//!
//! Catalog calls block (locks, metastore fetches), so every handler runs them
//! on the blocking pool.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::catalog::{Catalog, DdlRequest};
use crate::config::CatalogConfig;
use crate::error::{AppError, AppResult};
use crate::metastore::DirMetaStore;

/// Upper bound for a single `/v1/catalog/wait` call.
const MAX_WAIT_MS: u64 = 60_000;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(target: "catalogd::server", "request failed: {}", self);
        }
        (status, Json(json!({"status":"error","code": self.code_str(),"message": self.message()}))).into_response()
    }
}

/// Run a catalog call on the blocking pool.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(res) => res,
        Err(e) => Err(AppError::internal("internal_panic".to_string(), format!("catalog task failed: {}", e))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ObjectsParams {
    #[serde(default)]
    from_version: u64,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaitParams {
    version: u64,
    #[serde(default = "default_wait_ms")]
    timeout_ms: u64,
}

fn default_wait_ms() -> u64 { 10_000 }

async fn get_objects(State(state): State<AppState>, Query(p): Query<ObjectsParams>) -> Result<Response, AppError> {
    let catalog = state.catalog.clone();
    let from_version = p.from_version;
    let snap = blocking(move || catalog.get_catalog_objects(from_version)).await?;
    match p.encoding.as_deref() {
        Some("bincode") => {
            let bytes = snap.encode()?;
            Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
        }
        None | Some("json") => Ok(Json(json!({"status":"ok","snapshot": snap})).into_response()),
        Some(other) => Err(AppError::user("unknown_encoding".to_string(), format!("Unknown encoding '{}', expected json or bincode", other))),
    }
}

async fn get_version(State(state): State<AppState>) -> impl IntoResponse {
    let c = &state.catalog;
    Json(json!({
        "status":"ok",
        "service_id": c.service_id(),
        "current_version": c.current_version(),
        "published_version": c.published_version(),
    }))
}

async fn wait_version(State(state): State<AppState>, Query(p): Query<WaitParams>) -> Result<Json<serde_json::Value>, AppError> {
    let catalog = state.catalog.clone();
    let timeout = Duration::from_millis(p.timeout_ms.min(MAX_WAIT_MS));
    let version = p.version;
    let reached = blocking(move || Ok(catalog.wait_for_version(version, timeout))).await?;
    Ok(Json(json!({"status":"ok","reached": reached,"published_version": state.catalog.published_version()})))
}

async fn get_table(State(state): State<AppState>, Path((db, table)): Path<(String, String)>) -> Result<Json<serde_json::Value>, AppError> {
    let catalog = state.catalog.clone();
    let (d, t) = (db.clone(), table.clone());
    let found = blocking(move || catalog.get_table(&d, &t)).await?;
    let table_obj = found.ok_or_else(|| AppError::not_found("table_not_found".to_string(), format!("Table not found: {}.{}", db, table)))?;
    let object = table_obj.to_wire()?;
    let load_state = state.catalog.table_load_state(&db, &table);
    Ok(Json(json!({"status":"ok","load_state": load_state,"object": object})))
}

async fn cancel_load(State(state): State<AppState>, Path((db, table)): Path<(String, String)>) -> impl IntoResponse {
    let cancelled = state.catalog.cancel_load(&db, &table);
    Json(json!({"status":"ok","cancelled": cancelled}))
}

async fn post_ddl(State(state): State<AppState>, Json(req): Json<DdlRequest>) -> Result<Json<serde_json::Value>, AppError> {
    let catalog = state.catalog.clone();
    let resp = blocking(move || catalog.execute_ddl(req)).await?;
    Ok(Json(json!({"status":"ok","new_version": resp.new_version})))
}

/// All catalogd routes over `catalog`.
pub fn router(catalog: Arc<Catalog>) -> Router {
    Router::new()
        .route("/", get(|| async { "catalogd ok" }))
        .route("/v1/catalog/objects", get(get_objects))
        .route("/v1/catalog/version", get(get_version))
        .route("/v1/catalog/wait", get(wait_version))
        .route("/v1/catalog/tables/{db}/{table}", get(get_table))
        .route("/v1/catalog/tables/{db}/{table}/cancel", post(cancel_load))
        .route("/v1/ddl", post(post_ddl))
        .with_state(AppState { catalog })
}

/// Serve on an already-bound listener.
pub async fn serve(listener: tokio::net::TcpListener, catalog: Arc<Catalog>) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(target: "catalogd::server", "serving catalog {} on {}", catalog.service_id(), addr);
    axum::serve(listener, router(catalog)).await?;
    Ok(())
}

/// Build the directory-backed catalog described by `config` and serve it.
pub async fn run(config: CatalogConfig) -> anyhow::Result<()> {
    let root = config.metastore_root.clone();
    std::fs::create_dir_all(&root).with_context(|| format!("Failed to create or access metastore root: {}", root))?;
    let metastore = DirMetaStore::new(&root).with_context(|| format!("While opening metastore at {}", root))?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let catalog = tokio::task::spawn_blocking(move || Catalog::new(config, Arc::new(metastore)))
        .await
        .context("catalog construction task failed")??;
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {}", addr))?;
    serve(listener, Arc::new(catalog)).await
}
