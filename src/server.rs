//!
//! docvault HTTP server
//! --------------------
//! This module defines the Axum-based HTTP API. Handlers are thin: they extract the
//! request, call into `service`, and render either a JSON body or an `AppError`.
//!
//! Responsibilities:
//! - Client listing/search and creation.
//! - Multipart document upload into one of the six slots.
//! - Stored-file existence checks and read-only static serving of the upload tree.
//! - Checkout/checkin status toggles.
//! - Startup logging, permissive CORS, upload size limit and graceful shutdown.
//!
//! The record store is opened in `run_with_config` and closed once the server has
//! drained, so its lifecycle is tied to the process rather than to a global.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::file_store::FileStore;
use crate::model::{ClientRecord, NewClient};
use crate::record_store::{open_record_store, redact_uri, SharedRecordStore};
use crate::service::{self, CheckoutRequest};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub records: SharedRecordStore,
    pub files: FileStore,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(records: SharedRecordStore, files: FileStore, config: ServerConfig) -> Self {
        Self { records, files, config: Arc::new(config) }
    }
}

fn log_startup(config: &ServerConfig) {
    let cwd = std::env::current_dir().ok();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "docvault starting: RUST_LOG='{}', http_port={}, records='{}', database='{}', upload_dir={:?}, cwd={:?}, max_upload_bytes={}",
        rust_log,
        config.http_port,
        redact_uri(&config.mongodb_uri),
        config.database_name,
        config.upload_dir,
        cwd,
        config.max_upload_bytes
    );
}

/// Mount every route on a router bound to `state`.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(60 * 60));
    let uploads_prefix = state.files.url_prefix().to_string();
    let uploads = ServeDir::new(state.files.root_path());
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(|| async { "docvault ok" }))
        .route("/clients", get(list_clients).post(create_client))
        .route("/documents/upload/{client_id}", post(upload_document))
        .route("/verify-file/{client_id}/{filename}", get(verify_file))
        .route("/clients/checkout/{client_id}", post(checkout_client))
        .route("/clients/checkin/{client_id}", post(checkin_client))
        .nest_service(&uploads_prefix, uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Open both stores, bind the HTTP port and serve until Ctrl+C or SIGTERM.
pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    log_startup(&config);

    let files = FileStore::new(&config.upload_dir, &config.uploads_url_prefix)
        .with_context(|| format!("Failed to create or access upload root: {}", config.upload_dir.display()))?;
    let records = open_record_store(&config.mongodb_uri, &config.database_name).await?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Starting server on {}", addr);

    let state = AppState::new(records.clone(), files, config);
    let served = serve_with_shutdown(listener, state, shutdown_signal()).await;

    if let Err(e) = records.close().await {
        warn!("record store did not close cleanly: {}", e);
    }
    served.context("HTTP server error")?;
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    search: String,
}

async fn list_clients(State(state): State<AppState>, Query(params): Query<SearchParams>) -> AppResult<Json<Vec<ClientRecord>>> {
    let records = service::list_clients(state.records.as_ref(), Some(params.search.as_str())).await?;
    Ok(Json(records))
}

async fn create_client(State(state): State<AppState>, payload: Result<Json<NewClient>, JsonRejection>) -> AppResult<Json<Value>> {
    let Json(new_client) = payload.map_err(|rejection| AppError::user("invalid_body", rejection.body_text()))?;
    let record = state.records.create(new_client).await?;
    info!(target: "docvault::http", "created client id='{}'", record.id);
    Ok(Json(json!({"success": true, "clientId": record.id})))
}

/// Body-limit overruns surface as 413, everything else as a malformed request.
fn multipart_failure(status: StatusCode, detail: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::too_large("payload_too_large", detail)
    } else {
        AppError::user("malformed_multipart", detail)
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    multipart_failure(err.status(), err.body_text())
}

async fn upload_document(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Value>> {
    let mut multipart = multipart.map_err(|rejection| multipart_failure(rejection.status(), rejection.body_text()))?;
    let mut doc_type: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("doc_type") => {
                let text = field.text().await.map_err(multipart_error)?;
                doc_type = Some(text);
            }
            Some("file") => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((original_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let doc_type = doc_type.ok_or_else(|| AppError::user("missing_field", "doc_type is required"))?;
    let (original_name, bytes) = file.ok_or_else(|| AppError::user("missing_field", "file is required"))?;

    let receipt = service::upload_document(state.records.as_ref(), &state.files, &client_id, &doc_type, &original_name, &bytes).await?;
    Ok(Json(json!({"success": true, "url": receipt.url})))
}

async fn verify_file(State(state): State<AppState>, Path((client_id, filename)): Path<(String, String)>) -> AppResult<Json<Value>> {
    match state.files.locate(&client_id, &filename).await {
        Ok(Some(path)) => Ok(Json(json!({"exists": true, "path": path.display().to_string()}))),
        // Malformed segments cannot name a stored file
        Ok(None) | Err(AppError::UserInput { .. }) => Err(AppError::not_found("file_not_found", "File not found")),
        Err(e) => Err(e),
    }
}

#[derive(Debug, Deserialize)]
struct CheckoutForm {
    checkout_to: Option<String>,
    purpose: Option<String>,
    expected_return: Option<String>,
}

async fn checkout_client(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    form: Result<Form<CheckoutForm>, FormRejection>,
) -> AppResult<Json<Value>> {
    let Form(form) = form.map_err(|rejection| AppError::user("invalid_form", rejection.body_text()))?;
    let request = CheckoutRequest {
        checkout_to: form.checkout_to.unwrap_or_default(),
        purpose: form.purpose,
        expected_return: form.expected_return,
    };
    service::checkout(state.records.as_ref(), &client_id, request).await?;
    Ok(Json(json!({"success": true})))
}

async fn checkin_client(State(state): State<AppState>, Path(client_id): Path<String>) -> AppResult<Json<Value>> {
    service::checkin(state.records.as_ref(), &client_id).await?;
    Ok(Json(json!({"success": true})))
}
