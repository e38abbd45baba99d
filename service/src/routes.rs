use crate::arrow_io::write_ipc_stream;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{CreateSessionResponse, ParseLineRequest, ParseLineResponse, SessionMeta};
use crate::stats::{compute_stats, StatsOptions, StatsReport};
use crate::storage::{ingest_outcome, SessionStorage};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use clf_parser::{ParserRegistry, RejectedLine};
use serde::Deserialize;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<SessionStorage>,
    pub registry: Arc<ParserRegistry>,
}

impl AppState {
    pub fn new(storage: SessionStorage) -> Self {
        Self {
            storage: Arc::new(storage),
            registry: Arc::new(ParserRegistry::new()),
        }
    }
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/parse", post(parse_line))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", delete(delete_session))
        .route("/sessions/:id/meta", get(get_meta))
        .route("/sessions/:id/records.arrow", get(get_records_arrow))
        .route("/sessions/:id/rejected", get(get_rejected))
        .route("/sessions/:id/stats", get(get_stats))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn parse_line(Json(req): Json<ParseLineRequest>) -> Json<ParseLineResponse> {
    Json(ParseLineResponse::from_line(&req.line))
}

/// Runs blocking file work off the async executor.
async fn blocking<T, F>(f: F) -> ServiceResult<T>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(format!("Worker task failed: {}", e)))?
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    /// Skip detection and force a parser, e.g. `clf`
    format: Option<String>,
}

#[instrument(skip(state, multipart))]
async fn create_session(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> ServiceResult<Json<CreateSessionResponse>> {
    info!("Received file upload request");

    let mut file_data = Vec::new();
    let mut filename = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("unknown").to_string();
            info!("Receiving file: {}", filename);

            let data = field
                .bytes()
                .await
                .map_err(|e| ServiceError::BadRequest(format!("Failed to read file: {}", e)))?;
            file_data = data.to_vec();
            info!("File data received: {} bytes", file_data.len());
        }
    }

    if file_data.is_empty() {
        warn!("No file data provided in request");
        return Err(ServiceError::BadRequest("No file provided".to_string()));
    }

    let session_id = state.storage.create_session()?;
    info!("Created session: {}", session_id);

    let storage = state.storage.clone();
    let registry = state.registry.clone();
    let id = session_id.clone();
    let result = blocking(move || {
        let reader = Box::new(Cursor::new(file_data));
        let (format, outcome) = match query.format.as_deref() {
            Some(name) => registry.parse_as(reader, Some(name))?,
            None => registry.parse_with_hint(reader, &filename)?,
        };
        ingest_outcome(&storage, &id, &filename, format, outcome)
    })
    .await;

    match result {
        Ok(meta) => Ok(Json(CreateSessionResponse { session_id, meta })),
        Err(e) => {
            warn!("Ingest failed for session {}, removing it: {}", session_id, e);
            if let Err(cleanup) = state.storage.delete_session(&session_id) {
                warn!("Failed to remove session {}: {}", session_id, cleanup);
            }
            Err(e)
        }
    }
}

async fn get_meta(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ServiceResult<Json<SessionMeta>> {
    let storage = state.storage.clone();
    let meta = blocking(move || storage.read_meta(&session_id)).await?;
    Ok(Json(meta))
}

#[instrument(skip(state))]
async fn get_records_arrow(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ServiceResult<Response> {
    let storage = state.storage.clone();
    let buffer = blocking(move || {
        storage.read_meta(&session_id)?;
        let batches = storage.load_batches(&session_id)?;
        debug!("Streaming {} batches", batches.len());
        let mut buffer = Vec::new();
        write_ipc_stream(&mut buffer, &batches)?;
        Ok(buffer)
    })
    .await?;

    Ok((
        [(header::CONTENT_TYPE, "application/vnd.apache.arrow.stream")],
        buffer,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct RejectedQuery {
    #[serde(default = "default_rejected_limit")]
    limit: usize,
}

fn default_rejected_limit() -> usize {
    1_000
}

async fn get_rejected(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<RejectedQuery>,
) -> ServiceResult<Json<Vec<RejectedLine>>> {
    let storage = state.storage.clone();
    let rejected = blocking(move || {
        let mut rejected = storage.read_rejected(&session_id)?;
        rejected.truncate(query.limit);
        Ok(rejected)
    })
    .await?;
    Ok(Json(rejected))
}

#[instrument(skip(state), fields(session_id = %session_id))]
async fn get_stats(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(opts): Query<StatsOptions>,
) -> ServiceResult<Json<StatsReport>> {
    info!("Stats request: top={}, min_requests={}", opts.top, opts.min_requests);

    let storage = state.storage.clone();
    let report = blocking(move || {
        // meta.json is written last, so this also rejects half-ingested sessions
        storage.read_meta(&session_id)?;
        let batches = storage.load_batches(&session_id)?;
        compute_stats(&batches, &opts)
    })
    .await?;

    Ok(Json(report))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ServiceResult<StatusCode> {
    state.storage.delete_session(&session_id)?;
    info!("Deleted session: {}", session_id);
    Ok(StatusCode::NO_CONTENT)
}
