//! HTTP surface of the document store.
//!
//! A thin axum layer over [`Workspace`]: it decodes document ids, calls one store
//! operation per request and maps store errors onto status codes. Successful mutations
//! answer `200 OK` with the body `OK`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use scribe_core::storage::{decode_segment, Error, RenameOperation, TreeItem, Workspace};
use serde::Deserialize;
use tracing::{error, info, warn};

const RENAME_SUFFIX: &str = "/rename";

#[derive(Clone)]
pub struct AppState {
    pub workspace: Arc<Workspace>,
}

/// Builds the `/api` router.
pub fn router(workspace: Arc<Workspace>) -> Router {
    Router::new()
        .route("/api/documents", get(list_documents))
        .route(
            "/api/documents/{*id}",
            get(get_document).put(put_document).delete(trash_document),
        )
        .route("/api/folders/{*id}", post(create_folder))
        .route("/api/references/{*id}", get(get_references))
        .route("/api/trash", get(list_trash))
        .route("/api/trash/restore/{*id}", put(restore_item))
        .route("/api/trash/delete/{*id}", delete(delete_item))
        .route("/api/trash/empty", delete(empty_trash))
        .route("/api/settings/resolve-conflicts", post(resolve_conflicts))
        .route("/api/logs", get(get_logs).delete(clear_logs))
        .with_state(AppState { workspace })
}

pub async fn run(workspace: Arc<Workspace>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = router(workspace);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// An error answered to the client.
#[derive(Debug)]
pub enum ApiError {
    Store(Error),
    BadRequest(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Store(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Store(Error::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Store(Error::InvalidPath(_) | Error::NotADocument(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(Error::Index(_) | Error::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Store(e) => {
                if status.is_server_error() {
                    error!("request failed: {e:?}");
                } else {
                    warn!("request rejected: {e}");
                }
                e.to_string()
            }
            ApiError::BadRequest(message) => message,
        };
        (status, message).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn decode_id(raw: &str) -> String {
    raw.split('/').map(decode_segment).collect::<Vec<_>>().join("/")
}

async fn list_documents(State(state): State<AppState>) -> ApiResult<Json<Vec<TreeItem>>> {
    Ok(Json(state.workspace.list_tree().await?))
}

async fn get_document(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let (bytes, mime) = state.workspace.read_document(&decode_id(&id)).await?;
    Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest {
    new_path: String,
}

/// Saves the body as the document, or renames when the id ends in `/rename`.
async fn put_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<&'static str> {
    if let Some(old) = id.strip_suffix(RENAME_SUFFIX) {
        let request: RenameRequest = serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;
        state
            .workspace
            .rename(&decode_id(old), &decode_id(&request.new_path))
            .await?;
        return Ok("OK");
    }
    state.workspace.save(&decode_id(&id), &body).await?;
    Ok("OK")
}

async fn trash_document(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<&'static str> {
    state.workspace.trash(&decode_id(&id)).await?;
    Ok("OK")
}

async fn create_folder(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<&'static str> {
    state.workspace.create_folder(&decode_id(&id)).await?;
    Ok("OK")
}

async fn get_references(State(state): State<AppState>, Path(id): Path<String>) -> Json<Vec<String>> {
    Json(state.workspace.backlinks(&decode_id(&id)).await)
}

async fn list_trash(State(state): State<AppState>) -> ApiResult<Json<Vec<TreeItem>>> {
    Ok(Json(state.workspace.list_trash().await?))
}

async fn restore_item(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<&'static str> {
    state.workspace.restore(&id).await?;
    Ok("OK")
}

async fn delete_item(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<&'static str> {
    state.workspace.delete_permanently(&id).await?;
    Ok("OK")
}

async fn empty_trash(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.workspace.empty_trash().await?;
    Ok("OK")
}

async fn resolve_conflicts(State(state): State<AppState>) -> ApiResult<Json<Vec<RenameOperation>>> {
    Ok(Json(state.workspace.resolve_conflicts().await?))
}

async fn get_logs(State(state): State<AppState>) -> ApiResult<String> {
    Ok(state
        .workspace
        .read_activity()
        .await?
        .unwrap_or_else(|| "No logs found.".to_string()))
}

async fn clear_logs(State(state): State<AppState>) -> ApiResult<&'static str> {
    state.workspace.clear_activity().await?;
    Ok("OK")
}
