//! HTTP route handlers for the session API.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::task::JoinError;
use tracing::{debug, error, info};

use keyflow::core::collab::Collaborators;
use keyflow::core::error::DispatchError;
use keyflow::core::session::{AuthContext, Session};
use keyflow::core::types::{ErrorKind, Failure, Outcome};
use keyflow::engine::Engine;

use crate::state::{AppState, SessionId};

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/block", get(get_block))
        .route("/sessions/{id}/dispatch", post(dispatch))
        .route("/sessions/{id}/select", post(select))
        .route("/sessions/{id}/back", post(back))
}

/// Error body: the failed outcome plus an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiError {
    fn unknown_session(id: SessionId) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: failed_body(ErrorKind::NotFound, format!("unknown session {id}")),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let failure = Failure::from(&err);
        Self {
            status,
            body: outcome_json(&Outcome::Failed { error: failure }),
        }
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        error!(error = %err, "session task failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: failed_body(ErrorKind::Action, format!("session task failed: {err}")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn outcome_json(outcome: &Outcome) -> Value {
    serde_json::to_value(outcome).unwrap_or(Value::Null)
}

fn failed_body(kind: ErrorKind, message: String) -> Value {
    outcome_json(&Outcome::failed(kind, message))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct CreateSession {
    pub path: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub user: Option<String>,
}

/// POST /api/sessions - open a document in a new session.
async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSession>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let mut session = state.new_session();
    session.set_auth(AuthContext {
        user: request.user,
        ..AuthContext::with_roles(request.roles)
    });
    let session = Arc::new(Mutex::new(session));
    let location = state
        .run_blocking(session.clone(), move |engine, collab, session| {
            engine.start(session, &request.path, collab)
        })
        .await??;

    let id = state.next_id();
    state.insert(id, session).await;
    info!(id, at = %location, "session created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "location": location })),
    ))
}

/// GET /api/sessions/{id} - the persisted session shape.
async fn get_session(State(state): State<AppState>, Path(id): Path<SessionId>) -> ApiResult {
    let session = state
        .session(id)
        .await
        .ok_or_else(|| ApiError::unknown_session(id))?;
    let session = session.lock().await;
    Ok(Json(serde_json::to_value(&*session).unwrap_or(Value::Null)))
}

/// GET /api/sessions/{id}/block - keys of the current block.
async fn get_block(State(state): State<AppState>, Path(id): Path<SessionId>) -> ApiResult {
    let session = state
        .session(id)
        .await
        .ok_or_else(|| ApiError::unknown_session(id))?;
    let block = state
        .run_blocking(session, |engine, collab, session| {
            let entries = engine.current_block(session, collab)?;
            Ok::<_, DispatchError>(json!({
                "location": session.current_location(),
                "keys": entries.keys().collect::<Vec<_>>(),
            }))
        })
        .await??;
    Ok(Json(block))
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub key: String,
}

/// POST /api/sessions/{id}/dispatch - run one key of the current block.
async fn dispatch(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(request): Json<DispatchRequest>,
) -> ApiResult {
    debug!(id, key = %request.key, "dispatch");
    with_session(&state, id, move |engine, collab, session| {
        engine.dispatch_key(session, &request.key, collab)
    })
    .await
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub input: String,
}

/// POST /api/sessions/{id}/select - answer the pending menu.
async fn select(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(request): Json<SelectRequest>,
) -> ApiResult {
    with_session(&state, id, move |engine, collab, session| {
        engine.resume(session, &request.input, collab)
    })
    .await
}

/// POST /api/sessions/{id}/back - step back along the breadcrumb trail.
async fn back(State(state): State<AppState>, Path(id): Path<SessionId>) -> ApiResult {
    with_session(&state, id, |engine, _, session| Ok(engine.go_back(session))).await
}

/// DELETE /api/sessions/{id} - tear the session down.
async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<StatusCode, ApiError> {
    let session = state
        .remove(id)
        .await
        .ok_or_else(|| ApiError::unknown_session(id))?;
    let mut session = session.lock().await;
    let scope = session.scope().to_string();
    session.teardown_scope(&scope);
    info!(id, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Look the session up, then run `f` on it off the async workers.
async fn with_session<F>(state: &AppState, id: SessionId, f: F) -> ApiResult
where
    F: FnOnce(&Engine, &Collaborators<'_>, &mut Session) -> Result<Outcome, DispatchError>
        + Send
        + 'static,
{
    let session = state
        .session(id)
        .await
        .ok_or_else(|| ApiError::unknown_session(id))?;
    let outcome = state.run_blocking(session, f).await??;
    Ok(Json(outcome_json(&outcome)))
}
