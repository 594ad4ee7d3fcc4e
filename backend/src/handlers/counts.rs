//! HTTP handlers for physical count sessions

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{CountLine, CountSession};
use crate::services::counts::{
    FinalizeSessionInput, RecordCountInput, SessionWithLines, StartSessionInput,
};
use crate::services::CountService;
use crate::AppState;

/// Start a count session
pub async fn start_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StartSessionInput>,
) -> AppResult<Json<SessionWithLines>> {
    let service = CountService::new(state.db);
    let session = service
        .start_session(current_user.0.store_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(session))
}

/// Get a session with its lines
pub async fn get_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<SessionWithLines>> {
    let service = CountService::new(state.db);
    let session = service
        .get_session(current_user.0.store_id, session_id)
        .await?;
    Ok(Json(session))
}

/// List count sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<CountSession>>> {
    let service = CountService::new(state.db);
    let sessions = service.list_sessions(current_user.0.store_id).await?;
    Ok(Json(sessions))
}

/// Record a counted quantity on a line
pub async fn record_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((session_id, line_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<RecordCountInput>,
) -> AppResult<Json<CountLine>> {
    let service = CountService::new(state.db);
    let line = service
        .record_count(current_user.0.store_id, session_id, line_id, input)
        .await?;
    Ok(Json(line))
}

/// Finalize a session, applying corrective adjustments
pub async fn finalize_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(session_id): Path<Uuid>,
    Json(input): Json<FinalizeSessionInput>,
) -> AppResult<Json<SessionWithLines>> {
    let service = CountService::new(state.db);
    let session = service
        .finalize(
            current_user.0.store_id,
            current_user.0.user_id,
            session_id,
            input,
        )
        .await?;
    Ok(Json(session))
}
