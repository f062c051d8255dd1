use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::sse::Sse,
    routing::{get, put},
};
use futures::Stream;
use uuid::Uuid;

use crate::{
    dto::common::ActionResponse,
    dto::sse::{FocusChangeRequest, SessionQuery, TabChangeRequest},
    error::AppError,
    services::sse_service,
    state::SharedState,
};

/// The live view-session endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/events", get(events_stream))
        .route("/events/{session}/tab", put(change_tab))
        .route("/events/{session}/focus", put(change_focus))
}

#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    params(SessionQuery),
    responses((status = 200, description = "View session stream", content_type = "text/event-stream", body = String))
)]
/// Open a view session: handshake first, then query snapshots, notices and
/// tab nudges until the client disconnects.
pub async fn events_stream(
    State(state): State<SharedState>,
    Query(query): Query<SessionQuery>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let (_session_id, receiver) = sse_service::open_session(&state, query);
    sse_service::into_sse_response(receiver)
}

#[utoipa::path(
    put,
    path = "/events/{session}/tab",
    tag = "events",
    params(("session" = Uuid, Path, description = "Identifier from the session handshake")),
    request_body = TabChangeRequest,
    responses((status = 200, description = "Tab recorded", body = ActionResponse))
)]
/// Record a manual tab change so later nudges respect it.
pub async fn change_tab(
    State(state): State<SharedState>,
    Path(session): Path<Uuid>,
    Json(payload): Json<TabChangeRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(sse_service::set_tab(&state, session, payload.tab)?))
}

#[utoipa::path(
    put,
    path = "/events/{session}/focus",
    tag = "events",
    params(("session" = Uuid, Path, description = "Identifier from the session handshake")),
    request_body = FocusChangeRequest,
    responses((status = 200, description = "Visibility recorded", body = ActionResponse))
)]
/// Report a visibility change; regaining focus refreshes the keys that ask
/// for it.
pub async fn change_focus(
    State(state): State<SharedState>,
    Path(session): Path<Uuid>,
    Json(payload): Json<FocusChangeRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(sse_service::set_focus(
        &state,
        session,
        payload.focused,
    )?))
}
