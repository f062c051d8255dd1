use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::common::ActionResponse,
    dto::team::{
        CreateTeamRequest, JoinTeamRequest, LeaveTeamRequest, TeamDetailResponse,
        TeamListResponse, TeamView, TransferCaptaincyRequest, UpdateTeamRequest,
    },
    error::AppError,
    services::{mutations, queries},
    state::SharedState,
};

/// Team browsing and roster management.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/teams", get(list_teams).post(create_team))
        .route(
            "/teams/{id}",
            get(team_detail).put(update_team).delete(deactivate_team),
        )
        .route("/teams/{id}/join", post(join_team))
        .route("/teams/{id}/leave", post(leave_team))
        .route("/teams/{id}/transfer-captaincy", post(transfer_captaincy))
}

/// List every team with its roster.
#[utoipa::path(
    get,
    path = "/teams",
    tag = "teams",
    responses((status = 200, description = "Team list", body = TeamListResponse))
)]
pub async fn list_teams(
    State(state): State<SharedState>,
) -> Result<Json<TeamListResponse>, AppError> {
    Ok(Json(queries::teams(&state).await?))
}

/// Retrieve one team and its members.
#[utoipa::path(
    get,
    path = "/teams/{id}",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Identifier of the team")),
    responses((status = 200, description = "Team detail", body = TeamDetailResponse))
)]
pub async fn team_detail(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TeamDetailResponse>, AppError> {
    Ok(Json(queries::team_detail(&state, id).await?))
}

/// Create a team; the creator takes the captain seat.
#[utoipa::path(
    post,
    path = "/teams",
    tag = "teams",
    request_body = CreateTeamRequest,
    responses((status = 200, description = "Team created", body = TeamView))
)]
pub async fn create_team(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateTeamRequest>>,
) -> Result<Json<TeamView>, AppError> {
    Ok(Json(mutations::create_team(&state, payload).await?))
}

/// Join an active team with an open slot.
#[utoipa::path(
    post,
    path = "/teams/{id}/join",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Identifier of the team")),
    request_body = JoinTeamRequest,
    responses(
        (status = 200, description = "Seat taken", body = ActionResponse),
        (status = 409, description = "Team full, disbanded, or user already seated")
    )
)]
pub async fn join_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<JoinTeamRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(mutations::join_team(&state, id, payload).await?))
}

/// Leave a team. The captain must hand the seat over first.
#[utoipa::path(
    post,
    path = "/teams/{id}/leave",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Identifier of the team")),
    request_body = LeaveTeamRequest,
    responses((status = 200, description = "Seat released", body = ActionResponse))
)]
pub async fn leave_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeaveTeamRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(mutations::leave_team(&state, id, payload).await?))
}

/// Update team metadata; absent fields stay untouched.
#[utoipa::path(
    put,
    path = "/teams/{id}",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Identifier of the team")),
    request_body = UpdateTeamRequest,
    responses((status = 200, description = "Team updated", body = TeamView))
)]
pub async fn update_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateTeamRequest>>,
) -> Result<Json<TeamView>, AppError> {
    Ok(Json(mutations::update_team(&state, id, payload).await?))
}

/// Hand the captain seat to another member.
#[utoipa::path(
    post,
    path = "/teams/{id}/transfer-captaincy",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Identifier of the team")),
    request_body = TransferCaptaincyRequest,
    responses((status = 200, description = "Captaincy transferred", body = ActionResponse))
)]
pub async fn transfer_captaincy(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransferCaptaincyRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        mutations::transfer_captaincy(&state, id, payload).await?,
    ))
}

/// Disband a team; the roster stays readable but inactive.
#[utoipa::path(
    delete,
    path = "/teams/{id}",
    tag = "teams",
    params(("id" = Uuid, Path, description = "Identifier of the team")),
    responses((status = 200, description = "Team deactivated", body = ActionResponse))
)]
pub async fn deactivate_team(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(mutations::deactivate_team(&state, id).await?))
}
