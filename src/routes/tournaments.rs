use axum::{
    Json, Router,
    extract::{Path, Query, State},
    middleware,
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::tournament::{
        AlertListResponse, AlertsQuery, DeleteTournamentRequest, DeleteTournamentResponse,
        DistributePrizesRequest, DistributePrizesResponse, PostResultsRequest, RegisterRequest,
        RegisterResponse, SlotListResponse, TournamentDetailResponse, TournamentListQuery,
        TournamentListResponse,
    },
    dto::common::ActionResponse,
    error::AppError,
    services::{mutations, queries},
    state::SharedState,
};

/// Tournament browsing and registration, plus the privileged lifecycle verbs.
pub fn router() -> Router<SharedState> {
    let review = Router::<SharedState>::new()
        .route("/tournaments/{id}/results", post(post_results))
        .route(
            "/tournaments/{id}/distribute-prizes",
            post(distribute_prizes),
        )
        .route("/tournaments/{id}", delete(delete_tournament))
        .route_layer(middleware::from_fn(super::require_privileged_role));

    Router::<SharedState>::new()
        .route("/tournaments", get(list_tournaments))
        .route("/tournaments/alerts", get(urgent_alerts))
        .route("/tournaments/{id}", get(tournament_detail))
        .route("/tournaments/{id}/slots", get(tournament_slots))
        .route("/tournaments/{id}/register", post(register))
        .merge(review)
}

/// List tournaments shaped through the status deriver, optionally one tab.
#[utoipa::path(
    get,
    path = "/tournaments",
    tag = "tournaments",
    params(TournamentListQuery),
    responses((status = 200, description = "Cached tournament list", body = TournamentListResponse))
)]
pub async fn list_tournaments(
    State(state): State<SharedState>,
    Query(query): Query<TournamentListQuery>,
) -> Result<Json<TournamentListResponse>, AppError> {
    Ok(Json(queries::tournament_list(&state, query.tab).await?))
}

/// Upcoming tournaments that start soon or are nearly full.
#[utoipa::path(
    get,
    path = "/tournaments/alerts",
    tag = "tournaments",
    params(AlertsQuery),
    responses((status = 200, description = "Urgent tournaments, soonest first", body = AlertListResponse))
)]
pub async fn urgent_alerts(
    State(state): State<SharedState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<AlertListResponse>, AppError> {
    Ok(Json(queries::urgent_alerts(&state, query.user_id).await?))
}

/// Retrieve one tournament with its derived status.
#[utoipa::path(
    get,
    path = "/tournaments/{id}",
    tag = "tournaments",
    params(("id" = Uuid, Path, description = "Identifier of the tournament")),
    responses((status = 200, description = "Tournament detail", body = TournamentDetailResponse))
)]
pub async fn tournament_detail(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TournamentDetailResponse>, AppError> {
    Ok(Json(queries::tournament_detail(&state, id).await?))
}

/// Claimed slots of one tournament, rosters normalized.
#[utoipa::path(
    get,
    path = "/tournaments/{id}/slots",
    tag = "tournaments",
    params(("id" = Uuid, Path, description = "Identifier of the tournament")),
    responses((status = 200, description = "Slot list", body = SlotListResponse))
)]
pub async fn tournament_slots(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlotListResponse>, AppError> {
    Ok(Json(queries::tournament_slots(&state, id).await?))
}

/// Claim a slot in an upcoming tournament.
#[utoipa::path(
    post,
    path = "/tournaments/{id}/register",
    tag = "tournaments",
    params(("id" = Uuid, Path, description = "Identifier of the tournament")),
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Slot claimed", body = RegisterResponse),
        (status = 409, description = "Registration window closed or slot taken"),
        (status = 422, description = "The data service refused the registration")
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<RegisterRequest>>,
) -> Result<Json<RegisterResponse>, AppError> {
    Ok(Json(
        mutations::register_for_tournament(&state, id, payload).await?,
    ))
}

/// Replace the posted results of a tournament.
#[utoipa::path(
    post,
    path = "/tournaments/{id}/results",
    tag = "tournaments",
    params(("X-Arena-Role" = String, Header, description = "Declared reviewing role"),
    ("id" = Uuid, Path, description = "Identifier of the tournament")),
    request_body = PostResultsRequest,
    responses((status = 200, description = "Results recorded", body = ActionResponse))
)]
pub async fn post_results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<PostResultsRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(mutations::post_results(&state, id, payload).await?))
}

/// Credit prize money to the ranked players of a tournament.
#[utoipa::path(
    post,
    path = "/tournaments/{id}/distribute-prizes",
    tag = "tournaments",
    params(("X-Arena-Role" = String, Header, description = "Declared reviewing role"),
    ("id" = Uuid, Path, description = "Identifier of the tournament")),
    request_body = DistributePrizesRequest,
    responses((status = 200, description = "Prizes credited", body = DistributePrizesResponse))
)]
pub async fn distribute_prizes(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DistributePrizesRequest>,
) -> Result<Json<DistributePrizesResponse>, AppError> {
    Ok(Json(
        mutations::distribute_prizes(&state, id, payload).await?,
    ))
}

/// Remove a tournament and refund every entry fee.
#[utoipa::path(
    delete,
    path = "/tournaments/{id}",
    tag = "tournaments",
    params(("X-Arena-Role" = String, Header, description = "Declared reviewing role"),
    ("id" = Uuid, Path, description = "Identifier of the tournament")),
    request_body = DeleteTournamentRequest,
    responses((status = 200, description = "Tournament removed, refunds issued", body = DeleteTournamentResponse))
)]
pub async fn delete_tournament(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DeleteTournamentRequest>,
) -> Result<Json<DeleteTournamentResponse>, AppError> {
    Ok(Json(
        mutations::delete_tournament(&state, id, payload).await?,
    ))
}
