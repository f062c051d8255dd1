use axum::{
    Json, Router,
    extract::{Path, State},
    middleware,
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dao::models::ReviewVerdict,
    dto::common::ActionResponse,
    dto::wallet::{
        ActivityListResponse, ApproveWithdrawalRequest, BalanceResponse, CancelWithdrawalRequest,
        CreateDepositRequest, CreateWithdrawalRequest, DepositListResponse, DepositReviewRequest,
        DepositView, PendingCountsResponse, TransactionListResponse, WithdrawalListResponse,
    },
    error::AppError,
    services::{mutations, queries},
    state::SharedState,
};

/// Wallet reads, deposit and withdrawal filing, and the review queue verbs.
pub fn router() -> Router<SharedState> {
    let review = Router::<SharedState>::new()
        .route("/wallet/pending-counts", get(pending_counts))
        .route("/wallet/deposits/{id}/approve", post(approve_deposit))
        .route("/wallet/deposits/{id}/reject", post(reject_deposit))
        .route("/wallet/withdrawals/{id}/approve", post(approve_withdrawal))
        .route("/wallet/withdrawals/{id}/cancel", post(cancel_withdrawal))
        .route_layer(middleware::from_fn(super::require_privileged_role));

    Router::<SharedState>::new()
        .route("/wallet/{user}/balance", get(balance))
        .route("/wallet/{user}/deposits", get(deposits))
        .route("/wallet/{user}/withdrawals", get(withdrawals))
        .route("/wallet/{user}/transactions", get(transactions))
        .route("/wallet/deposits", post(create_deposit))
        .route("/wallet/withdrawals", post(create_withdrawal))
        .route("/activity/{user}", get(recent_activity))
        .merge(review)
}

/// Wallet balance of one user; a missing balance row reads as zero.
#[utoipa::path(
    get,
    path = "/wallet/{user}/balance",
    tag = "wallet",
    params(("user" = Uuid, Path, description = "Owner of the wallet")),
    responses((status = 200, description = "Current balance", body = BalanceResponse))
)]
pub async fn balance(
    State(state): State<SharedState>,
    Path(user): Path<Uuid>,
) -> Result<Json<BalanceResponse>, AppError> {
    Ok(Json(queries::balance(&state, user).await?))
}

/// Deposit requests of one user, newest first.
#[utoipa::path(
    get,
    path = "/wallet/{user}/deposits",
    tag = "wallet",
    params(("user" = Uuid, Path, description = "Owner of the wallet")),
    responses((status = 200, description = "Deposit history", body = DepositListResponse))
)]
pub async fn deposits(
    State(state): State<SharedState>,
    Path(user): Path<Uuid>,
) -> Result<Json<DepositListResponse>, AppError> {
    Ok(Json(queries::deposits(&state, user).await?))
}

/// Withdrawal requests of one user, newest first.
#[utoipa::path(
    get,
    path = "/wallet/{user}/withdrawals",
    tag = "wallet",
    params(("user" = Uuid, Path, description = "Owner of the wallet")),
    responses((status = 200, description = "Withdrawal history", body = WithdrawalListResponse))
)]
pub async fn withdrawals(
    State(state): State<SharedState>,
    Path(user): Path<Uuid>,
) -> Result<Json<WithdrawalListResponse>, AppError> {
    Ok(Json(queries::withdrawals(&state, user).await?))
}

/// Ledger entries of one user, most recent fifty.
#[utoipa::path(
    get,
    path = "/wallet/{user}/transactions",
    tag = "wallet",
    params(("user" = Uuid, Path, description = "Owner of the wallet")),
    responses((status = 200, description = "Transaction history", body = TransactionListResponse))
)]
pub async fn transactions(
    State(state): State<SharedState>,
    Path(user): Path<Uuid>,
) -> Result<Json<TransactionListResponse>, AppError> {
    Ok(Json(queries::transactions(&state, user).await?))
}

/// Merged recent deposits and withdrawals of one user, newest first.
#[utoipa::path(
    get,
    path = "/activity/{user}",
    tag = "wallet",
    params(("user" = Uuid, Path, description = "Owner of the activity feed")),
    responses((status = 200, description = "Recent activity", body = ActivityListResponse))
)]
pub async fn recent_activity(
    State(state): State<SharedState>,
    Path(user): Path<Uuid>,
) -> Result<Json<ActivityListResponse>, AppError> {
    Ok(Json(queries::recent_activity(&state, user).await?))
}

/// Counts of deposits and withdrawals awaiting review.
#[utoipa::path(
    get,
    path = "/wallet/pending-counts",
    tag = "wallet",
    params(("X-Arena-Role" = String, Header, description = "Declared reviewing role")),
    responses((status = 200, description = "Pending review queue sizes", body = PendingCountsResponse))
)]
pub async fn pending_counts(
    State(state): State<SharedState>,
) -> Result<Json<PendingCountsResponse>, AppError> {
    Ok(Json(queries::pending_counts(&state).await?))
}

/// File a deposit request for review.
#[utoipa::path(
    post,
    path = "/wallet/deposits",
    tag = "wallet",
    request_body = CreateDepositRequest,
    responses((status = 200, description = "Deposit filed", body = DepositView))
)]
pub async fn create_deposit(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateDepositRequest>>,
) -> Result<Json<DepositView>, AppError> {
    Ok(Json(mutations::create_deposit(&state, payload).await?))
}

/// File a withdrawal request against the available balance.
#[utoipa::path(
    post,
    path = "/wallet/withdrawals",
    tag = "wallet",
    request_body = CreateWithdrawalRequest,
    responses(
        (status = 200, description = "Withdrawal filed", body = ActionResponse),
        (status = 409, description = "Amount exceeds the available balance")
    )
)]
pub async fn create_withdrawal(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateWithdrawalRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(mutations::create_withdrawal(&state, payload).await?))
}

/// Approve a pending deposit and credit the wallet.
#[utoipa::path(
    post,
    path = "/wallet/deposits/{id}/approve",
    tag = "wallet",
    params(("X-Arena-Role" = String, Header, description = "Declared reviewing role"),
    ("id" = Uuid, Path, description = "Identifier of the deposit")),
    request_body = DepositReviewRequest,
    responses((status = 200, description = "Deposit approved", body = ActionResponse))
)]
pub async fn approve_deposit(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<DepositReviewRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        mutations::review_deposit(&state, id, ReviewVerdict::Approve, payload).await?,
    ))
}

/// Reject a pending deposit.
#[utoipa::path(
    post,
    path = "/wallet/deposits/{id}/reject",
    tag = "wallet",
    params(("X-Arena-Role" = String, Header, description = "Declared reviewing role"),
    ("id" = Uuid, Path, description = "Identifier of the deposit")),
    request_body = DepositReviewRequest,
    responses((status = 200, description = "Deposit rejected", body = ActionResponse))
)]
pub async fn reject_deposit(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<DepositReviewRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        mutations::review_deposit(&state, id, ReviewVerdict::Reject, payload).await?,
    ))
}

/// Approve a pending withdrawal, recording the payout UTR.
#[utoipa::path(
    post,
    path = "/wallet/withdrawals/{id}/approve",
    tag = "wallet",
    params(("X-Arena-Role" = String, Header, description = "Declared reviewing role"),
    ("id" = Uuid, Path, description = "Identifier of the withdrawal")),
    request_body = ApproveWithdrawalRequest,
    responses((status = 200, description = "Withdrawal approved", body = ActionResponse))
)]
pub async fn approve_withdrawal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<ApproveWithdrawalRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        mutations::approve_withdrawal(&state, id, payload).await?,
    ))
}

/// Cancel a pending withdrawal; the held amount returns to the wallet.
#[utoipa::path(
    post,
    path = "/wallet/withdrawals/{id}/cancel",
    tag = "wallet",
    params(("X-Arena-Role" = String, Header, description = "Declared reviewing role"),
    ("id" = Uuid, Path, description = "Identifier of the withdrawal")),
    request_body = CancelWithdrawalRequest,
    responses((status = 200, description = "Withdrawal cancelled", body = ActionResponse))
)]
pub async fn cancel_withdrawal(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<CancelWithdrawalRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(
        mutations::cancel_withdrawal(&state, id, payload).await?,
    ))
}
