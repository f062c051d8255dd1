use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the arena sync gateway.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::tournaments::list_tournaments,
        crate::routes::tournaments::urgent_alerts,
        crate::routes::tournaments::tournament_detail,
        crate::routes::tournaments::tournament_slots,
        crate::routes::tournaments::register,
        crate::routes::tournaments::post_results,
        crate::routes::tournaments::distribute_prizes,
        crate::routes::tournaments::delete_tournament,
        crate::routes::wallet::balance,
        crate::routes::wallet::deposits,
        crate::routes::wallet::withdrawals,
        crate::routes::wallet::transactions,
        crate::routes::wallet::recent_activity,
        crate::routes::wallet::pending_counts,
        crate::routes::wallet::create_deposit,
        crate::routes::wallet::create_withdrawal,
        crate::routes::wallet::approve_deposit,
        crate::routes::wallet::reject_deposit,
        crate::routes::wallet::approve_withdrawal,
        crate::routes::wallet::cancel_withdrawal,
        crate::routes::teams::list_teams,
        crate::routes::teams::team_detail,
        crate::routes::teams::create_team,
        crate::routes::teams::join_team,
        crate::routes::teams::leave_team,
        crate::routes::teams::update_team,
        crate::routes::teams::transfer_captaincy,
        crate::routes::teams::deactivate_team,
        crate::routes::events::events_stream,
        crate::routes::events::change_tab,
        crate::routes::events::change_focus,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::ListenerHealth,
            crate::dto::common::ActionResponse,
            crate::dto::common::CacheMeta,
            crate::dto::tournament::TournamentTab,
            crate::dto::tournament::TournamentView,
            crate::dto::tournament::TournamentListResponse,
            crate::dto::tournament::TournamentDetailResponse,
            crate::dto::tournament::SlotView,
            crate::dto::tournament::SlotListResponse,
            crate::dto::tournament::UrgentAlert,
            crate::dto::tournament::AlertListResponse,
            crate::dto::tournament::RegisterRequest,
            crate::dto::tournament::RegisterResponse,
            crate::dto::tournament::ResultEntry,
            crate::dto::tournament::PostResultsRequest,
            crate::dto::tournament::DistributePrizesRequest,
            crate::dto::tournament::DistributePrizesResponse,
            crate::dto::tournament::DeleteTournamentRequest,
            crate::dto::tournament::DeleteTournamentResponse,
            crate::dto::wallet::BalanceResponse,
            crate::dto::wallet::DepositView,
            crate::dto::wallet::DepositListResponse,
            crate::dto::wallet::WithdrawalView,
            crate::dto::wallet::WithdrawalListResponse,
            crate::dto::wallet::TransactionView,
            crate::dto::wallet::TransactionListResponse,
            crate::dto::wallet::PendingCountsResponse,
            crate::dto::wallet::ActivityView,
            crate::dto::wallet::ActivityListResponse,
            crate::dto::wallet::CreateDepositRequest,
            crate::dto::wallet::CreateWithdrawalRequest,
            crate::dto::wallet::DepositReviewRequest,
            crate::dto::wallet::ApproveWithdrawalRequest,
            crate::dto::wallet::CancelWithdrawalRequest,
            crate::dto::team::TeamMemberView,
            crate::dto::team::TeamView,
            crate::dto::team::TeamListResponse,
            crate::dto::team::TeamDetailResponse,
            crate::dto::team::CreateTeamRequest,
            crate::dto::team::JoinTeamRequest,
            crate::dto::team::LeaveTeamRequest,
            crate::dto::team::UpdateTeamRequest,
            crate::dto::team::TransferCaptaincyRequest,
            crate::dto::sse::SessionRole,
            crate::dto::sse::Handshake,
            crate::dto::sse::QueryUpdate,
            crate::dto::sse::DepositNotice,
            crate::dto::sse::WithdrawalNotice,
            crate::dto::sse::TabNudge,
            crate::dto::sse::TabChangeRequest,
            crate::dto::sse::FocusChangeRequest,
            crate::dao::models::TournamentStatus,
            crate::dao::models::WinnerRef,
            crate::dao::models::DepositStatus,
            crate::dao::models::WithdrawalStatus,
            crate::dao::models::TransactionKind,
            crate::dao::models::ActivityKind,
            crate::dao::models::TeamRole,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "tournaments", description = "Tournament browsing, registration and lifecycle"),
        (name = "wallet", description = "Balances, deposits, withdrawals and the review queue"),
        (name = "teams", description = "Team rosters and membership"),
        (name = "events", description = "Server-sent view sessions"),
    )
)]
pub struct ApiDoc;
