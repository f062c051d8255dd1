//! Backend access traits for the remote arena data service.
//!
//! [`ArenaBackend`] is the request/response side (REST tables and stored
//! procedures) and [`ChangeFeed`] is the push side (row-change
//! subscriptions). Both are object safe so the service layer can run
//! against the real HTTP implementation or an in-memory double.

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::dao::models::{
    ActivityEntry, Balance, ChangeEvent, Deposit, DepositDecision, FeedGroup, NewDeposit,
    NewResult, NewTeam, NewTeamMember, PendingCounts, PrizeDistribution, PrizeOutcome,
    Registration, RegistrationCall, RegistrationOutcome, Team, TeamRole, TeamUpdate, Tournament,
    TournamentDeletion, TournamentDeletionOutcome, TournamentStatus, TransactionRecord,
    Withdrawal, WithdrawalCall, WithdrawalSettlement,
};

/// Convenient alias for backend call results.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors produced while talking to the remote data service.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP client could not be constructed.
    #[error("failed to build backend HTTP client: {source}")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// The request never completed (connection refused, timeout, ...).
    #[error("request to backend path '{path}' failed: {source}")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with an unexpected HTTP status.
    #[error("backend path '{path}' answered with unexpected status {status}")]
    RequestStatus {
        path: String,
        status: reqwest::StatusCode,
    },
    /// The response body could not be read or decoded.
    #[error("failed to decode backend response from '{path}': {source}")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A JSON payload did not match the expected row shape.
    #[error("failed to deserialize backend payload: {source}")]
    DeserializeValue {
        #[source]
        source: serde_json::Error,
    },
    /// A count request came back without the expected count header.
    #[error("backend path '{path}' returned no row count")]
    MissingCount { path: String },
    /// The backend executed the call and refused it. The message is the
    /// backend's own wording and is surfaced to callers unchanged.
    #[error("{message}")]
    Rejected { message: String },
    /// The backend is temporarily unreachable.
    #[error("backend unavailable: {message}")]
    Unavailable { message: String },
    /// The change feed connection failed or was torn down.
    #[error("change feed failure: {message}")]
    Feed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl BackendError {
    /// Feed failure wrapping an underlying transport error.
    pub fn feed(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Feed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Feed failure without an underlying error, e.g. a clean remote close.
    pub fn feed_closed(message: impl Into<String>) -> Self {
        Self::Feed {
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying the same call later can reasonably succeed.
    ///
    /// Rejections and malformed payloads are final; transport failures and
    /// server-side hiccups are not.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::RequestSend { .. }
            | BackendError::Unavailable { .. }
            | BackendError::Feed { .. } => true,
            BackendError::RequestStatus { status, .. } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            BackendError::ClientBuilder { .. }
            | BackendError::DecodeResponse { .. }
            | BackendError::DeserializeValue { .. }
            | BackendError::MissingCount { .. }
            | BackendError::Rejected { .. } => false,
        }
    }
}

/// Request/response access to the arena data service.
///
/// Every call is owned (`BoxFuture<'static, _>`) so implementations can be
/// shared behind an `Arc` and polled from spawned tasks.
pub trait ArenaBackend: Send + Sync {
    /// List tournaments, optionally filtered by stored status, newest first.
    fn list_tournaments(
        &self,
        status: Option<TournamentStatus>,
    ) -> BoxFuture<'static, BackendResult<Vec<Tournament>>>;

    /// Fetch one tournament by id.
    fn fetch_tournament(&self, id: Uuid)
    -> BoxFuture<'static, BackendResult<Option<Tournament>>>;

    /// Overwrite the stored status of a tournament.
    fn update_tournament_status(
        &self,
        id: Uuid,
        status: TournamentStatus,
    ) -> BoxFuture<'static, BackendResult<()>>;

    /// List every registration of one tournament, by slot order.
    fn list_registrations(
        &self,
        tournament_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<Registration>>>;

    /// List every registration of one user, newest first.
    fn list_user_registrations(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<Registration>>>;

    /// Fetch the wallet balance of one user.
    fn fetch_balance(&self, user_id: Uuid) -> BoxFuture<'static, BackendResult<Option<Balance>>>;

    /// List deposit requests of one user, newest first.
    fn list_deposits(&self, user_id: Uuid) -> BoxFuture<'static, BackendResult<Vec<Deposit>>>;

    /// List withdrawal requests of one user, newest first.
    fn list_withdrawals(&self, user_id: Uuid)
    -> BoxFuture<'static, BackendResult<Vec<Withdrawal>>>;

    /// List ledger entries of one user, newest first, capped at `limit`.
    fn list_transactions(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, BackendResult<Vec<TransactionRecord>>>;

    /// Recent activity of one user, merged and capped for the dashboard.
    fn recent_activity(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<Vec<ActivityEntry>>>;

    /// Exact counts of deposits and withdrawals awaiting review.
    fn count_pending(&self) -> BoxFuture<'static, BackendResult<PendingCounts>>;

    /// List active teams with members embedded.
    fn list_teams(&self) -> BoxFuture<'static, BackendResult<Vec<Team>>>;

    /// Fetch one team with members embedded.
    fn fetch_team(&self, id: Uuid) -> BoxFuture<'static, BackendResult<Option<Team>>>;

    /// Claim a slot atomically: checks the balance, deducts the fee, fills
    /// the next slot and writes the ledger entry in one procedure call.
    fn register_for_tournament(
        &self,
        call: RegistrationCall,
    ) -> BoxFuture<'static, BackendResult<RegistrationOutcome>>;

    /// Insert a deposit request pending review.
    fn insert_deposit(&self, deposit: NewDeposit) -> BoxFuture<'static, BackendResult<Deposit>>;

    /// Insert a withdrawal request pending settlement.
    fn create_withdrawal(&self, call: WithdrawalCall) -> BoxFuture<'static, BackendResult<()>>;

    /// Approve or reject a pending deposit.
    fn decide_deposit(&self, decision: DepositDecision)
    -> BoxFuture<'static, BackendResult<()>>;

    /// Approve or cancel a pending withdrawal.
    fn settle_withdrawal(
        &self,
        settlement: WithdrawalSettlement,
    ) -> BoxFuture<'static, BackendResult<()>>;

    /// Delete a tournament and refund every registered entry fee.
    fn delete_tournament(
        &self,
        deletion: TournamentDeletion,
    ) -> BoxFuture<'static, BackendResult<TournamentDeletionOutcome>>;

    /// Replace the posted results of a tournament.
    fn replace_results(
        &self,
        tournament_id: Uuid,
        results: Vec<NewResult>,
    ) -> BoxFuture<'static, BackendResult<()>>;

    /// Credit prizes for posted results in one procedure call.
    fn distribute_prizes(
        &self,
        distribution: PrizeDistribution,
    ) -> BoxFuture<'static, BackendResult<PrizeOutcome>>;

    /// Create a team row. The captain membership is a separate insert.
    fn insert_team(&self, team: NewTeam) -> BoxFuture<'static, BackendResult<Team>>;

    /// Add a member to a team.
    fn insert_team_member(&self, member: NewTeamMember)
    -> BoxFuture<'static, BackendResult<()>>;

    /// Remove a member from a team.
    fn delete_team_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<()>>;

    /// Change the role of a team member.
    fn update_member_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> BoxFuture<'static, BackendResult<()>>;

    /// Transfer the captain seat to another member.
    fn set_team_captain(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, BackendResult<()>>;

    /// Update team metadata.
    fn update_team(
        &self,
        team_id: Uuid,
        update: TeamUpdate,
    ) -> BoxFuture<'static, BackendResult<()>>;

    /// Soft-delete a team by clearing its active flag.
    fn deactivate_team(&self, team_id: Uuid) -> BoxFuture<'static, BackendResult<()>>;
}

/// Push-side access: row-change subscriptions.
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription covering the tables of `group`.
    ///
    /// Resolves once the connection is established and the subscribe frames
    /// are on the wire. Events then arrive on the returned subscription
    /// until the connection drops, which is reported as a closed channel.
    fn subscribe(&self, group: FeedGroup)
    -> BoxFuture<'static, BackendResult<FeedSubscription>>;
}

/// Live change-feed subscription.
///
/// Dropping the subscription aborts the reader task behind it, so holders
/// never leak a connection.
pub struct FeedSubscription {
    events: mpsc::Receiver<ChangeEvent>,
    guard: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    pub fn new(events: mpsc::Receiver<ChangeEvent>, guard: Option<JoinHandle<()>>) -> Self {
        Self { events, guard }
    }

    /// Next change event, or `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            guard.abort();
        }
    }
}
