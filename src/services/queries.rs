//! Read-side service: every GET goes through the snapshot cache and comes
//! back shaped, with freshness metadata attached.

use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    dao::models::{
        ActivityEntry, Balance, Deposit, PendingCounts, Registration, Team, Tournament,
        TournamentStatus, TransactionRecord, Withdrawal,
    },
    dto::{
        common::CacheMeta,
        team::{TeamDetailResponse, TeamListResponse, TeamView},
        tournament::{
            AlertListResponse, SlotListResponse, TournamentDetailResponse, TournamentListResponse,
            TournamentTab, TournamentView, UrgentAlert,
        },
        wallet::{
            ActivityListResponse, BalanceResponse, DepositListResponse, PendingCountsResponse,
            TransactionListResponse, WithdrawalListResponse,
        },
    },
    error::ServiceError,
    state::{SharedState, key::QueryKey},
};

use super::status;

/// How close a start has to be before the tournament counts as urgent.
const URGENT_START_WINDOW: time::Duration = time::Duration::minutes(120);
/// At or below this many open slots a tournament counts as urgent.
const URGENT_SLOT_FLOOR: u32 = 5;

/// Serve `key` from the cache and decode the snapshot.
async fn cached<T: DeserializeOwned>(
    state: &SharedState,
    key: QueryKey,
) -> Result<(T, CacheMeta), ServiceError> {
    let value = state.cache().fetch(&key).await?;
    let meta = CacheMeta::from(&value);
    let decoded = serde_json::from_value(value.data)
        .map_err(|err| ServiceError::Internal(format!("undecodable snapshot for {key}: {err}")))?;
    Ok((decoded, meta))
}

fn shape_tournament(row: Tournament, now: OffsetDateTime) -> TournamentView {
    let effective = status::effective_status(row.status, row.start_date, row.winner_present(), now);
    TournamentView::shaped(row, effective, status::tab_for(effective))
}

/// Tournament list run through the status deriver, optionally one tab only.
pub async fn tournament_list(
    state: &SharedState,
    tab: Option<TournamentTab>,
) -> Result<TournamentListResponse, ServiceError> {
    let (rows, meta): (Vec<Tournament>, _) = cached(state, QueryKey::Tournaments).await?;
    let now = OffsetDateTime::now_utc();
    let tournaments = rows
        .into_iter()
        .map(|row| shape_tournament(row, now))
        .filter(|view| tab.is_none_or(|wanted| view.tab == wanted))
        .collect();
    Ok(TournamentListResponse { tournaments, meta })
}

/// One tournament with the derived status applied.
pub async fn tournament_detail(
    state: &SharedState,
    tournament_id: Uuid,
) -> Result<TournamentDetailResponse, ServiceError> {
    let (row, meta): (Option<Tournament>, _) =
        cached(state, QueryKey::TournamentDetail { tournament_id }).await?;
    let row = row.ok_or_else(|| ServiceError::NotFound(format!("no tournament {tournament_id}")))?;
    Ok(TournamentDetailResponse {
        tournament: shape_tournament(row, OffsetDateTime::now_utc()),
        meta,
    })
}

/// Claimed slots of one tournament.
pub async fn tournament_slots(
    state: &SharedState,
    tournament_id: Uuid,
) -> Result<SlotListResponse, ServiceError> {
    let (rows, meta): (Vec<Registration>, _) =
        cached(state, QueryKey::TournamentRegistrations { tournament_id }).await?;
    Ok(SlotListResponse {
        slots: rows.into_iter().map(Into::into).collect(),
        meta,
    })
}

/// Upcoming tournaments that start soon or are nearly full, soonest first.
///
/// When a user is named, tournaments they already registered for drop out.
pub async fn urgent_alerts(
    state: &SharedState,
    user_id: Option<Uuid>,
) -> Result<AlertListResponse, ServiceError> {
    let (rows, meta): (Vec<Tournament>, _) = cached(state, QueryKey::Tournaments).await?;
    let registered: Vec<Uuid> = match user_id {
        Some(user_id) => {
            let (regs, _): (Vec<Registration>, _) =
                cached(state, QueryKey::UserRegistrations { user_id }).await?;
            regs.into_iter().map(|reg| reg.tournament_id).collect()
        }
        None => Vec::new(),
    };

    let now = OffsetDateTime::now_utc();
    let mut alerts: Vec<UrgentAlert> = rows
        .into_iter()
        .filter_map(|row| {
            let effective =
                status::effective_status(row.status, row.start_date, row.winner_present(), now);
            if effective != TournamentStatus::Upcoming || registered.contains(&row.id) {
                return None;
            }
            let open = row.slots_remaining();
            let starts_in = row.start_date - now;
            let urgent = starts_in <= URGENT_START_WINDOW || open <= URGENT_SLOT_FLOOR;
            if open == 0 || !urgent {
                return None;
            }
            Some(UrgentAlert {
                tournament_id: row.id,
                name: row.name,
                start_date: crate::dto::format_timestamp(row.start_date),
                starts_in_minutes: starts_in.whole_minutes(),
                slots_remaining: open,
                entry_fee: row.entry_fee,
            })
        })
        .collect();
    alerts.sort_by_key(|alert| alert.starts_in_minutes);
    Ok(AlertListResponse { alerts, meta })
}

/// Wallet balance of one user; a user without a balance row reads as zero.
pub async fn balance(state: &SharedState, user_id: Uuid) -> Result<BalanceResponse, ServiceError> {
    let (row, meta): (Option<Balance>, _) = cached(state, QueryKey::Balance { user_id }).await?;
    Ok(BalanceResponse::shaped(user_id, row, meta))
}

/// Deposit requests of one user.
pub async fn deposits(
    state: &SharedState,
    user_id: Uuid,
) -> Result<DepositListResponse, ServiceError> {
    let (rows, meta): (Vec<Deposit>, _) = cached(state, QueryKey::Deposits { user_id }).await?;
    Ok(DepositListResponse {
        deposits: rows.into_iter().map(Into::into).collect(),
        meta,
    })
}

/// Withdrawal requests of one user.
pub async fn withdrawals(
    state: &SharedState,
    user_id: Uuid,
) -> Result<WithdrawalListResponse, ServiceError> {
    let (rows, meta): (Vec<Withdrawal>, _) =
        cached(state, QueryKey::Withdrawals { user_id }).await?;
    Ok(WithdrawalListResponse {
        withdrawals: rows.into_iter().map(Into::into).collect(),
        meta,
    })
}

/// Ledger of one user, newest first.
pub async fn transactions(
    state: &SharedState,
    user_id: Uuid,
) -> Result<TransactionListResponse, ServiceError> {
    let (rows, meta): (Vec<TransactionRecord>, _) =
        cached(state, QueryKey::Transactions { user_id }).await?;
    Ok(TransactionListResponse {
        transactions: rows.into_iter().map(Into::into).collect(),
        meta,
    })
}

/// Merged payment and tournament activity of one user.
pub async fn recent_activity(
    state: &SharedState,
    user_id: Uuid,
) -> Result<ActivityListResponse, ServiceError> {
    let (rows, meta): (Vec<ActivityEntry>, _) =
        cached(state, QueryKey::RecentActivity { user_id }).await?;
    Ok(ActivityListResponse {
        activities: rows.into_iter().map(Into::into).collect(),
        meta,
    })
}

/// Review-queue counts for privileged dashboards.
pub async fn pending_counts(state: &SharedState) -> Result<PendingCountsResponse, ServiceError> {
    let (counts, meta): (PendingCounts, _) = cached(state, QueryKey::PendingCounts).await?;
    Ok(PendingCountsResponse {
        pending_deposits: counts.pending_deposits,
        pending_withdrawals: counts.pending_withdrawals,
        total: counts.total,
        meta,
    })
}

/// Every active team.
pub async fn teams(state: &SharedState) -> Result<TeamListResponse, ServiceError> {
    let (rows, meta): (Vec<Team>, _) = cached(state, QueryKey::Teams).await?;
    Ok(TeamListResponse {
        teams: rows.into_iter().map(TeamView::from).collect(),
        meta,
    })
}

/// One team with its members embedded.
pub async fn team_detail(
    state: &SharedState,
    team_id: Uuid,
) -> Result<TeamDetailResponse, ServiceError> {
    let (row, meta): (Option<Team>, _) = cached(state, QueryKey::TeamDetail { team_id }).await?;
    let row = row.ok_or_else(|| ServiceError::NotFound(format!("no team {team_id}")))?;
    Ok(TeamDetailResponse {
        team: TeamView::from(row),
        meta,
    })
}
