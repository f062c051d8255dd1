//! DTO definitions for the tournament browsing and mutation surface.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{Registration, Tournament, TournamentStatus, WinnerRef},
    dto::{common::CacheMeta, format_timestamp, validation::validate_roster},
};

/// UI tab a tournament is filed under after status derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TournamentTab {
    Ongoing,
    Upcoming,
    Completed,
}

impl TournamentTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentTab::Ongoing => "ongoing",
            TournamentTab::Upcoming => "upcoming",
            TournamentTab::Completed => "completed",
        }
    }
}

/// Projection of a tournament row with the derived status applied.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TournamentView {
    pub id: Uuid,
    pub name: String,
    pub entry_fee: i64,
    pub total_slots: u32,
    pub filled_slots: u32,
    pub slots_remaining: u32,
    pub start_date: String,
    /// Status as stored upstream.
    pub status: TournamentStatus,
    /// Status after the clock and winner overlay; this is what tabs file by.
    pub effective_status: TournamentStatus,
    pub tab: TournamentTab,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<WinnerRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub created_at: String,
}

impl TournamentView {
    /// Shape a row for the wire, filing it under `effective`.
    pub fn shaped(tournament: Tournament, effective: TournamentStatus, tab: TournamentTab) -> Self {
        Self {
            id: tournament.id,
            name: tournament.name,
            entry_fee: tournament.entry_fee,
            total_slots: tournament.total_slots,
            filled_slots: tournament.filled_slots,
            slots_remaining: tournament.total_slots.saturating_sub(tournament.filled_slots),
            start_date: format_timestamp(tournament.start_date),
            status: tournament.status,
            effective_status: effective,
            tab,
            winner: tournament.winner,
            room_id: tournament.room_id,
            created_at: format_timestamp(tournament.created_at),
        }
    }
}

/// Query parameters for the tournament list.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TournamentListQuery {
    /// Restrict the list to one tab; omitted means every tournament.
    pub tab: Option<TournamentTab>,
}

/// Cached tournament list shaped through the status deriver.
#[derive(Debug, Serialize, ToSchema)]
pub struct TournamentListResponse {
    pub tournaments: Vec<TournamentView>,
    pub meta: CacheMeta,
}

/// One tournament with the derived status applied.
#[derive(Debug, Serialize, ToSchema)]
pub struct TournamentDetailResponse {
    pub tournament: TournamentView,
    pub meta: CacheMeta,
}

/// Public projection of one claimed slot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SlotView {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub user_id: Uuid,
    pub slot_number: u32,
    pub in_game_name: String,
    /// Always a list; empty means a solo entry.
    pub team_roster: Vec<String>,
    pub registered_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prize_amount: Option<i64>,
}

impl From<Registration> for SlotView {
    fn from(registration: Registration) -> Self {
        Self {
            id: registration.id,
            tournament_id: registration.tournament_id,
            user_id: registration.user_id,
            slot_number: registration.slot_number,
            in_game_name: registration.in_game_name,
            team_roster: registration.team_roster,
            registered_at: format_timestamp(registration.registered_at),
            rank: registration.rank,
            prize_amount: registration.prize_amount,
        }
    }
}

/// Slot list of one tournament.
#[derive(Debug, Serialize, ToSchema)]
pub struct SlotListResponse {
    pub slots: Vec<SlotView>,
    pub meta: CacheMeta,
}

/// Query parameters for the urgent-alerts selection.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AlertsQuery {
    /// Exclude tournaments this user already registered for.
    pub user_id: Option<Uuid>,
}

/// One tournament needing attention soon.
#[derive(Debug, Serialize, ToSchema)]
pub struct UrgentAlert {
    pub tournament_id: Uuid,
    pub name: String,
    pub start_date: String,
    pub starts_in_minutes: i64,
    pub slots_remaining: u32,
    pub entry_fee: i64,
}

/// Urgent tournaments: starting soon or nearly full.
#[derive(Debug, Serialize, ToSchema)]
pub struct AlertListResponse {
    pub alerts: Vec<UrgentAlert>,
    pub meta: CacheMeta,
}

/// Payload claiming a slot in a tournament.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 50))]
    pub in_game_name: String,
    /// Teammates named alongside the registrant, at most three.
    #[serde(default)]
    #[validate(custom(function = "validate_roster"))]
    pub team_roster: Vec<String>,
}

/// Acknowledged registration.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_number: Option<u32>,
    /// Balance after the entry fee deduction, when the backend reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    pub message: String,
}

/// One result row posted for a tournament slot.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct ResultEntry {
    pub user_id: Uuid,
    #[validate(range(min = 1))]
    pub rank: u32,
    pub kills: u32,
    #[validate(range(min = 0))]
    pub prize_amount: i64,
}

/// Full replacement of a tournament's posted results.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PostResultsRequest {
    #[validate(length(min = 1), nested)]
    pub results: Vec<ResultEntry>,
}

/// Privileged prize distribution trigger.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DistributePrizesRequest {
    pub admin_id: Uuid,
}

/// Outcome of a prize distribution.
#[derive(Debug, Serialize, ToSchema)]
pub struct DistributePrizesResponse {
    pub total_distributed: i64,
    pub message: String,
}

/// Privileged tournament removal trigger.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteTournamentRequest {
    pub deleted_by: Uuid,
}

/// Outcome of a tournament removal, including refunds issued upstream.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteTournamentResponse {
    pub message: String,
    pub refunds_issued: u32,
}
