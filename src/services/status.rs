//! Pure derivation of the tournament status consumers actually see.
//!
//! Stored statuses lag reality between reconciliation sweeps, so every read
//! overlays the clock and the winner attribute on the stored value. Nothing
//! here is cached or persisted.

use time::{Duration, OffsetDateTime};

use crate::dao::models::TournamentStatus;
use crate::dto::tournament::TournamentTab;

/// How long a tournament runs after its start before it counts as finished.
pub const COMPLETION_WINDOW: Duration = Duration::minutes(20);

/// Overlay the clock and winner presence on a stored status.
///
/// The rules cascade, so a stored-`upcoming` row whose start lies beyond the
/// completion window derives straight to `completed`; deriving an already
/// derived status is a no-op. `Cancelled` is never reclassified.
pub fn effective_status(
    stored: TournamentStatus,
    start_date: OffsetDateTime,
    winner_present: bool,
    now: OffsetDateTime,
) -> TournamentStatus {
    let started = match stored {
        TournamentStatus::Upcoming if now >= start_date => TournamentStatus::Active,
        other => other,
    };

    match started {
        TournamentStatus::Active
            if winner_present || now - start_date >= COMPLETION_WINDOW =>
        {
            TournamentStatus::Completed
        }
        other => other,
    }
}

/// File a derived status under its UI tab.
///
/// Cancelled tournaments live alongside the finished ones.
pub fn tab_for(status: TournamentStatus) -> TournamentTab {
    match status {
        TournamentStatus::Upcoming => TournamentTab::Upcoming,
        TournamentStatus::Active => TournamentTab::Ongoing,
        TournamentStatus::Completed | TournamentStatus::Cancelled => TournamentTab::Completed,
    }
}
