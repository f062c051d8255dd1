//! Scheduled sweep that writes derived statuses back to the data service.
//!
//! Reads always overlay the clock on stored statuses, so the sweep is not
//! load-bearing for what users see. It exists so stored rows, and every
//! other consumer of them, eventually agree with the derivation.

use std::sync::Arc;

use futures::future::join_all;
use time::OffsetDateTime;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{Tournament, TournamentStatus},
    error::ServiceError,
    services::status::COMPLETION_WINDOW,
    state::{SharedState, key::QueryKey},
};

/// Tally of one reconciliation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Upcoming rows whose start passed and were marked active.
    pub activated: usize,
    /// Active rows past the window or with a winner, marked completed.
    pub completed: usize,
    /// Corrections that failed; the next sweep retries them.
    pub failed_writes: usize,
}

impl SweepOutcome {
    fn corrected(&self) -> usize {
        self.activated + self.completed
    }
}

/// Run [`sweep`] immediately and then on a fixed period, forever.
pub async fn run_reconciler(state: SharedState) {
    let period = state.tuning().reconciler_period;
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_secs = period.as_secs(), "lifecycle reconciler running");
    loop {
        ticker.tick().await;
        match sweep(&state).await {
            Ok(outcome) if outcome.corrected() > 0 || outcome.failed_writes > 0 => {
                info!(
                    activated = outcome.activated,
                    completed = outcome.completed,
                    failed = outcome.failed_writes,
                    "reconciliation sweep corrected stored statuses"
                );
            }
            Ok(_) => debug!("reconciliation sweep found nothing to correct"),
            Err(err) => warn!(error = %err, "reconciliation sweep failed"),
        }
    }
}

/// One pass: activate due upcoming rows, then complete overdue active ones.
///
/// Corrections within a phase run in parallel and one failed write never
/// blocks the others.
pub async fn sweep(state: &SharedState) -> Result<SweepOutcome, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let mut outcome = SweepOutcome::default();

    let upcoming = state
        .backend()
        .list_tournaments(Some(TournamentStatus::Upcoming))
        .await?;
    let due: Vec<Uuid> = upcoming
        .iter()
        .filter(|row| row.start_date <= now)
        .map(|row| row.id)
        .collect();
    let (activated, failed) = apply_status(state, &due, TournamentStatus::Active).await;
    outcome.activated = activated;
    outcome.failed_writes += failed;

    let active = state
        .backend()
        .list_tournaments(Some(TournamentStatus::Active))
        .await?;
    let finished: Vec<Uuid> = active
        .iter()
        .filter(|row| is_finished(row, now))
        .map(|row| row.id)
        .collect();
    let (completed, failed) = apply_status(state, &finished, TournamentStatus::Completed).await;
    outcome.completed = completed;
    outcome.failed_writes += failed;

    if outcome.corrected() > 0 {
        let mut keys = vec![QueryKey::Tournaments];
        keys.extend(
            due.iter()
                .chain(finished.iter())
                .map(|id| QueryKey::TournamentDetail { tournament_id: *id }),
        );
        state.cache().invalidate_and_refresh(&keys);
    }

    Ok(outcome)
}

fn is_finished(row: &Tournament, now: OffsetDateTime) -> bool {
    row.winner_present() || now - row.start_date >= COMPLETION_WINDOW
}

async fn apply_status(
    state: &SharedState,
    ids: &[Uuid],
    status: TournamentStatus,
) -> (usize, usize) {
    if ids.is_empty() {
        return (0, 0);
    }
    let writes = ids.iter().map(|id| {
        let backend = Arc::clone(state.backend());
        let id = *id;
        async move { (id, backend.update_tournament_status(id, status).await) }
    });

    let mut corrected = 0;
    let mut failed = 0;
    for (id, result) in join_all(writes).await {
        match result {
            Ok(()) => {
                debug!(tournament_id = %id, status = status.as_str(), "stored status corrected");
                corrected += 1;
            }
            Err(err) => {
                warn!(tournament_id = %id, error = %err, "status correction failed");
                failed += 1;
            }
        }
    }
    (corrected, failed)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use crate::config::SyncTuning;
    use crate::dao::memory::{MemoryBackend, MemoryFeed, tournament_fixture};
    use crate::dao::models::winner_from_parts;
    use crate::state::AppState;

    use super::*;

    fn state_with(backend: &MemoryBackend) -> SharedState {
        AppState::new(
            Arc::new(backend.clone()),
            Arc::new(MemoryFeed::new()),
            SyncTuning::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn due_upcoming_rows_are_activated() {
        let backend = MemoryBackend::new();
        let due = tournament_fixture(
            "Should Be Live",
            TournamentStatus::Upcoming,
            time::Duration::minutes(-5),
        );
        let due_id = due.id;
        let future = tournament_fixture(
            "Still Early",
            TournamentStatus::Upcoming,
            time::Duration::hours(2),
        );
        {
            let mut rows = backend.tournaments();
            rows.push(due);
            rows.push(future);
        }
        let state = state_with(&backend);

        let outcome = sweep(&state).await.unwrap();

        assert_eq!(outcome.activated, 1);
        assert_eq!(outcome.completed, 0);
        assert_eq!(outcome.failed_writes, 0);
        assert_eq!(
            backend.status_writes(),
            vec![(due_id, TournamentStatus::Active)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overdue_active_rows_are_completed() {
        let backend = MemoryBackend::new();
        let overdue = tournament_fixture(
            "Long Done",
            TournamentStatus::Active,
            time::Duration::minutes(-25),
        );
        let overdue_id = overdue.id;
        let running = tournament_fixture(
            "Mid Match",
            TournamentStatus::Active,
            time::Duration::minutes(-10),
        );
        {
            let mut rows = backend.tournaments();
            rows.push(overdue);
            rows.push(running);
        }
        let state = state_with(&backend);

        let outcome = sweep(&state).await.unwrap();

        assert_eq!(outcome.completed, 1);
        assert_eq!(
            backend.status_writes(),
            vec![(overdue_id, TournamentStatus::Completed)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn a_winner_completes_an_active_row_inside_the_window() {
        let backend = MemoryBackend::new();
        let mut decided = tournament_fixture(
            "Early Winner",
            TournamentStatus::Active,
            time::Duration::minutes(-5),
        );
        decided.winner = winner_from_parts(Some(Uuid::new_v4()), None, None);
        let decided_id = decided.id;
        backend.tournaments().push(decided);
        let state = state_with(&backend);

        let outcome = sweep(&state).await.unwrap();

        assert_eq!(outcome.completed, 1);
        assert_eq!(
            backend.status_writes(),
            vec![(decided_id, TournamentStatus::Completed)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_write_does_not_block_the_rest() {
        let backend = MemoryBackend::new();
        let first = tournament_fixture(
            "Wedged",
            TournamentStatus::Upcoming,
            time::Duration::minutes(-10),
        );
        let second = tournament_fixture(
            "Fine",
            TournamentStatus::Upcoming,
            time::Duration::minutes(-10),
        );
        let wedged_id = first.id;
        let fine_id = second.id;
        {
            let mut rows = backend.tournaments();
            rows.push(first);
            rows.push(second);
        }
        backend.fail_status_writes_for(wedged_id);
        let state = state_with(&backend);

        let outcome = sweep(&state).await.unwrap();

        assert_eq!(outcome.activated, 1);
        assert_eq!(outcome.failed_writes, 1);
        assert!(
            backend
                .status_writes()
                .contains(&(fine_id, TournamentStatus::Active))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn corrections_refresh_the_mounted_tournament_list() {
        let backend = MemoryBackend::new();
        backend.tournaments().push(tournament_fixture(
            "Should Be Live",
            TournamentStatus::Upcoming,
            time::Duration::minutes(-5),
        ));
        let state = state_with(&backend);
        state.cache().mount(&QueryKey::Tournaments);
        tokio::time::sleep(Duration::from_millis(5)).await;

        sweep(&state).await.unwrap();
        // Sweep reads bypass the cache; only the post-correction refresh
        // broadcasts an update.
        let mut updates = state.cache().subscribe_updates();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let update = updates.try_recv().expect("refresh after correction");
        assert_eq!(update.key, QueryKey::Tournaments);
    }

    #[tokio::test(start_paused = true)]
    async fn the_loop_sweeps_immediately_on_start() {
        let backend = MemoryBackend::new();
        backend.tournaments().push(tournament_fixture(
            "Waiting",
            TournamentStatus::Upcoming,
            time::Duration::minutes(-1),
        ));
        let state = state_with(&backend);

        let task = tokio::spawn(run_reconciler(state.clone()));
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(backend.status_writes().len(), 1);
        task.abort();
    }
}
