//! Change-feed listeners, one task per listener group.
//!
//! A listener treats the feed as a hint channel: every event invalidates and
//! refreshes the keys its table touches, while the payload itself is only
//! trusted for the two one-shot effects (payment notices and the winner
//! nudge). Re-delivered events re-run invalidation, which is idempotent, but
//! never repeat a one-shot effect.

use indexmap::IndexSet;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    dao::models::{ChangeEvent, ChangeKind, DepositStatus, FeedGroup, FeedTable, WithdrawalStatus},
    dto::{
        sse::{DepositNotice, ServerEvent, TabNudge, WithdrawalNotice},
        tournament::TournamentTab,
    },
    state::{SharedState, feed::ListenerStatus, key::QueryKey},
};

/// Markers remembered for re-delivery suppression, per listener.
const DEDUP_WINDOW: usize = 128;

/// Rolling window of one-shot markers already acted on.
struct SeenWindow {
    markers: IndexSet<String>,
    cap: usize,
}

impl SeenWindow {
    fn new(cap: usize) -> Self {
        Self {
            markers: IndexSet::new(),
            cap,
        }
    }

    /// True the first time `marker` is offered, false on re-delivery.
    fn first_sighting(&mut self, marker: String) -> bool {
        if self.markers.contains(&marker) {
            return false;
        }
        if self.markers.len() >= self.cap {
            self.markers.shift_remove_index(0);
        }
        self.markers.insert(marker);
        true
    }
}

/// Spawn one listener task per feed group.
pub fn spawn_listeners(state: &SharedState) -> Vec<JoinHandle<()>> {
    FeedGroup::ALL
        .iter()
        .map(|group| {
            let state = state.clone();
            let group = *group;
            tokio::spawn(async move { run_listener(state, group).await })
        })
        .collect()
}

/// Subscribe, drain events, and reconnect after a fixed delay when the
/// connection refuses or drops. Polling covers freshness in the meantime.
pub async fn run_listener(state: SharedState, group: FeedGroup) {
    let retry_delay = state.tuning().feed_retry_delay;
    let mut seen = SeenWindow::new(DEDUP_WINDOW);
    loop {
        state.feed_health().set(group, ListenerStatus::Connecting);
        let mut subscription = match state.feed().subscribe(group).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(group = group.label(), error = %err, "feed subscription failed");
                state.feed_health().set(group, ListenerStatus::Errored);
                tokio::time::sleep(retry_delay).await;
                continue;
            }
        };
        info!(group = group.label(), "feed listener subscribed");
        state.feed_health().set(group, ListenerStatus::Subscribed);

        while let Some(event) = subscription.next_event().await {
            handle_change(&state, &mut seen, &event);
        }

        warn!(group = group.label(), "feed connection lost");
        state.feed_health().set(group, ListenerStatus::Errored);
        tokio::time::sleep(retry_delay).await;
    }
}

fn handle_change(state: &SharedState, seen: &mut SeenWindow, event: &ChangeEvent) {
    let keys = affected_keys(event);
    state.cache().invalidate_and_refresh(&keys);

    match event.table {
        FeedTable::Tournaments => maybe_winner_nudge(state, seen, event),
        FeedTable::Deposits => maybe_deposit_notice(state, seen, event),
        FeedTable::Withdrawals => maybe_withdrawal_notice(state, seen, event),
        FeedTable::TournamentRegistrations | FeedTable::Balances => {}
    }
}

/// Keys a row change makes suspect. Scoped ids that cannot be read from the
/// payload simply drop the narrower keys; the broad ones still refresh.
fn affected_keys(event: &ChangeEvent) -> Vec<QueryKey> {
    let mut keys = Vec::new();
    match event.table {
        FeedTable::Tournaments => {
            keys.push(QueryKey::Tournaments);
            if let Some(tournament_id) = event.row_id() {
                keys.push(QueryKey::TournamentDetail { tournament_id });
            }
        }
        FeedTable::TournamentRegistrations => {
            keys.push(QueryKey::Tournaments);
            if let Some(tournament_id) = event.tournament_id() {
                keys.push(QueryKey::TournamentDetail { tournament_id });
                keys.push(QueryKey::TournamentRegistrations { tournament_id });
            }
            if let Some(user_id) = event.user_id() {
                keys.push(QueryKey::UserRegistrations { user_id });
            }
        }
        FeedTable::Balances => {
            if let Some(user_id) = event.user_id() {
                keys.push(QueryKey::Balance { user_id });
            }
        }
        FeedTable::Deposits => {
            keys.push(QueryKey::PendingCounts);
            if let Some(user_id) = event.user_id() {
                keys.push(QueryKey::Deposits { user_id });
                keys.push(QueryKey::Balance { user_id });
                keys.push(QueryKey::Transactions { user_id });
            }
        }
        FeedTable::Withdrawals => {
            keys.push(QueryKey::PendingCounts);
            if let Some(user_id) = event.user_id() {
                keys.push(QueryKey::Withdrawals { user_id });
                keys.push(QueryKey::Balance { user_id });
                keys.push(QueryKey::Transactions { user_id });
            }
        }
    }
    keys
}

fn payload_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload.get(field).and_then(Value::as_str)
}

fn payload_amount(payload: &Value) -> i64 {
    payload.get("amount").and_then(Value::as_i64).unwrap_or(0)
}

fn winner_in(payload: &Value) -> bool {
    let id_set = |field: &str| {
        payload_str(payload, field).is_some_and(|raw| !raw.trim().is_empty())
    };
    id_set("winner_id") || id_set("winner_user_id") || id_set("winner_details")
}

/// A winner appearing on a still-active row moves watchers off the ongoing
/// tab, once per tournament. Sessions that already left the tab are not
/// dragged back.
fn maybe_winner_nudge(state: &SharedState, seen: &mut SeenWindow, event: &ChangeEvent) {
    if event.kind != ChangeKind::Update {
        return;
    }
    let (Some(before), Some(after)) = (event.before.as_ref(), event.after.as_ref()) else {
        return;
    };
    if payload_str(after, "status") != Some("active") {
        return;
    }
    if winner_in(before) || !winner_in(after) {
        return;
    }
    let Some(tournament_id) = event.row_id() else {
        return;
    };
    if !seen.first_sighting(format!("tournaments:{tournament_id}:winner")) {
        return;
    }

    let nudge = TabNudge {
        tournament_id,
        from: TournamentTab::Ongoing,
        to: TournamentTab::Completed,
    };
    let Ok(event) = ServerEvent::json("tab_nudge".to_string(), &nudge) else {
        return;
    };
    let moved = state
        .sessions()
        .shift_tab(TournamentTab::Ongoing, TournamentTab::Completed, &event);
    info!(%tournament_id, moved, "winner reported, nudging ongoing viewers");
}

fn maybe_deposit_notice(state: &SharedState, seen: &mut SeenWindow, event: &ChangeEvent) {
    if event.kind != ChangeKind::Update {
        return;
    }
    let (Some(before), Some(after)) = (event.before.as_ref(), event.after.as_ref()) else {
        return;
    };
    if payload_str(before, "status") != Some("pending") {
        return;
    }
    let status = match payload_str(after, "status") {
        Some("approved") => DepositStatus::Approved,
        Some("rejected") => DepositStatus::Rejected,
        _ => return,
    };
    let (Some(deposit_id), Some(user_id)) = (event.row_id(), event.user_id()) else {
        return;
    };
    let marker = format!("deposits:{deposit_id}:{status:?}");
    if !seen.first_sighting(marker) {
        return;
    }

    let amount = payload_amount(after);
    let message = match status {
        DepositStatus::Approved => format!("Deposit of {amount} approved and credited"),
        _ => format!("Deposit of {amount} rejected"),
    };
    let notice = DepositNotice {
        deposit_id,
        status,
        amount,
        message,
    };
    if let Ok(event) = ServerEvent::json("notice".to_string(), &notice) {
        state.sessions().notify_user(user_id, &event);
    }
}

fn maybe_withdrawal_notice(state: &SharedState, seen: &mut SeenWindow, event: &ChangeEvent) {
    if event.kind != ChangeKind::Update {
        return;
    }
    let (Some(before), Some(after)) = (event.before.as_ref(), event.after.as_ref()) else {
        return;
    };
    if payload_str(before, "status") != Some("pending") {
        return;
    }
    let status = match payload_str(after, "status") {
        Some("approved") => WithdrawalStatus::Approved,
        Some("cancelled") => WithdrawalStatus::Cancelled,
        _ => return,
    };
    let (Some(withdrawal_id), Some(user_id)) = (event.row_id(), event.user_id()) else {
        return;
    };
    let marker = format!("withdrawals:{withdrawal_id}:{status:?}");
    if !seen.first_sighting(marker) {
        return;
    }

    let amount = payload_amount(after);
    let (message, reason) = match status {
        WithdrawalStatus::Approved => (format!("Withdrawal of {amount} paid out"), None),
        _ => (
            format!("Withdrawal of {amount} cancelled, the amount is back in your wallet"),
            payload_str(after, "cancellation_reason").map(str::to_string),
        ),
    };
    let notice = WithdrawalNotice {
        withdrawal_id,
        status,
        amount,
        message,
        reason,
    };
    if let Ok(event) = ServerEvent::json("notice".to_string(), &notice) {
        state.sessions().notify_user(user_id, &event);
    }
}
