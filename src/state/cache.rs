//! Snapshot cache between the HTTP surface and the arena data service.
//!
//! Reads are keyed by [`QueryKey`] and served from stored JSON snapshots.
//! A key refreshes when its snapshot is stale (change-feed invalidation or
//! policy age) and at its polling interval while mounted. Concurrent
//! requests for the same key share one backend call; a failed refresh keeps
//! the previous snapshot and marks it stale instead of dropping data.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::dao::backend::{ArenaBackend, BackendError};
use crate::error::ServiceError;
use crate::state::key::{CachePolicy, QueryKey};
use crate::state::sessions::SessionRegistry;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Retry ladder for failed backend reads.
#[derive(Debug, Clone, Copy)]
pub struct RetryTuning {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryTuning {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// One served snapshot.
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub data: Value,
    pub fetched_at: OffsetDateTime,
    /// Set when the snapshot is known or suspected to lag the backend.
    pub stale: bool,
    /// Message of the most recent failed refresh, if any.
    pub fetch_error: Option<String>,
}

/// Pushed to update subscribers after every completed refresh that left
/// data behind.
#[derive(Debug, Clone)]
pub struct CacheUpdate {
    pub key: QueryKey,
    pub value: CachedValue,
}

#[derive(Default)]
struct CacheEntry {
    data: Option<Value>,
    fetched_at: Option<OffsetDateTime>,
    stale: bool,
    last_error: Option<String>,
    /// Completion signal of the in-flight refresh, when one is running.
    flight: Option<watch::Receiver<bool>>,
}

impl CacheEntry {
    fn snapshot(&self) -> Option<CachedValue> {
        Some(CachedValue {
            data: self.data.clone()?,
            fetched_at: self.fetched_at.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            stale: self.stale,
            fetch_error: self.last_error.clone(),
        })
    }

    fn is_fresh(&self, policy: &CachePolicy, now: OffsetDateTime) -> bool {
        if self.stale || self.data.is_none() {
            return false;
        }
        let Some(fetched_at) = self.fetched_at else {
            return false;
        };
        let grace =
            time::Duration::try_from(policy.stale_after).unwrap_or(time::Duration::MAX);
        // Strict: a zero grace means reads always go back to the backend.
        now - fetched_at < grace
    }
}

struct MountState {
    mounts: usize,
    poller: Option<JoinHandle<()>>,
}

/// The cache itself. Shared as `Arc<QueryCache>` so refresh flights and
/// pollers can be spawned off it.
pub struct QueryCache {
    backend: Arc<dyn ArenaBackend>,
    sessions: Arc<SessionRegistry>,
    entries: DashMap<QueryKey, CacheEntry>,
    mounts: DashMap<QueryKey, MountState>,
    updates: broadcast::Sender<CacheUpdate>,
    retry: RetryTuning,
}

impl QueryCache {
    pub fn new(
        backend: Arc<dyn ArenaBackend>,
        sessions: Arc<SessionRegistry>,
        retry: RetryTuning,
    ) -> Arc<Self> {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Arc::new(Self {
            backend,
            sessions,
            entries: DashMap::new(),
            mounts: DashMap::new(),
            updates,
            retry,
        })
    }

    /// Subscribe to refresh results, for fan-out to event streams.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<CacheUpdate> {
        self.updates.subscribe()
    }

    /// Serve `key`, refreshing first unless the snapshot is still fresh.
    pub async fn fetch(self: &Arc<Self>, key: &QueryKey) -> Result<CachedValue, ServiceError> {
        self.fetch_inner(key, false).await
    }

    /// Refresh `key` regardless of freshness and serve the result.
    pub async fn refetch(self: &Arc<Self>, key: &QueryKey) -> Result<CachedValue, ServiceError> {
        self.fetch_inner(key, true).await
    }

    /// Refresh `key` from a context that does not care about the result.
    pub fn spawn_refetch(self: &Arc<Self>, key: &QueryKey) {
        let cache = Arc::clone(self);
        let key = key.clone();
        tokio::spawn(async move {
            let _ = cache.refetch(&key).await;
        });
    }

    async fn fetch_inner(
        self: &Arc<Self>,
        key: &QueryKey,
        force: bool,
    ) -> Result<CachedValue, ServiceError> {
        let mut flight = {
            let mut entry = self.entries.entry(key.clone()).or_default();
            if let Some(flight) = &entry.flight {
                // Someone is already refreshing this key; share the result.
                flight.clone()
            } else {
                let fresh = !force && entry.is_fresh(&key.policy(), OffsetDateTime::now_utc());
                if fresh {
                    if let Some(snapshot) = entry.snapshot() {
                        return Ok(snapshot);
                    }
                }
                let (done, flight) = watch::channel(false);
                entry.flight = Some(flight.clone());
                let cache = Arc::clone(self);
                let flight_key = key.clone();
                // The flight runs as its own task so a cancelled requester
                // never leaves the key wedged mid-refresh.
                tokio::spawn(async move { cache.run_flight(flight_key, done).await });
                flight
            }
        };

        if !*flight.borrow() {
            let _ = flight.changed().await;
        }
        self.stored(key)
    }

    async fn run_flight(self: Arc<Self>, key: QueryKey, done: watch::Sender<bool>) {
        let outcome = self.fetch_with_retry(&key).await;

        let update = {
            let mut entry = self.entries.entry(key.clone()).or_default();
            entry.flight = None;
            match outcome {
                Ok(value) => {
                    entry.data = Some(value);
                    entry.fetched_at = Some(OffsetDateTime::now_utc());
                    entry.stale = false;
                    entry.last_error = None;
                }
                Err(err) => {
                    // Keep whatever we had; serving stale beats serving
                    // nothing.
                    entry.stale = true;
                    entry.last_error = Some(err.to_string());
                    warn!(key = %key, error = %err, "cache refresh failed");
                }
            }
            entry.snapshot()
        };

        let _ = done.send(true);
        if let Some(value) = update {
            let _ = self.updates.send(CacheUpdate { key, value });
        }
    }

    async fn fetch_with_retry(&self, key: &QueryKey) -> Result<Value, BackendError> {
        let mut attempt = 0;
        let mut backoff = self.retry.initial_backoff;
        loop {
            match self.backend_value(key).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    debug!(key = %key, attempt, error = %err, "transient fetch failure, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn backend_value(&self, key: &QueryKey) -> Result<Value, BackendError> {
        match key {
            QueryKey::Tournaments => to_value(self.backend.list_tournaments(None).await?),
            QueryKey::TournamentDetail { tournament_id } => {
                to_value(self.backend.fetch_tournament(*tournament_id).await?)
            }
            QueryKey::TournamentRegistrations { tournament_id } => {
                to_value(self.backend.list_registrations(*tournament_id).await?)
            }
            QueryKey::UserRegistrations { user_id } => {
                to_value(self.backend.list_user_registrations(*user_id).await?)
            }
            QueryKey::Balance { user_id } => {
                to_value(self.backend.fetch_balance(*user_id).await?)
            }
            QueryKey::Deposits { user_id } => {
                to_value(self.backend.list_deposits(*user_id).await?)
            }
            QueryKey::Withdrawals { user_id } => {
                to_value(self.backend.list_withdrawals(*user_id).await?)
            }
            QueryKey::Transactions { user_id } => {
                to_value(self.backend.list_transactions(*user_id, 50).await?)
            }
            QueryKey::RecentActivity { user_id } => {
                to_value(self.backend.recent_activity(*user_id).await?)
            }
            QueryKey::PendingCounts => to_value(self.backend.count_pending().await?),
            QueryKey::Teams => to_value(self.backend.list_teams().await?),
            QueryKey::TeamDetail { team_id } => {
                to_value(self.backend.fetch_team(*team_id).await?)
            }
        }
    }

    fn stored(&self, key: &QueryKey) -> Result<CachedValue, ServiceError> {
        let Some(entry) = self.entries.get(key) else {
            return Err(ServiceError::Unavailable(format!("no data for {key}")));
        };
        match entry.snapshot() {
            Some(snapshot) => Ok(snapshot),
            None => Err(ServiceError::Unavailable(
                entry
                    .last_error
                    .clone()
                    .unwrap_or_else(|| format!("no data for {key}")),
            )),
        }
    }

    // -- mounts and pollers ------------------------------------------------

    /// Register interest in `key`. The first mount primes the snapshot and
    /// starts the key's poller when its policy has an interval.
    pub fn mount(self: &Arc<Self>, key: &QueryKey) {
        let mut state = self.mounts.entry(key.clone()).or_insert_with(|| MountState {
            mounts: 0,
            poller: None,
        });
        state.mounts += 1;
        if state.mounts > 1 {
            return;
        }

        debug!(key = %key, "first mount, priming snapshot");
        self.spawn_refetch(key);

        if let Some(every) = key.policy().poll_interval {
            let cache = Arc::clone(self);
            let poll_key = key.clone();
            state.poller = Some(tokio::spawn(async move {
                cache.poll_loop(poll_key, every).await;
            }));
        }
    }

    /// Drop one mount of `key`; the last unmount stops its poller.
    pub fn unmount(&self, key: &QueryKey) {
        let emptied = match self.mounts.get_mut(key) {
            Some(mut state) => {
                state.mounts = state.mounts.saturating_sub(1);
                if state.mounts == 0 {
                    if let Some(poller) = state.poller.take() {
                        poller.abort();
                    }
                    debug!(key = %key, "last unmount, poller stopped");
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if emptied {
            self.mounts.remove_if(key, |_, state| state.mounts == 0);
        }
    }

    pub fn is_mounted(&self, key: &QueryKey) -> bool {
        self.mounts.get(key).is_some_and(|state| state.mounts > 0)
    }

    async fn poll_loop(self: Arc<Self>, key: QueryKey, every: Duration) {
        let policy = key.policy();
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and the mount already primed
        // the snapshot, so consume it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !policy.poll_in_background && !self.sessions.any_focused_with_key(&key) {
                continue;
            }
            let _ = self.refetch(&key).await;
        }
    }

    // -- invalidation ------------------------------------------------------

    /// Mark `key` stale. The next read refreshes it.
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
    }

    /// Mark every key stale and eagerly refresh the mounted ones.
    pub fn invalidate_and_refresh(self: &Arc<Self>, keys: &[QueryKey]) {
        for key in keys {
            self.invalidate(key);
            if self.is_mounted(key) {
                self.spawn_refetch(key);
            }
        }
    }

    /// Invalidate every known key matching `pred`, refreshing mounted ones.
    /// Returns how many keys matched.
    pub fn invalidate_where(self: &Arc<Self>, pred: impl Fn(&QueryKey) -> bool) -> usize {
        let keys: Vec<QueryKey> = self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| pred(key))
            .collect();
        self.invalidate_and_refresh(&keys);
        keys.len()
    }
}

fn to_value<T: Serialize>(rows: T) -> Result<Value, BackendError> {
    serde_json::to_value(rows).map_err(|source| BackendError::DeserializeValue { source })
}
