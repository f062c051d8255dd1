/// Snapshot cache and refresh machinery.
pub mod cache;
/// Change-feed listener health.
pub mod feed;
/// Cache keys and refresh policies.
pub mod key;
/// Connected view sessions.
pub mod sessions;

use std::sync::Arc;

use crate::config::SyncTuning;
use crate::dao::backend::{ArenaBackend, ChangeFeed};
use crate::state::cache::QueryCache;
use crate::state::feed::FeedHealth;
use crate::state::sessions::SessionRegistry;

pub type SharedState = Arc<AppState>;

/// Central application state: backend handles, the snapshot cache, the
/// session registry and listener health.
pub struct AppState {
    backend: Arc<dyn ArenaBackend>,
    feed: Arc<dyn ChangeFeed>,
    cache: Arc<QueryCache>,
    sessions: Arc<SessionRegistry>,
    feed_health: FeedHealth,
    tuning: SyncTuning,
}

impl AppState {
    /// Construct the shared state wrapped in an [`Arc`].
    pub fn new(
        backend: Arc<dyn ArenaBackend>,
        feed: Arc<dyn ChangeFeed>,
        tuning: SyncTuning,
    ) -> SharedState {
        let sessions = Arc::new(SessionRegistry::new());
        let cache = QueryCache::new(Arc::clone(&backend), Arc::clone(&sessions), tuning.retry);
        Arc::new(Self {
            backend,
            feed,
            cache,
            sessions,
            feed_health: FeedHealth::new(),
            tuning,
        })
    }

    /// Request/response handle to the arena data service.
    pub fn backend(&self) -> &Arc<dyn ArenaBackend> {
        &self.backend
    }

    /// Push-side handle used by the listeners.
    pub fn feed(&self) -> &Arc<dyn ChangeFeed> {
        &self.feed
    }

    /// The snapshot cache.
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Registry of connected view sessions.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Listener connection health.
    pub fn feed_health(&self) -> &FeedHealth {
        &self.feed_health
    }

    /// Runtime tuning knobs.
    pub fn tuning(&self) -> &SyncTuning {
        &self.tuning
    }
}
