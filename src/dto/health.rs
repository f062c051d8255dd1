use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::FeedGroup,
    state::feed::ListenerStatus,
};

/// Connection state of one change-feed listener.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListenerHealth {
    /// Listener group label ("tournaments", "balances", "payments").
    pub group: String,
    pub status: ListenerStatus,
}

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// True when any listener is errored; polling still covers freshness.
    pub degraded: bool,
    pub listeners: Vec<ListenerHealth>,
}

impl HealthResponse {
    /// Aggregate per-listener statuses into the route payload.
    pub fn from_statuses(statuses: &[(FeedGroup, ListenerStatus)]) -> Self {
        let degraded = statuses
            .iter()
            .any(|(_, status)| *status == ListenerStatus::Errored);
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            degraded,
            listeners: statuses
                .iter()
                .map(|(group, status)| ListenerHealth {
                    group: group.label().to_string(),
                    status: *status,
                })
                .collect(),
        }
    }
}
