use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Aggregate listener statuses into the health payload.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let response = HealthResponse::from_statuses(&state.feed_health().statuses());
    if response.degraded {
        warn!("serving degraded, at least one change-feed listener is down");
    }
    response
}
