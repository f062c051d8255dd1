use serde::Serialize;
use utoipa::ToSchema;

use crate::{dto::format_timestamp, state::cache::CachedValue};

/// Freshness metadata attached to every cached read response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CacheMeta {
    /// True when the snapshot may lag the data service.
    pub stale: bool,
    /// RFC 3339 instant of the refresh that produced the snapshot.
    pub fetched_at: String,
    /// Message of the most recent failed refresh behind a stale snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl From<&CachedValue> for CacheMeta {
    fn from(value: &CachedValue) -> Self {
        Self {
            stale: value.stale,
            fetched_at: format_timestamp(value.fetched_at),
            fetch_error: value.fetch_error.clone(),
        }
    }
}

/// Generic action acknowledgement used by mutation endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
