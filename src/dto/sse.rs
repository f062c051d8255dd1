use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    dao::models::{DepositStatus, WithdrawalStatus},
    dto::{common::CacheMeta, tournament::TournamentTab},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Trust level a view session connects with.
///
/// Roles arrive as a declared request datum; there is no authentication
/// flow in this gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    Player,
    Admin,
    Boss,
}

impl SessionRole {
    /// Whether the role may watch review queues and run privileged mutations.
    pub fn privileged(&self) -> bool {
        matches!(self, SessionRole::Admin | SessionRole::Boss)
    }
}

/// Query parameters opening an `/events` stream.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SessionQuery {
    /// User the session acts for; anonymous browsing mounts only shared keys.
    pub user_id: Option<Uuid>,
    /// Declared role, `player` when omitted.
    pub role: Option<SessionRole>,
    /// Tab the view starts on, `ongoing` when omitted.
    pub tab: Option<TournamentTab>,
    /// Tournament whose detail and slots the view is watching.
    pub tournament_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier for the tab and focus endpoints of this stream.
    pub session_id: Uuid,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether any change-feed listener is currently errored.
    pub degraded: bool,
    /// Topics the session's mounted keys publish under.
    pub topics: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Pushed whenever a mounted key finished a refresh.
pub struct QueryUpdate {
    /// Topic string of the refreshed key.
    pub topic: String,
    pub meta: CacheMeta,
    /// The refreshed snapshot as it would be served over REST.
    #[schema(value_type = Object)]
    pub data: Value,
}

#[derive(Debug, Serialize, ToSchema)]
/// One-shot notice that a deposit left review.
pub struct DepositNotice {
    pub deposit_id: Uuid,
    pub status: DepositStatus,
    pub amount: i64,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// One-shot notice that a withdrawal was settled.
pub struct WithdrawalNotice {
    pub withdrawal_id: Uuid,
    pub status: WithdrawalStatus,
    pub amount: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Advisory tab switch pushed when a watched tournament concludes.
pub struct TabNudge {
    pub tournament_id: Uuid,
    pub from: TournamentTab,
    pub to: TournamentTab,
}

#[derive(Debug, Deserialize, ToSchema)]
/// Manual tab change reported by the client.
pub struct TabChangeRequest {
    pub tab: TournamentTab,
}

#[derive(Debug, Deserialize, ToSchema)]
/// Visibility change reported by the client.
pub struct FocusChangeRequest {
    pub focused: bool,
}
