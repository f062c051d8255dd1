//! Connection health of the change-feed listeners.

use serde::Serialize;
use tokio::sync::watch;
use utoipa::ToSchema;

use crate::dao::models::FeedGroup;

/// Connection state of one listener group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ListenerStatus {
    /// Establishing or re-establishing the subscription.
    Connecting,
    /// Events are flowing.
    Subscribed,
    /// The last attempt failed; recovery is scheduled.
    Errored,
}

/// Watchable status of every listener group.
///
/// Written by the listener tasks, read by the health endpoint and anything
/// that wants to react to a degraded push path.
#[derive(Debug)]
pub struct FeedHealth {
    tournaments: watch::Sender<ListenerStatus>,
    balances: watch::Sender<ListenerStatus>,
    payments: watch::Sender<ListenerStatus>,
}

impl FeedHealth {
    pub fn new() -> Self {
        let (tournaments, _) = watch::channel(ListenerStatus::Connecting);
        let (balances, _) = watch::channel(ListenerStatus::Connecting);
        let (payments, _) = watch::channel(ListenerStatus::Connecting);
        Self {
            tournaments,
            balances,
            payments,
        }
    }

    fn sender(&self, group: FeedGroup) -> &watch::Sender<ListenerStatus> {
        match group {
            FeedGroup::Tournaments => &self.tournaments,
            FeedGroup::Balances => &self.balances,
            FeedGroup::Payments => &self.payments,
        }
    }

    pub fn set(&self, group: FeedGroup, status: ListenerStatus) {
        let _ = self.sender(group).send(status);
    }

    pub fn get(&self, group: FeedGroup) -> ListenerStatus {
        *self.sender(group).borrow()
    }

    pub fn watch(&self, group: FeedGroup) -> watch::Receiver<ListenerStatus> {
        self.sender(group).subscribe()
    }

    /// Status of every group, in declaration order.
    pub fn statuses(&self) -> [(FeedGroup, ListenerStatus); 3] {
        FeedGroup::ALL.map(|group| (group, self.get(group)))
    }

    /// The push path is degraded while any listener sits in the errored
    /// state. Plain polling still keeps reads usable.
    pub fn degraded(&self) -> bool {
        FeedGroup::ALL
            .iter()
            .any(|group| self.get(*group) == ListenerStatus::Errored)
    }
}

impl Default for FeedHealth {
    fn default() -> Self {
        Self::new()
    }
}
