//! Cache keys and their refresh policies.
//!
//! Every cacheable read has one [`QueryKey`]. The key's [`CachePolicy`]
//! decides how it stays fresh: change-feed invalidation only, or a polling
//! interval on top, and whether focus or reconnect hints force a refetch.

use std::fmt;
use std::time::Duration;

use uuid::Uuid;

/// Identity of one cached read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Every tournament, all statuses; the board splits them into tabs.
    Tournaments,
    /// One tournament by id.
    TournamentDetail { tournament_id: Uuid },
    /// Slot list of one tournament.
    TournamentRegistrations { tournament_id: Uuid },
    /// Every registration of one user.
    UserRegistrations { user_id: Uuid },
    /// Wallet balance of one user.
    Balance { user_id: Uuid },
    /// Deposit requests of one user.
    Deposits { user_id: Uuid },
    /// Withdrawal requests of one user.
    Withdrawals { user_id: Uuid },
    /// Ledger entries of one user.
    Transactions { user_id: Uuid },
    /// Merged activity feed of one user.
    RecentActivity { user_id: Uuid },
    /// Counts of reviews awaiting privileged action.
    PendingCounts,
    /// Active teams with members.
    Teams,
    /// One team by id.
    TeamDetail { team_id: Uuid },
}

/// How one key stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Poll period, `None` when change-feed invalidation alone covers the key.
    pub poll_interval: Option<Duration>,
    /// Whether polling continues while no session focuses the key.
    pub poll_in_background: bool,
    /// Age under which a read is served without touching the backend.
    pub stale_after: Duration,
    /// Refetch when a session regains focus.
    pub refetch_on_focus: bool,
    /// Refetch when a session reconnects after a gap.
    pub refetch_on_reconnect: bool,
}

const NO_GRACE: Duration = Duration::ZERO;

impl QueryKey {
    /// Refresh policy of this key.
    ///
    /// Intervals are deliberately uneven so unrelated polls do not align
    /// into one thundering herd against the data service.
    pub fn policy(&self) -> CachePolicy {
        match self {
            // Feed-driven keys: the change feed invalidates them, polling
            // would only duplicate it.
            QueryKey::Tournaments | QueryKey::TournamentDetail { .. } => CachePolicy {
                poll_interval: None,
                poll_in_background: false,
                stale_after: NO_GRACE,
                refetch_on_focus: true,
                refetch_on_reconnect: true,
            },
            // Team rows barely move and the feed does not cover them, so a
            // short grace absorbs browsing instead of a poller.
            QueryKey::Teams | QueryKey::TeamDetail { .. } => CachePolicy {
                poll_interval: None,
                poll_in_background: false,
                stale_after: Duration::from_secs(30),
                refetch_on_focus: true,
                refetch_on_reconnect: false,
            },
            QueryKey::TournamentRegistrations { .. } => CachePolicy {
                poll_interval: Some(Duration::from_secs(8)),
                poll_in_background: false,
                stale_after: NO_GRACE,
                refetch_on_focus: true,
                refetch_on_reconnect: true,
            },
            QueryKey::UserRegistrations { .. } => CachePolicy {
                poll_interval: Some(Duration::from_secs(10)),
                poll_in_background: false,
                stale_after: NO_GRACE,
                refetch_on_focus: true,
                refetch_on_reconnect: true,
            },
            QueryKey::Balance { .. } => CachePolicy {
                poll_interval: Some(Duration::from_secs(5)),
                poll_in_background: false,
                stale_after: NO_GRACE,
                refetch_on_focus: true,
                refetch_on_reconnect: true,
            },
            QueryKey::Deposits { .. } | QueryKey::Withdrawals { .. } => CachePolicy {
                poll_interval: Some(Duration::from_secs(12)),
                poll_in_background: false,
                stale_after: NO_GRACE,
                refetch_on_focus: true,
                refetch_on_reconnect: true,
            },
            QueryKey::Transactions { .. } => CachePolicy {
                poll_interval: Some(Duration::from_secs(15)),
                poll_in_background: false,
                stale_after: NO_GRACE,
                refetch_on_focus: true,
                refetch_on_reconnect: true,
            },
            QueryKey::RecentActivity { .. } => CachePolicy {
                poll_interval: Some(Duration::from_secs(20)),
                poll_in_background: true,
                stale_after: Duration::from_secs(15),
                refetch_on_focus: true,
                refetch_on_reconnect: true,
            },
            // The review dashboard must notice new requests fast, even while
            // the reviewer looks at another tab.
            QueryKey::PendingCounts => CachePolicy {
                poll_interval: Some(Duration::from_secs(3)),
                poll_in_background: true,
                stale_after: Duration::from_secs(1),
                refetch_on_focus: true,
                refetch_on_reconnect: true,
            },
        }
    }

    /// User this key belongs to, for targeted invalidation.
    pub fn user_scope(&self) -> Option<Uuid> {
        match self {
            QueryKey::UserRegistrations { user_id }
            | QueryKey::Balance { user_id }
            | QueryKey::Deposits { user_id }
            | QueryKey::Withdrawals { user_id }
            | QueryKey::Transactions { user_id }
            | QueryKey::RecentActivity { user_id } => Some(*user_id),
            _ => None,
        }
    }

    /// Tournament this key belongs to, for targeted invalidation.
    pub fn tournament_scope(&self) -> Option<Uuid> {
        match self {
            QueryKey::TournamentDetail { tournament_id }
            | QueryKey::TournamentRegistrations { tournament_id } => Some(*tournament_id),
            _ => None,
        }
    }

    /// Stable topic string used in logs and pushed cache updates.
    pub fn as_topic(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Tournaments => write!(f, "tournaments"),
            QueryKey::TournamentDetail { tournament_id } => {
                write!(f, "tournament:{tournament_id}")
            }
            QueryKey::TournamentRegistrations { tournament_id } => {
                write!(f, "registrations:{tournament_id}")
            }
            QueryKey::UserRegistrations { user_id } => {
                write!(f, "user-registrations:{user_id}")
            }
            QueryKey::Balance { user_id } => write!(f, "balance:{user_id}"),
            QueryKey::Deposits { user_id } => write!(f, "deposits:{user_id}"),
            QueryKey::Withdrawals { user_id } => write!(f, "withdrawals:{user_id}"),
            QueryKey::Transactions { user_id } => write!(f, "transactions:{user_id}"),
            QueryKey::RecentActivity { user_id } => write!(f, "activity:{user_id}"),
            QueryKey::PendingCounts => write!(f, "pending-counts"),
            QueryKey::Teams => write!(f, "teams"),
            QueryKey::TeamDetail { team_id } => write!(f, "team:{team_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_driven_keys_do_not_poll() {
        assert!(QueryKey::Tournaments.policy().poll_interval.is_none());
        assert!(QueryKey::Teams.policy().poll_interval.is_none());
        assert!(
            QueryKey::TournamentDetail {
                tournament_id: Uuid::new_v4()
            }
            .policy()
            .poll_interval
            .is_none()
        );
    }

    #[test]
    fn team_keys_carry_a_long_grace_and_skip_reconnect_refetches() {
        let policy = QueryKey::Teams.policy();
        assert_eq!(policy.stale_after, Duration::from_secs(30));
        assert!(policy.refetch_on_focus);
        assert!(!policy.refetch_on_reconnect);
    }

    #[test]
    fn pending_counts_poll_in_background_with_a_short_grace() {
        let policy = QueryKey::PendingCounts.policy();
        assert_eq!(policy.poll_interval, Some(Duration::from_secs(3)));
        assert!(policy.poll_in_background);
        assert_eq!(policy.stale_after, Duration::from_secs(1));
    }

    #[test]
    fn balance_polls_only_while_focused_and_has_no_grace() {
        let policy = QueryKey::Balance {
            user_id: Uuid::new_v4(),
        }
        .policy();
        assert_eq!(policy.poll_interval, Some(Duration::from_secs(5)));
        assert!(!policy.poll_in_background);
        assert_eq!(policy.stale_after, Duration::ZERO);
    }

    #[test]
    fn activity_keeps_polling_in_background_and_serves_recent_reads() {
        let policy = QueryKey::RecentActivity {
            user_id: Uuid::new_v4(),
        }
        .policy();
        assert_eq!(policy.poll_interval, Some(Duration::from_secs(20)));
        assert!(policy.poll_in_background);
        assert_eq!(policy.stale_after, Duration::from_secs(15));
        assert!(policy.refetch_on_focus);
    }

    #[test]
    fn scopes_identify_the_owning_user_and_tournament() {
        let user_id = Uuid::new_v4();
        let tournament_id = Uuid::new_v4();

        assert_eq!(QueryKey::Balance { user_id }.user_scope(), Some(user_id));
        assert_eq!(QueryKey::PendingCounts.user_scope(), None);
        assert_eq!(
            QueryKey::TournamentRegistrations { tournament_id }.tournament_scope(),
            Some(tournament_id)
        );
        assert_eq!(QueryKey::Tournaments.tournament_scope(), None);
    }

    #[test]
    fn topics_are_stable_strings() {
        let user_id = Uuid::parse_str("11f1ab10-9f6e-4f8e-b2f6-3cf1d2f400aa").unwrap();
        assert_eq!(QueryKey::PendingCounts.as_topic(), "pending-counts");
        assert_eq!(
            QueryKey::Balance { user_id }.as_topic(),
            "balance:11f1ab10-9f6e-4f8e-b2f6-3cf1d2f400aa"
        );
    }
}
