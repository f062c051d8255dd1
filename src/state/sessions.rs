//! Registry of connected view sessions.
//!
//! One entry per live event-stream connection. A session remembers who is
//! watching (user and role), which tournament tab they are on, whether the
//! view is focused, and which cache keys it mounted. Private pushes (notices,
//! tab nudges, handshakes) go through the session's own channel.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dto::sse::{ServerEvent, SessionRole};
use crate::dto::tournament::TournamentTab;
use crate::state::key::QueryKey;

/// Live state of one connected view.
#[derive(Debug)]
pub struct ViewSession {
    pub user_id: Option<Uuid>,
    pub role: SessionRole,
    pub tab: TournamentTab,
    pub focused: bool,
    pub mounted: Vec<QueryKey>,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl ViewSession {
    pub fn new(
        user_id: Option<Uuid>,
        role: SessionRole,
        tab: TournamentTab,
        mounted: Vec<QueryKey>,
        tx: mpsc::UnboundedSender<ServerEvent>,
    ) -> Self {
        Self {
            user_id,
            role,
            tab,
            // A session that just connected is considered focused until the
            // client reports otherwise.
            focused: true,
            mounted,
            tx,
        }
    }
}

/// All connected view sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, ViewSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: Uuid, session: ViewSession) {
        self.sessions.insert(session_id, session);
    }

    /// Remove a session, returning it so the caller can release its mounts.
    pub fn remove(&self, session_id: Uuid) -> Option<ViewSession> {
        self.sessions.remove(&session_id).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Switch the tournament tab of one session. `false` if unknown.
    pub fn set_tab(&self, session_id: Uuid, tab: TournamentTab) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(mut session) => {
                session.tab = tab;
                true
            }
            None => false,
        }
    }

    pub fn tab_of(&self, session_id: Uuid) -> Option<TournamentTab> {
        self.sessions.get(&session_id).map(|session| session.tab)
    }

    /// Record the focus state. `Some(true)` when the session just regained
    /// focus, which is the moment focus-flagged keys get refetched.
    pub fn set_focused(&self, session_id: Uuid, focused: bool) -> Option<bool> {
        let mut session = self.sessions.get_mut(&session_id)?;
        let regained = focused && !session.focused;
        session.focused = focused;
        Some(regained)
    }

    pub fn mounted_keys(&self, session_id: Uuid) -> Vec<QueryKey> {
        self.sessions
            .get(&session_id)
            .map(|session| session.mounted.clone())
            .unwrap_or_default()
    }

    pub fn has_mounted(&self, session_id: Uuid, key: &QueryKey) -> bool {
        self.sessions
            .get(&session_id)
            .is_some_and(|session| session.mounted.contains(key))
    }

    /// Whether any focused session has `key` mounted. Polling for keys that
    /// do not refresh in the background is gated on this.
    pub fn any_focused_with_key(&self, key: &QueryKey) -> bool {
        self.sessions
            .iter()
            .any(|session| session.focused && session.mounted.contains(key))
    }

    /// Push an event to one session. `false` if it is gone.
    pub fn send_to(&self, session_id: Uuid, event: ServerEvent) -> bool {
        match self.sessions.get(&session_id) {
            Some(session) => session.tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Push an event to every session of `user_id`. Returns how many got it.
    pub fn notify_user(&self, user_id: Uuid, event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for session in self.sessions.iter() {
            if session.user_id == Some(user_id) && session.tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Move every session sitting on `from` over to `to` and push `event` to
    /// each. Sessions on any other tab are left alone. Returns how many moved.
    pub fn shift_tab(
        &self,
        from: TournamentTab,
        to: TournamentTab,
        event: &ServerEvent,
    ) -> usize {
        let mut moved = 0;
        for mut session in self.sessions.iter_mut() {
            if session.tab == from {
                session.tab = to;
                let _ = session.tx.send(event.clone());
                moved += 1;
            }
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(name: &str) -> ServerEvent {
        ServerEvent {
            event: Some(name.to_string()),
            data: "{}".to_string(),
        }
    }

    fn session(
        user_id: Option<Uuid>,
        tab: TournamentTab,
        mounted: Vec<QueryKey>,
    ) -> (ViewSession, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ViewSession::new(user_id, SessionRole::Player, tab, mounted, tx),
            rx,
        )
    }

    #[test]
    fn focus_gate_only_sees_focused_sessions_with_the_key() {
        let registry = SessionRegistry::new();
        let user_id = Uuid::new_v4();
        let key = QueryKey::Balance { user_id };

        let id = Uuid::new_v4();
        let (view, _rx) = session(Some(user_id), TournamentTab::Ongoing, vec![key.clone()]);
        registry.register(id, view);

        assert!(registry.any_focused_with_key(&key));

        registry.set_focused(id, false);
        assert!(!registry.any_focused_with_key(&key));

        // Regaining focus is reported exactly once.
        assert_eq!(registry.set_focused(id, true), Some(true));
        assert_eq!(registry.set_focused(id, true), Some(false));
        assert!(registry.any_focused_with_key(&key));
    }

    #[test]
    fn notices_reach_only_the_target_user() {
        let registry = SessionRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let alice_session = Uuid::new_v4();
        let (view, mut alice_rx) = session(Some(alice), TournamentTab::Ongoing, vec![]);
        registry.register(alice_session, view);

        let bob_session = Uuid::new_v4();
        let (view, mut bob_rx) = session(Some(bob), TournamentTab::Ongoing, vec![]);
        registry.register(bob_session, view);

        assert_eq!(registry.notify_user(alice, &event("notice")), 1);
        assert!(alice_rx.try_recv().is_ok());
        assert!(bob_rx.try_recv().is_err());
    }

    #[test]
    fn shift_tab_moves_only_sessions_on_the_source_tab() {
        let registry = SessionRegistry::new();

        let watching = Uuid::new_v4();
        let (view, mut watching_rx) = session(None, TournamentTab::Ongoing, vec![]);
        registry.register(watching, view);

        let elsewhere = Uuid::new_v4();
        let (view, mut elsewhere_rx) = session(None, TournamentTab::Upcoming, vec![]);
        registry.register(elsewhere, view);

        let moved = registry.shift_tab(
            TournamentTab::Ongoing,
            TournamentTab::Completed,
            &event("tab_nudge"),
        );

        assert_eq!(moved, 1);
        assert_eq!(registry.tab_of(watching), Some(TournamentTab::Completed));
        assert_eq!(registry.tab_of(elsewhere), Some(TournamentTab::Upcoming));
        assert!(watching_rx.try_recv().is_ok());
        assert!(elsewhere_rx.try_recv().is_err());
    }

    #[test]
    fn removal_hands_back_the_mounted_keys() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        let key = QueryKey::PendingCounts;
        let (view, _rx) = session(None, TournamentTab::Ongoing, vec![key.clone()]);
        registry.register(id, view);

        assert!(registry.has_mounted(id, &key));
        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.mounted, vec![key]);
        assert!(registry.is_empty());
    }
}
