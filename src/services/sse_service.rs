//! View sessions: the SSE channel a browser tab holds open.
//!
//! Opening a session derives the query keys the view watches, mounts them,
//! and starts a forwarder that turns cache refreshes into `query` events.
//! Dropping the stream tears everything down, so mount refcounts follow
//! connected tabs exactly.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{
        common::{ActionResponse, CacheMeta},
        sse::{Handshake, QueryUpdate, ServerEvent, SessionQuery, SessionRole},
        tournament::TournamentTab,
    },
    error::ServiceError,
    state::{SharedState, cache::CacheUpdate, key::QueryKey, sessions::ViewSession},
};

/// Outbound buffer per session; keep-alives cover slow consumers.
const SESSION_BUFFER: usize = 16;

/// Query keys a session watches, derived from its declared context.
fn mount_keys(
    user_id: Option<Uuid>,
    role: SessionRole,
    tournament_id: Option<Uuid>,
) -> Vec<QueryKey> {
    let mut keys = vec![QueryKey::Tournaments, QueryKey::Teams];
    if let Some(tournament_id) = tournament_id {
        keys.push(QueryKey::TournamentDetail { tournament_id });
        keys.push(QueryKey::TournamentRegistrations { tournament_id });
    }
    if let Some(user_id) = user_id {
        keys.push(QueryKey::UserRegistrations { user_id });
        keys.push(QueryKey::Balance { user_id });
        keys.push(QueryKey::Deposits { user_id });
        keys.push(QueryKey::Withdrawals { user_id });
        keys.push(QueryKey::Transactions { user_id });
        keys.push(QueryKey::RecentActivity { user_id });
    }
    if role.privileged() {
        keys.push(QueryKey::PendingCounts);
    }
    keys
}

/// Register a view session and return its event channel.
///
/// The first event is always the handshake; snapshots of the mounted keys
/// follow as they land. The session lives until the receiver is dropped.
pub fn open_session(
    state: &SharedState,
    query: SessionQuery,
) -> (Uuid, mpsc::Receiver<ServerEvent>) {
    let session_id = Uuid::new_v4();
    let role = query.role.unwrap_or(SessionRole::Player);
    let tab = query.tab.unwrap_or(TournamentTab::Ongoing);
    let keys = mount_keys(query.user_id, role, query.tournament_id);

    let (direct_tx, direct_rx) = mpsc::unbounded_channel();
    state.sessions().register(
        session_id,
        ViewSession::new(query.user_id, role, tab, keys.clone(), direct_tx),
    );

    // Subscribe before mounting so the initial primes are not missed.
    let updates = state.cache().subscribe_updates();
    for key in &keys {
        state.cache().mount(key);
        if key.policy().refetch_on_reconnect {
            // A fresh connection wants fresh data even when someone else
            // already holds the mount.
            state.cache().spawn_refetch(key);
        }
    }

    let handshake = Handshake {
        session_id,
        message: "view session subscribed".to_string(),
        degraded: state.feed_health().degraded(),
        topics: keys.iter().map(QueryKey::as_topic).collect(),
    };

    let (out_tx, out_rx) = mpsc::channel(SESSION_BUFFER);
    let forward_state = state.clone();
    tokio::spawn(async move {
        forward(&forward_state, session_id, handshake, direct_rx, updates, out_tx).await;
        teardown(&forward_state, session_id);
        info!(%session_id, "view session closed");
    });

    info!(%session_id, ?role, "view session opened");
    (session_id, out_rx)
}

async fn forward(
    state: &SharedState,
    session_id: Uuid,
    handshake: Handshake,
    mut direct_rx: mpsc::UnboundedReceiver<ServerEvent>,
    mut updates: broadcast::Receiver<CacheUpdate>,
    out_tx: mpsc::Sender<ServerEvent>,
) {
    match ServerEvent::json("handshake".to_string(), &handshake) {
        Ok(event) => {
            if out_tx.send(event).await.is_err() {
                return;
            }
        }
        Err(err) => {
            debug!(%session_id, error = %err, "handshake serialization failed");
            return;
        }
    }

    loop {
        tokio::select! {
            _ = out_tx.closed() => break,
            event = direct_rx.recv() => {
                match event {
                    Some(event) => {
                        if out_tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    // Registry side went away; nothing left to forward.
                    None => break,
                }
            }
            update = updates.recv() => {
                match update {
                    Ok(update) => {
                        if !state.sessions().has_mounted(session_id, &update.key) {
                            continue;
                        }
                        let payload = QueryUpdate {
                            topic: update.key.as_topic(),
                            meta: CacheMeta::from(&update.value),
                            data: update.value.data,
                        };
                        match ServerEvent::json("query".to_string(), &payload) {
                            Ok(event) => {
                                if out_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                debug!(%session_id, error = %err, "query event serialization failed");
                            }
                        }
                    }
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(%session_id, skipped, "session lagged behind cache updates");
                    }
                }
            }
        }
    }
}

fn teardown(state: &SharedState, session_id: Uuid) {
    if let Some(session) = state.sessions().remove(session_id) {
        for key in &session.mounted {
            state.cache().unmount(key);
        }
    }
}

/// Wrap a session's event channel as an SSE response.
pub fn into_sse_response(
    events: mpsc::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(events).map(|payload| {
        let mut event = Event::default().data(payload.data);
        if let Some(name) = payload.event {
            event = event.event(name);
        }
        Ok(event)
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Record a manual tab change for `session_id`.
pub fn set_tab(
    state: &SharedState,
    session_id: Uuid,
    tab: TournamentTab,
) -> Result<ActionResponse, ServiceError> {
    if state.sessions().set_tab(session_id, tab) {
        Ok(ActionResponse::new(format!("tab set to {}", tab.as_str())))
    } else {
        Err(ServiceError::NotFound(format!("no session {session_id}")))
    }
}

/// Record a visibility change; regaining focus refreshes the keys that ask
/// for it.
pub fn set_focus(
    state: &SharedState,
    session_id: Uuid,
    focused: bool,
) -> Result<ActionResponse, ServiceError> {
    match state.sessions().set_focused(session_id, focused) {
        None => Err(ServiceError::NotFound(format!("no session {session_id}"))),
        Some(regained) => {
            if regained {
                for key in state.sessions().mounted_keys(session_id) {
                    if key.policy().refetch_on_focus {
                        state.cache().spawn_refetch(&key);
                    }
                }
            }
            Ok(ActionResponse::new(if focused {
                "session focused"
            } else {
                "session blurred"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use crate::config::SyncTuning;
    use crate::dao::memory::{MemoryBackend, MemoryFeed, balance_fixture};
    use crate::state::AppState;

    use super::*;

    fn state_with(backend: &MemoryBackend) -> SharedState {
        AppState::new(
            Arc::new(backend.clone()),
            Arc::new(MemoryFeed::new()),
            SyncTuning::default(),
        )
    }

    fn anonymous() -> SessionQuery {
        SessionQuery {
            user_id: None,
            role: None,
            tab: None,
            tournament_id: None,
        }
    }

    fn for_user(user_id: Uuid, role: SessionRole) -> SessionQuery {
        SessionQuery {
            user_id: Some(user_id),
            role: Some(role),
            tab: None,
            tournament_id: None,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn the_handshake_arrives_first_and_lists_the_topics() {
        let backend = MemoryBackend::new();
        let user_id = Uuid::new_v4();
        backend
            .balances()
            .insert(user_id, balance_fixture(user_id, 250));
        let state = state_with(&backend);

        let (session_id, mut rx) = open_session(&state, for_user(user_id, SessionRole::Player));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let events = drain(&mut rx);
        assert_eq!(events[0].event.as_deref(), Some("handshake"));
        assert!(events[0].data.contains(&session_id.to_string()));
        assert!(events[0].data.contains(&format!("balance:{user_id}")));

        // Initial snapshots follow the handshake.
        assert!(
            events[1..]
                .iter()
                .any(|event| event.event.as_deref() == Some("query"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_mount_what_their_context_names() {
        let backend = MemoryBackend::new();
        let state = state_with(&backend);
        let user_id = Uuid::new_v4();

        let (_, _player_rx) = open_session(&state, for_user(user_id, SessionRole::Player));
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(state.cache().is_mounted(&QueryKey::Tournaments));
        assert!(state.cache().is_mounted(&QueryKey::Balance { user_id }));
        assert!(!state.cache().is_mounted(&QueryKey::PendingCounts));

        let (_, _admin_rx) = open_session(&state, for_user(Uuid::new_v4(), SessionRole::Admin));
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(state.cache().is_mounted(&QueryKey::PendingCounts));
    }

    #[tokio::test(start_paused = true)]
    async fn updates_reach_only_sessions_that_mounted_the_key() {
        let backend = MemoryBackend::new();
        let user_id = Uuid::new_v4();
        backend
            .balances()
            .insert(user_id, balance_fixture(user_id, 900));
        let state = state_with(&backend);

        let (_, mut watcher_rx) = open_session(&state, for_user(user_id, SessionRole::Player));
        let (_, mut bystander_rx) = open_session(&state, anonymous());
        tokio::time::sleep(Duration::from_millis(10)).await;
        drain(&mut watcher_rx);
        drain(&mut bystander_rx);

        state.cache().spawn_refetch(&QueryKey::Balance { user_id });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let topic = format!("balance:{user_id}");
        assert!(
            drain(&mut watcher_rx)
                .iter()
                .any(|event| event.data.contains(&topic))
        );
        assert!(
            !drain(&mut bystander_rx)
                .iter()
                .any(|event| event.data.contains(&topic))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_stream_unmounts_and_forgets_the_session() {
        let backend = MemoryBackend::new();
        let state = state_with(&backend);

        let (_, rx) = open_session(&state, anonymous());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(state.sessions().len(), 1);
        assert!(state.cache().is_mounted(&QueryKey::Tournaments));

        drop(rx);
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(state.sessions().is_empty());
        assert!(!state.cache().is_mounted(&QueryKey::Tournaments));
        assert!(!state.cache().is_mounted(&QueryKey::Teams));
    }

    #[tokio::test(start_paused = true)]
    async fn regaining_focus_refreshes_the_focus_sensitive_keys() {
        let backend = MemoryBackend::new();
        let user_id = Uuid::new_v4();
        backend
            .balances()
            .insert(user_id, balance_fixture(user_id, 100));
        let state = state_with(&backend);

        let (session_id, _rx) = open_session(&state, for_user(user_id, SessionRole::Player));
        tokio::time::sleep(Duration::from_millis(10)).await;

        set_focus(&state, session_id, false).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let while_blurred = backend.read_call_count();

        set_focus(&state, session_id, true).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(backend.read_call_count() > while_blurred);
    }

    #[tokio::test(start_paused = true)]
    async fn tab_and_focus_updates_for_unknown_sessions_are_not_found() {
        let backend = MemoryBackend::new();
        let state = state_with(&backend);

        let tab = set_tab(&state, Uuid::new_v4(), TournamentTab::Completed);
        assert!(matches!(tab, Err(ServiceError::NotFound(_))));

        let focus = set_focus(&state, Uuid::new_v4(), true);
        assert!(matches!(focus, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_tab_changes_stick() {
        let backend = MemoryBackend::new();
        let state = state_with(&backend);

        let (session_id, _rx) = open_session(&state, anonymous());
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(
            state.sessions().tab_of(session_id),
            Some(TournamentTab::Ongoing)
        );

        set_tab(&state, session_id, TournamentTab::Completed).unwrap();
        assert_eq!(
            state.sessions().tab_of(session_id),
            Some(TournamentTab::Completed)
        );
    }
}
