// MIT License - Copyright (c) 2026 Peter Wright
// In-memory panel-state store

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::devices::{PartitionState, ZoneState};
use crate::event::{event_channel, EventReceiver, EventSender, StateEvent};

/// Panel clock captured from a date/time broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelClock {
    pub panel_datetime: NaiveDateTime,
    pub synced_at: DateTime<Utc>,
}

impl PanelClock {
    /// The panel's current wall-clock time, advanced from the last sync.
    pub fn now(&self, at: DateTime<Utc>) -> NaiveDateTime {
        self.panel_datetime + (at - self.synced_at)
    }
}

/// Everything known about one connected panel.
#[derive(Debug, Clone, Default)]
pub struct SessionPanelState {
    pub session_id: String,
    pub name: Option<String>,
    pub software_version: Option<String>,
    pub clock: Option<PanelClock>,
    pub partitions: BTreeMap<u8, PartitionState>,
    pub zones: BTreeMap<u16, ZoneState>,
}

impl SessionPanelState {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Panel {}", self.session_id))
    }
}

/// Concurrent store of per-session partition and zone records.
///
/// Every update stamps `last_updated` and emits a typed change event.
/// Partition and zone entries are created lazily on the first
/// notification referencing them and live for the life of the session.
pub struct PanelStateStore {
    sessions: RwLock<HashMap<String, SessionPanelState>>,
    event_tx: EventSender,
}

impl PanelStateStore {
    pub fn new() -> Self {
        let (event_tx, _) = event_channel(256);
        Self {
            sessions: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    /// Subscribe to the change-event stream.
    pub fn subscribe(&self) -> EventReceiver {
        self.event_tx.subscribe()
    }

    /// Sender half of the change-event channel, shared with the session
    /// registry for connect/disconnect events.
    pub fn event_sender(&self) -> EventSender {
        self.event_tx.clone()
    }

    /// Create the state slot for a newly connected session.
    pub async fn create_session(&self, session_id: &str) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionPanelState::new(session_id.to_string()));
        debug!(session_id, "Panel state created");
    }

    /// Drop a session's state when its link closes.
    pub async fn remove_session(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
        debug!(session_id, "Panel state removed");
    }

    /// Snapshot of one session's full state.
    pub async fn session(&self, session_id: &str) -> Option<SessionPanelState> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Snapshot of every session, ordered by id.
    pub async fn list_sessions(&self) -> Vec<SessionPanelState> {
        let mut out: Vec<_> = self.sessions.read().await.values().cloned().collect();
        out.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        out
    }

    pub async fn partition(&self, session_id: &str, number: u8) -> Option<PartitionState> {
        self.sessions
            .read()
            .await
            .get(session_id)?
            .partitions
            .get(&number)
            .cloned()
    }

    pub async fn zone(&self, session_id: &str, number: u16) -> Option<ZoneState> {
        self.sessions
            .read()
            .await
            .get(session_id)?
            .zones
            .get(&number)
            .cloned()
    }

    /// Mutate a partition (creating it on first reference), stamp it and
    /// publish the change.
    pub async fn update_partition<F>(&self, session_id: &str, number: u8, mutate: F)
    where
        F: FnOnce(&mut PartitionState),
    {
        let updated = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .entry(session_id.to_string())
                .or_insert_with(|| SessionPanelState::new(session_id.to_string()));
            let partition = session
                .partitions
                .entry(number)
                .or_insert_with(|| PartitionState::new(number));
            mutate(partition);
            partition.last_updated = Utc::now();
            partition.clone()
        };
        let _ = self.event_tx.send(StateEvent::PartitionStateChanged {
            session_id: session_id.to_string(),
            partition: updated,
        });
    }

    /// Mutate a zone (creating it on first reference), stamp it and
    /// publish the change.
    pub async fn update_zone<F>(&self, session_id: &str, number: u16, mutate: F)
    where
        F: FnOnce(&mut ZoneState),
    {
        let updated = {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .entry(session_id.to_string())
                .or_insert_with(|| SessionPanelState::new(session_id.to_string()));
            let zone = session
                .zones
                .entry(number)
                .or_insert_with(|| ZoneState::new(number));
            mutate(zone);
            zone.last_updated = Utc::now();
            zone.clone()
        };
        let _ = self.event_tx.send(StateEvent::ZoneStateChanged {
            session_id: session_id.to_string(),
            zone: updated,
        });
    }

    /// Mutate session-level fields and publish the change.
    pub async fn update_session<F>(&self, session_id: &str, mutate: F)
    where
        F: FnOnce(&mut SessionPanelState),
    {
        {
            let mut sessions = self.sessions.write().await;
            let session = sessions
                .entry(session_id.to_string())
                .or_insert_with(|| SessionPanelState::new(session_id.to_string()));
            mutate(session);
        }
        let _ = self.event_tx.send(StateEvent::SessionStateChanged {
            session_id: session_id.to_string(),
        });
    }

    /// Record a panel clock broadcast.
    pub async fn sync_clock(&self, session_id: &str, panel_datetime: NaiveDateTime) {
        self.update_session(session_id, |s| {
            s.clock = Some(PanelClock {
                panel_datetime,
                synced_at: Utc::now(),
            });
        })
        .await;
    }
}

impl Default for PanelStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_lazy_partition_creation() {
        let store = PanelStateStore::new();
        store.create_session("123456789012").await;
        assert!(store.partition("123456789012", 1).await.is_none());

        store
            .update_partition("123456789012", 1, |p| p.is_ready = true)
            .await;
        let part = store.partition("123456789012", 1).await.unwrap();
        assert_eq!(part.number, 1);
        assert!(part.is_ready);
    }

    #[tokio::test]
    async fn test_update_emits_event() {
        let store = PanelStateStore::new();
        let mut rx = store.subscribe();
        store.create_session("123456789012").await;
        store.update_zone("123456789012", 65, |z| z.is_open = true).await;

        let event = rx.recv().await.unwrap();
        let StateEvent::ZoneStateChanged { session_id, zone } = event else {
            panic!("expected zone change");
        };
        assert_eq!(session_id, "123456789012");
        assert_eq!(zone.number, 65);
        assert!(zone.is_open);
        // Lazily created zone gets the banked default partition.
        assert_eq!(zone.partitions, vec![2]);
    }

    #[tokio::test]
    async fn test_session_removal() {
        let store = PanelStateStore::new();
        store.create_session("111111111111").await;
        store.update_partition("111111111111", 1, |_| {}).await;
        store.remove_session("111111111111").await;
        assert!(store.session("111111111111").await.is_none());
    }

    #[tokio::test]
    async fn test_list_sessions_sorted() {
        let store = PanelStateStore::new();
        store.create_session("222222222222").await;
        store.create_session("111111111111").await;
        let list = store.list_sessions().await;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].session_id, "111111111111");
    }

    #[test]
    fn test_panel_clock_advances() {
        let panel_dt = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let synced_at = Utc::now();
        let clock = PanelClock {
            panel_datetime: panel_dt,
            synced_at,
        };
        let later = synced_at + chrono::Duration::seconds(90);
        assert_eq!(clock.now(later), panel_dt + chrono::Duration::seconds(90));
    }
}
