// MIT License - Copyright (c) 2026 Peter Wright
// Concurrent map of active panel sessions

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, TLinkError};
use crate::event::{EventSender, StateEvent};
use crate::transport::session::SessionHandle;

/// Tracks every established session by its 12-digit integration
/// identifier and publishes connect/disconnect events.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    event_tx: EventSender,
}

impl SessionRegistry {
    pub fn new(event_tx: EventSender) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            event_tx,
        }
    }

    /// Register a session after handshake completion. A second link
    /// claiming an already-registered identifier is rejected.
    pub async fn register(&self, handle: SessionHandle) -> Result<()> {
        let session_id = handle.session_id().to_string();
        {
            let mut sessions = self.sessions.write().await;
            if sessions.contains_key(&session_id) {
                warn!(%session_id, "Duplicate session registration rejected");
                return Err(TLinkError::DuplicateSession { session_id });
            }
            sessions.insert(session_id.clone(), handle);
        }
        info!(%session_id, "Session registered");
        let _ = self
            .event_tx
            .send(StateEvent::SessionConnected { session_id });
        Ok(())
    }

    /// Deregister on shutdown.
    pub async fn deregister(&self, session_id: &str) {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(session_id, "Session deregistered");
            let _ = self.event_tx.send(StateEvent::SessionDisconnected {
                session_id: session_id.to_string(),
            });
        }
    }

    /// Look up a session for command dispatch.
    pub async fn get(&self, session_id: &str) -> Result<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| TLinkError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
