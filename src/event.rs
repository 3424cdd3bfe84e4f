// MIT License - Copyright (c) 2026 Peter Wright
// Change-event stream

use crate::devices::{PartitionState, ZoneState};

/// All change events published by the bridge.
///
/// Subscribers receive a `tokio::sync::broadcast::Receiver<StateEvent>`
/// and must tolerate callbacks on arbitrary session tasks.
#[derive(Debug, Clone)]
pub enum StateEvent {
    /// A panel completed its handshake and was registered.
    SessionConnected { session_id: String },
    /// A panel link closed and was deregistered.
    SessionDisconnected { session_id: String },
    /// Session-level state changed (clock sync, version, name).
    SessionStateChanged { session_id: String },
    /// A partition's state changed.
    PartitionStateChanged {
        session_id: String,
        partition: PartitionState,
    },
    /// A zone's state changed.
    ZoneStateChanged {
        session_id: String,
        zone: ZoneState,
    },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<StateEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<StateEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
