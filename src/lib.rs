// MIT License - Copyright (c) 2026 Peter Wright
//
//! # dsc-tlink-bridge
//!
//! Server-side bridge for DSC PowerSeries NEO alarm panels speaking the
//! ITv2 (TLink) protocol over TCP.
//!
//! Panels dial out to the bridge; each accepted connection carries one
//! long-lived, encrypted, framed, sequenced message exchange. The bridge
//! decodes inbound messages into typed records, updates its in-memory
//! panel model (sessions → partitions → zones), publishes a change-event
//! stream, and can originate arm/disarm and query commands toward the
//! panel. A WebSocket facade exposes the state to UI clients.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use dsc_tlink_bridge::{
//!     BridgeConfig, NotificationDispatcher, PanelServer, PanelStateStore, SessionRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(
//!         BridgeConfig::builder()
//!             .integration_id("123456789012")
//!             .type1_access_code("12345678")
//!             .build(),
//!     );
//!
//!     let store = Arc::new(PanelStateStore::new());
//!     let registry = Arc::new(SessionRegistry::new(store.event_sender()));
//!     let dispatcher = Arc::new(NotificationDispatcher::new(store.clone()));
//!
//!     let mut events = store.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     PanelServer::new(config, registry, dispatcher).run().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod framer;
pub mod messages;
pub mod state;
pub mod transaction;
pub mod transport;
pub mod ws;

// Re-exports for convenience
pub use config::{BridgeConfig, BridgeConfigBuilder};
pub use crypto::{EncryptionHandler, EncryptionType};
pub use devices::{ArmingStatus, ExitDelay, PartitionState, ZoneState};
pub use dispatch::NotificationDispatcher;
pub use error::{NackCode, Result, TLinkError};
pub use event::{EventReceiver, EventSender, StateEvent};
pub use messages::{Command, MessagePacket, MessageRecord, TransactionPattern};
pub use state::{PanelStateStore, SessionPanelState};
pub use transport::{PanelServer, SessionHandle, SessionRegistry};
pub use ws::WsServer;
