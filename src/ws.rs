// MIT License - Copyright (c) 2026 Peter Wright
// WebSocket facade for UI clients

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::devices::ArmingStatus;
use crate::error::Result;
use crate::event::StateEvent;
use crate::messages::records::ArmMode;
use crate::messages::{MessageRecord, PartitionArm, PartitionDisarm};
use crate::state::{PanelStateStore, SessionPanelState};
use crate::transport::registry::SessionRegistry;

/// Requests a UI client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    GetFullState,
    ArmAway {
        session_id: String,
        partition_number: u8,
        code: Option<String>,
    },
    ArmHome {
        session_id: String,
        partition_number: u8,
        code: Option<String>,
    },
    ArmNight {
        session_id: String,
        partition_number: u8,
        code: Option<String>,
    },
    Disarm {
        session_id: String,
        partition_number: u8,
        code: Option<String>,
    },
}

/// Messages pushed to UI clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    FullState {
        sessions: Vec<SessionDto>,
    },
    PartitionUpdate {
        session_id: String,
        partition_number: u8,
        status: ArmingStatus,
    },
    ZoneUpdate {
        session_id: String,
        zone_number: u16,
        open: bool,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDto {
    pub session_id: String,
    pub name: String,
    pub partitions: Vec<PartitionDto>,
    pub zones: Vec<ZoneDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionDto {
    pub partition_number: u8,
    pub name: String,
    pub status: ArmingStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneDto {
    pub zone_number: u16,
    pub name: String,
    pub device_class: String,
    pub open: bool,
    pub partitions: Vec<u8>,
}

/// Build the DTO for one session snapshot.
pub fn session_dto(session: &SessionPanelState, device_class: &str) -> SessionDto {
    SessionDto {
        session_id: session.session_id.clone(),
        name: session.display_name(),
        partitions: session
            .partitions
            .values()
            .map(|p| PartitionDto {
                partition_number: p.number,
                name: p.display_name(),
                status: p.effective_status(),
            })
            .collect(),
        zones: session
            .zones
            .values()
            .map(|z| ZoneDto {
                zone_number: z.number,
                name: z.display_name(),
                device_class: device_class.to_string(),
                open: z.is_open,
                partitions: z.partitions.clone(),
            })
            .collect(),
    }
}

/// WebSocket facade server. State is pulled by clients (`get_full_state`)
/// and pushed as broadcast `partition_update` / `zone_update` deltas.
pub struct WsServer {
    config: Arc<BridgeConfig>,
    registry: Arc<SessionRegistry>,
    store: Arc<PanelStateStore>,
}

impl WsServer {
    pub fn new(
        config: Arc<BridgeConfig>,
        registry: Arc<SessionRegistry>,
        store: Arc<PanelStateStore>,
    ) -> Self {
        Self {
            config,
            registry,
            store,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.ws_address, self.config.ws_port);
        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, "WebSocket facade listening");

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "WebSocket accept failed");
                    continue;
                }
            };
            debug!(%peer, "UI client connected");
            let client = WsClient {
                config: self.config.clone(),
                registry: self.registry.clone(),
                store: self.store.clone(),
            };
            tokio::spawn(async move {
                if let Err(e) = client.handle(stream).await {
                    debug!(%peer, error = %e, "UI client closed: {e}");
                }
            });
        }
    }
}

struct WsClient {
    config: Arc<BridgeConfig>,
    registry: Arc<SessionRegistry>,
    store: Arc<PanelStateStore>,
}

impl WsClient {
    async fn handle(&self, stream: TcpStream) -> Result<()> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let (mut sink, mut source) = ws.split();

        // All writes to this client funnel through one channel so the
        // event forwarder and request handling cannot interleave frames.
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

        let writer = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let Ok(text) = serde_json::to_string(&message) else {
                    continue;
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        // Forward state changes; every connected client gets every
        // partition and zone update.
        let mut events = self.store.subscribe();
        let event_tx = out_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                let message = match event {
                    StateEvent::PartitionStateChanged {
                        session_id,
                        partition,
                    } => Some(ServerMessage::PartitionUpdate {
                        session_id,
                        partition_number: partition.number,
                        status: partition.effective_status(),
                    }),
                    StateEvent::ZoneStateChanged { session_id, zone } => {
                        Some(ServerMessage::ZoneUpdate {
                            session_id,
                            zone_number: zone.number,
                            open: zone.is_open,
                        })
                    }
                    _ => None,
                };
                if let Some(message) = message {
                    if event_tx.send(message).is_err() {
                        break;
                    }
                }
            }
        });

        // Request loop. State is not auto-sent on connect; clients ask.
        while let Some(frame) = source.next().await {
            let frame = match frame {
                Ok(f) => f,
                Err(_) => break,
            };
            match frame {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(request) => self.handle_request(request, &out_tx).await,
                    Err(e) => {
                        let _ = out_tx.send(ServerMessage::Error {
                            message: format!("invalid request: {e}"),
                        });
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }

        forwarder.abort();
        writer.abort();
        Ok(())
    }

    async fn handle_request(
        &self,
        request: ClientMessage,
        out_tx: &mpsc::UnboundedSender<ServerMessage>,
    ) {
        match request {
            ClientMessage::GetFullState => {
                let sessions = self
                    .store
                    .list_sessions()
                    .await
                    .iter()
                    .map(|s| session_dto(s, &self.config.zone_device_class))
                    .collect();
                let _ = out_tx.send(ServerMessage::FullState { sessions });
            }
            ClientMessage::ArmAway {
                session_id,
                partition_number,
                code,
            } => {
                self.arm(&session_id, partition_number, ArmMode::AwayArm, code, out_tx)
                    .await;
            }
            ClientMessage::ArmHome {
                session_id,
                partition_number,
                code,
            } => {
                self.arm(&session_id, partition_number, ArmMode::StayArm, code, out_tx)
                    .await;
            }
            ClientMessage::ArmNight {
                session_id,
                partition_number,
                code,
            } => {
                self.arm(&session_id, partition_number, ArmMode::NightArm, code, out_tx)
                    .await;
            }
            ClientMessage::Disarm {
                session_id,
                partition_number,
                code,
            } => {
                let record = MessageRecord::PartitionDisarm(PartitionDisarm {
                    partition: partition_number,
                    access_code: code.unwrap_or_default(),
                });
                self.send_command(&session_id, record, out_tx).await;
            }
        }
    }

    async fn arm(
        &self,
        session_id: &str,
        partition: u8,
        arm_mode: ArmMode,
        code: Option<String>,
        out_tx: &mpsc::UnboundedSender<ServerMessage>,
    ) {
        let record = MessageRecord::PartitionArm(PartitionArm {
            partition,
            arm_mode,
            access_code: code.unwrap_or_default(),
        });
        self.send_command(session_id, record, out_tx).await;
    }

    async fn send_command(
        &self,
        session_id: &str,
        record: MessageRecord,
        out_tx: &mpsc::UnboundedSender<ServerMessage>,
    ) {
        let result = match self.registry.get(session_id).await {
            Ok(handle) => handle.send_message(record).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(session_id, error = %e, "UI command failed");
            let _ = out_tx.send(ServerMessage::Error {
                message: e.to_string(),
            });
        }
    }
}
