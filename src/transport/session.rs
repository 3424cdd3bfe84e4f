// MIT License - Copyright (c) 2026 Peter Wright
// One ITv2 session per accepted panel connection

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::constants::{
    ARM_COMMAND_TIMEOUT_SECS, COMMAND_TIMEOUT_SECS, HANDSHAKE_TIMEOUT_SECS,
    NOTIFICATION_TIMEOUT_SECS, TRANSACTION_LOCK_TIMEOUT_SECS,
};
use crate::crypto::{EncryptionHandler, EncryptionType};
use crate::dispatch::NotificationDispatcher;
use crate::error::{Result, TLinkError};
use crate::framer::{frame, Frame, Framer};
use crate::messages::{
    spec_for, Command, MessagePacket, MessageRecord, RequestAccess, SimpleAck,
    TransactionPattern,
};
use crate::transaction::{Offer, Transaction};
use crate::transport::registry::SessionRegistry;

/// Session-side state guarded by the per-session transaction lock.
///
/// All wire writes and all transaction mutation go through this struct,
/// so packet handling, transaction creation and outbound sequence
/// assignment always observe a consistent counter.
struct Inner {
    writer: OwnedWriteHalf,
    /// Wire header captured from the first inbound packet and re-used
    /// for every outbound packet.
    header: Option<Vec<u8>>,
    encryptor: Option<EncryptionHandler>,
    /// Our `senderSeq`; pre-incremented, so the first packet carries 1.
    local_seq: u8,
    /// Last observed peer `senderSeq`.
    remote_seq: u8,
    /// Application sequence, allocated for records that carry one.
    app_seq: u8,
    /// Largest payload the peer accepts, from its `OpenSession`.
    rx_buffer_size: Option<u16>,
    pending: Vec<Transaction>,
    closed: bool,
}

impl Inner {
    /// Assign sequences, serialise, encrypt, frame and write one record.
    /// Returns the `senderSeq` the packet went out with.
    async fn send_record(&mut self, record: MessageRecord) -> Result<u8> {
        let spec = match spec_for(record.command()) {
            Some(spec) => spec,
            None => {
                return Err(TLinkError::NotRegistered {
                    type_name: "unknown command",
                })
            }
        };

        self.local_seq = self.local_seq.wrapping_add(1);
        let app_seq = spec.app_sequence.then(|| {
            self.app_seq = self.app_seq.wrapping_add(1);
            self.app_seq
        });

        let packet = MessagePacket {
            sender_seq: self.local_seq,
            receiver_seq: self.remote_seq,
            app_seq,
            message: record,
        };
        let payload = packet.encode()?;
        let payload = match &self.encryptor {
            Some(e) => e.encrypt(&payload),
            None => payload,
        };
        if let Some(limit) = self.rx_buffer_size {
            if payload.len() > limit as usize {
                return Err(TLinkError::Encoding {
                    details: format!(
                        "payload of {} bytes exceeds the peer's buffer of {limit}",
                        payload.len()
                    ),
                });
            }
        }
        let header = self.header.as_deref().ok_or_else(|| TLinkError::Framing {
            details: "no header observed yet on this link".into(),
        })?;
        let wire = frame(header, &payload);
        self.writer.write_all(&wire).await?;
        Ok(self.local_seq)
    }

    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>> {
        match &self.encryptor {
            Some(e) => e.decrypt(payload),
            None => Ok(payload.to_vec()),
        }
    }

    fn abort_all(&mut self) {
        for txn in &mut self.pending {
            txn.abort();
        }
        self.pending.clear();
        self.closed = true;
    }
}

/// Cheap clonable handle for originating commands toward the panel.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: String,
    inner: Arc<Mutex<Inner>>,
    flush_gate: watch::Receiver<bool>,
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send a record and await the outcome of its transaction.
    ///
    /// Blocks on the flush gate first: communicators flush queued
    /// messages on reconnect and ignore our sequence numbers until the
    /// burst drains, so nothing is originated before the link goes
    /// quiet once.
    pub async fn send_message(&self, record: MessageRecord) -> Result<MessageRecord> {
        let mut gate = self.flush_gate.clone();
        gate.wait_for(|released| *released)
            .await
            .map_err(|_| TLinkError::Cancelled)?;

        let spec = spec_for(record.command()).ok_or(TLinkError::NotRegistered {
            type_name: "unknown command",
        })?;

        let rx = {
            let mut inner = timeout(
                Duration::from_secs(TRANSACTION_LOCK_TIMEOUT_SECS),
                self.inner.lock(),
            )
            .await
            .map_err(|_| TLinkError::LockTimeout)?;

            if inner.closed {
                return Err(TLinkError::Disconnected);
            }

            let seq = inner.send_record(record.clone()).await?;
            let (txn, rx) =
                Transaction::begin_outbound(record, spec.pattern, seq, deadline_for(spec.pattern, spec.command))?;
            inner.pending.push(txn);
            rx
        };

        // Await the result outside the lock.
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TLinkError::Cancelled),
        }
    }
}

/// Transaction deadlines by pattern; arm/disarm commands get the shorter
/// window because the UI is waiting on them.
fn deadline_for(pattern: TransactionPattern, command: Command) -> Option<Duration> {
    let secs = match pattern {
        TransactionPattern::SimpleAck => NOTIFICATION_TIMEOUT_SECS,
        TransactionPattern::CommandResponse => {
            if command == Command::PARTITION_ARM || command == Command::PARTITION_DISARM {
                ARM_COMMAND_TIMEOUT_SECS
            } else {
                COMMAND_TIMEOUT_SECS
            }
        }
        TransactionPattern::CommandRequest => COMMAND_TIMEOUT_SECS,
    };
    Some(Duration::from_secs(secs))
}

/// One panel link: drives the handshake, then the listen loop, the flush
/// gate and the heartbeat until the socket closes or a protocol-fatal
/// error occurs.
pub struct Session {
    config: Arc<BridgeConfig>,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl Session {
    pub fn new(
        config: Arc<BridgeConfig>,
        registry: Arc<SessionRegistry>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            config,
            registry,
            dispatcher,
        }
    }

    /// Run the session to completion. Consumes the connection.
    pub async fn run(self, stream: TcpStream) -> Result<()> {
        let peer = stream.peer_addr().ok();
        debug!(?peer, "Panel connection accepted");

        let (mut reader, writer) = stream.into_split();
        let mut framer = Framer::new();
        let inner = Arc::new(Mutex::new(Inner {
            writer,
            header: None,
            encryptor: None,
            local_seq: 0,
            remote_seq: 0,
            app_seq: 0,
            rx_buffer_size: None,
            pending: Vec::new(),
            closed: false,
        }));

        let (gate_tx, gate_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handshake = timeout(
            Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
            self.handshake(&mut reader, &mut framer, &inner),
        )
        .await
        .map_err(|_| TLinkError::Timeout {
            context: "handshake".into(),
        });

        let session_id = match handshake {
            Ok(Ok(id)) => id,
            Ok(Err(e)) | Err(e) => {
                warn!(?peer, error = %e, "Handshake failed");
                inner.lock().await.abort_all();
                return Err(e);
            }
        };

        let handle = SessionHandle {
            session_id: session_id.clone(),
            inner: inner.clone(),
            flush_gate: gate_rx,
        };

        if let Err(e) = self.registry.register(handle).await {
            inner.lock().await.abort_all();
            return Err(e);
        }
        self.dispatcher.store().create_session(&session_id).await;
        info!(%session_id, ?peer, "Panel session established");

        let result = self
            .listen(&session_id, &mut reader, &mut framer, &inner, &gate_tx, shutdown_rx)
            .await;

        // Shutdown: cancel the heartbeat, abort pending transactions,
        // close the transport, deregister.
        let _ = shutdown_tx.send(true);
        {
            let mut inner = inner.lock().await;
            inner.abort_all();
            let _ = inner.writer.shutdown().await;
        }
        self.registry.deregister(&session_id).await;
        self.dispatcher.store().remove_session(&session_id).await;
        info!(%session_id, "Panel session closed");

        result
    }

    /// Strict-order handshake:
    /// first packet (plaintext) carries the session id in its header and
    /// an `OpenSession` record; we ack it, echo it, configure the
    /// encryptor from its declared type, then exchange `RequestAccess`
    /// initializers.
    async fn handshake(
        &self,
        reader: &mut OwnedReadHalf,
        framer: &mut Framer,
        inner: &Arc<Mutex<Inner>>,
    ) -> Result<String> {
        let first = read_frame(reader, framer).await?;
        let session_id = String::from_utf8(first.header.clone()).map_err(|_| {
            TLinkError::ProtocolViolation {
                details: "packet header is not valid UTF-8".into(),
            }
        })?;

        let packet = MessagePacket::decode(&first.payload)?;
        let MessageRecord::OpenSession(open) = packet.message.clone() else {
            return Err(TLinkError::ProtocolViolation {
                details: format!("expected OpenSession, got {}", packet.message.command()),
            });
        };
        debug!(
            %session_id,
            rx_buffer = open.rx_buffer_size,
            encryption = ?open.encryption_type,
            "OpenSession received"
        );

        let encryptor = match open.encryption_type {
            EncryptionType::Type1 => EncryptionHandler::type1(
                self.config.type1_access_code.as_deref().ok_or_else(|| {
                    TLinkError::ProtocolViolation {
                        details: "panel requested Type 1 encryption but no Type 1 access code is configured".into(),
                    }
                })?,
                &self.config.type1_identifier(),
            )?,
            EncryptionType::Type2 => EncryptionHandler::type2(
                self.config.type2_access_code.as_deref().ok_or_else(|| {
                    TLinkError::ProtocolViolation {
                        details: "panel requested Type 2 encryption but no Type 2 access code is configured".into(),
                    }
                })?,
            )?,
            EncryptionType::None => {
                return Err(TLinkError::ProtocolViolation {
                    details: "cleartext sessions are not supported".into(),
                })
            }
        };

        {
            let mut inner = inner.lock().await;
            inner.header = Some(first.header);
            inner.remote_seq = packet.sender_seq;
            if open.rx_buffer_size > 0 {
                inner.rx_buffer_size = Some(open.rx_buffer_size);
            }

            // Inbound SimpleAck exchange for the OpenSession itself.
            inner.send_record(MessageRecord::SimpleAck(SimpleAck)).await?;

            // Echo the OpenSession back as our own outbound exchange.
            let echo = MessageRecord::OpenSession(open);
            let seq = inner.send_record(echo.clone()).await?;
            let (txn, _rx) = Transaction::begin_outbound(
                echo,
                TransactionPattern::SimpleAck,
                seq,
                Some(Duration::from_secs(NOTIFICATION_TIMEOUT_SECS)),
            )?;
            inner.pending.push(txn);

            inner.encryptor = Some(encryptor);
        }

        // Read until the peer's RequestAccess arrives; the ack of our
        // echo may come first.
        loop {
            let frame = read_frame(reader, framer).await?;
            let mut inner = inner.lock().await;
            let payload = inner.decrypt(&frame.payload)?;
            let packet = MessagePacket::decode(&payload)?;
            inner.remote_seq = packet.sender_seq;

            if offer_to_pending(&mut inner, &session_id, &self.dispatcher, &packet).await? {
                continue;
            }

            let MessageRecord::RequestAccess(access) = &packet.message else {
                return Err(TLinkError::ProtocolViolation {
                    details: format!("expected RequestAccess, got {}", packet.message.command()),
                });
            };
            debug!(%session_id, peer_identifier = %access.identifier, "RequestAccess received");

            let encryptor = inner.encryptor.as_mut().ok_or(TLinkError::CryptoCheck)?;
            encryptor.configure_outbound(&access.initializer)?;
            let initializer = encryptor.configure_inbound()?;

            let reply = MessageRecord::RequestAccess(RequestAccess {
                identifier: self.config.integration_id.clone(),
                initializer,
            });
            let seq = inner.send_record(reply.clone()).await?;
            let (txn, _rx) = Transaction::begin_outbound(
                reply,
                TransactionPattern::SimpleAck,
                seq,
                Some(Duration::from_secs(NOTIFICATION_TIMEOUT_SECS)),
            )?;
            inner.pending.push(txn);

            debug!(%session_id, "Key establishment complete");
            return Ok(session_id);
        }
    }

    /// Listen loop. The first two seconds of inbound quiet release the
    /// flush gate; from then on a heartbeat keeps the link alive.
    async fn listen(
        &self,
        session_id: &str,
        reader: &mut OwnedReadHalf,
        framer: &mut Framer,
        inner: &Arc<Mutex<Inner>>,
        gate_tx: &watch::Sender<bool>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        let quiet = Duration::from_millis(self.config.flush_quiet_ms);
        let mut heartbeat: Option<tokio::task::JoinHandle<()>> = None;

        let result = loop {
            let gate_open = *gate_tx.borrow();
            let frame = if gate_open {
                match read_frame(reader, framer).await {
                    Ok(f) => f,
                    Err(e) => break Err(e),
                }
            } else {
                match timeout(quiet, read_frame(reader, framer)).await {
                    Ok(Ok(f)) => f,
                    Ok(Err(e)) => break Err(e),
                    Err(_) => {
                        // Quiet window elapsed: the reconnect flush is
                        // over, sends may proceed and the heartbeat
                        // starts.
                        debug!(session_id, "Flush gate released");
                        let _ = gate_tx.send(true);
                        heartbeat = Some(spawn_heartbeat(
                            self.session_handle(session_id, inner, gate_tx),
                            Duration::from_secs(self.config.heartbeat_interval_secs),
                            shutdown_rx.clone(),
                        ));
                        continue;
                    }
                }
            };

            let mut guard = inner.lock().await;
            let payload = match guard.decrypt(&frame.payload) {
                Ok(p) => p,
                Err(e) => break Err(e),
            };
            let packet = match MessagePacket::decode(&payload) {
                Ok(p) => p,
                Err(e) => break Err(e),
            };
            guard.remote_seq = packet.sender_seq;

            match self.process_packet(&mut guard, session_id, packet).await {
                Ok(()) => {}
                Err(e) if e.is_session_fatal() => break Err(e),
                Err(e) => warn!(session_id, error = %e, "Error handling packet"),
            }
        };

        if let Some(task) = heartbeat {
            task.abort();
        }
        result
    }

    fn session_handle(
        &self,
        session_id: &str,
        inner: &Arc<Mutex<Inner>>,
        gate_tx: &watch::Sender<bool>,
    ) -> SessionHandle {
        SessionHandle {
            session_id: session_id.to_string(),
            inner: inner.clone(),
            flush_gate: gate_tx.subscribe(),
        }
    }

    /// Offer a packet to the pending transactions in insertion order;
    /// the first consumer wins. Unmatched packets start a new inbound
    /// exchange.
    async fn process_packet(
        &self,
        inner: &mut Inner,
        session_id: &str,
        packet: MessagePacket,
    ) -> Result<()> {
        if offer_to_pending(inner, session_id, &self.dispatcher, &packet).await? {
            return Ok(());
        }

        if packet.message.is_control() {
            debug!(
                session_id,
                command = %packet.message.command(),
                "Control record matched no transaction, dropping"
            );
            return Ok(());
        }

        let pattern = spec_for(packet.message.command())
            .map(|s| s.pattern)
            .unwrap_or(TransactionPattern::SimpleAck);
        let begin = Transaction::begin_inbound(
            packet.message.clone(),
            pattern,
            packet.sender_seq,
            Some(Duration::from_secs(COMMAND_TIMEOUT_SECS)),
        )?;

        let reply_seq = match begin.reply {
            Some(reply) => Some(inner.send_record(reply).await?),
            None => None,
        };
        if let Some(mut txn) = begin.transaction {
            if let Some(seq) = reply_seq {
                txn.note_reply_seq(seq);
            }
            inner.pending.push(txn);
        }
        if let Some(record) = begin.completed {
            self.dispatcher.dispatch(session_id, &record).await;
        }
        Ok(())
    }
}

/// Reap finished and expired transactions, then offer the packet to the
/// remainder in insertion order. Returns whether it was consumed.
async fn offer_to_pending(
    inner: &mut Inner,
    session_id: &str,
    dispatcher: &NotificationDispatcher,
    packet: &MessagePacket,
) -> Result<bool> {
    let now = Instant::now();
    inner.pending.retain_mut(|t| {
        t.expire_if_due(now);
        !t.is_done()
    });

    let mut consumed = None;
    for (i, txn) in inner.pending.iter_mut().enumerate() {
        match txn.offer(packet) {
            Offer::NotMine => continue,
            Offer::Consumed {
                reply,
                completed_inbound,
            } => {
                consumed = Some((i, reply, completed_inbound));
                break;
            }
        }
    }

    let Some((index, reply, completed)) = consumed else {
        return Ok(false);
    };

    if let Some(reply) = reply {
        let seq = inner.send_record(reply).await?;
        inner.pending[index].note_reply_seq(seq);
    }
    inner.pending.retain(|t| !t.is_done());

    if let Some(record) = completed {
        dispatcher.dispatch(session_id, &record).await;
    }
    Ok(true)
}

/// Read transport bytes until the framer yields a complete packet.
async fn read_frame(reader: &mut OwnedReadHalf, framer: &mut Framer) -> Result<Frame> {
    let mut buf = [0u8; 4096];
    loop {
        if let Some(frame) = framer.next_frame()? {
            return Ok(frame);
        }
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Err(TLinkError::Disconnected);
        }
        framer.extend(&buf[..n]);
    }
}

/// Periodic `ConnectionPoll` to defeat the panel's idle timeout.
fn spawn_heartbeat(
    handle: SessionHandle,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match handle
                        .send_message(MessageRecord::ConnectionPoll(crate::messages::ConnectionPoll))
                        .await
                    {
                        Ok(_) => debug!(session_id = handle.session_id(), "Heartbeat acked"),
                        Err(e) => {
                            warn!(session_id = handle.session_id(), error = %e, "Heartbeat failed");
                            break;
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    })
}
