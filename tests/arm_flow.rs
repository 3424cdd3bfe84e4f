// End-to-end exercise of the protocol engine against a scripted panel:
// handshake, key establishment, arm command round-trip, and state
// updates driven by notifications.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};

use dsc_tlink_bridge::crypto::{EncryptionHandler, EncryptionType};
use dsc_tlink_bridge::framer::{frame, Framer};
use dsc_tlink_bridge::messages::records::ArmMode;
use dsc_tlink_bridge::messages::{
    notifications::{
        DelayFlags, NotificationArmDisarm, NotificationExitDelay,
        NotificationPartitionReadyStatus, ReadyStatus,
    },
    records::{OpenSession, PartitionArm, RequestAccess, SimpleAck},
    MessagePacket, MessageRecord,
};
use dsc_tlink_bridge::transport::server::PanelServer;
use dsc_tlink_bridge::{
    ArmingStatus, BridgeConfig, NackCode, NotificationDispatcher, PanelStateStore,
    SessionRegistry,
};

const SESSION_ID: &str = "123456789012";
const ACCESS_CODE: &str = "000102030405060708090a0b0c0d0e0f";

/// Scripted panel speaking ITv2 from the far end of the socket.
struct TestPanel {
    stream: TcpStream,
    framer: Framer,
    crypto: EncryptionHandler,
    local_seq: u8,
    remote_seq: u8,
    app_seq: u8,
}

impl TestPanel {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self {
            stream,
            framer: Framer::new(),
            crypto: EncryptionHandler::type2(ACCESS_CODE).unwrap(),
            local_seq: 0,
            remote_seq: 0,
            app_seq: 0,
        }
    }

    async fn send(&mut self, message: MessageRecord) -> u8 {
        self.local_seq = self.local_seq.wrapping_add(1);
        let app_seq = message.spec().is_some_and(|s| s.app_sequence).then(|| {
            self.app_seq = self.app_seq.wrapping_add(1);
            self.app_seq
        });
        let packet = MessagePacket {
            sender_seq: self.local_seq,
            receiver_seq: self.remote_seq,
            app_seq,
            message,
        };
        let payload = self.crypto.encrypt(&packet.encode().unwrap());
        let wire = frame(SESSION_ID.as_bytes(), &payload);
        self.stream.write_all(&wire).await.unwrap();
        self.local_seq
    }

    async fn read_packet(&mut self) -> MessagePacket {
        let mut buf = [0u8; 4096];
        loop {
            if let Some(f) = self.framer.next_frame().unwrap() {
                let payload = self.crypto.decrypt(&f.payload).unwrap();
                let packet = MessagePacket::decode(&payload).unwrap();
                self.remote_seq = packet.sender_seq;
                return packet;
            }
            let n = self.stream.read(&mut buf).await.unwrap();
            assert_ne!(n, 0, "server closed the connection unexpectedly");
            self.framer.extend(&buf[..n]);
        }
    }

    /// Drive the handshake to completion: OpenSession exchange, then
    /// RequestAccess key establishment.
    async fn handshake(&mut self) {
        self.send(MessageRecord::OpenSession(OpenSession {
            device_type: 0x01,
            device_id: 0x0b42,
            software_version: 0x0104,
            protocol_version: 0x0202,
            rx_buffer_size: 1024,
            encryption_type: EncryptionType::Type2,
        }))
        .await;

        // Ack for our OpenSession, then the server's echo.
        let ack = self.read_packet().await;
        assert!(matches!(ack.message, MessageRecord::SimpleAck(_)));
        let echo = self.read_packet().await;
        let MessageRecord::OpenSession(echoed) = &echo.message else {
            panic!("expected OpenSession echo, got {:?}", echo.message);
        };
        assert_eq!(echoed.rx_buffer_size, 1024);

        // Sequence law: consecutive packets from the same peer without
        // an intervening packet from us increment senderSeq and repeat
        // receiverSeq.
        assert_eq!(ack.sender_seq, 1);
        assert_eq!(echo.sender_seq, ack.sender_seq.wrapping_add(1));
        assert_eq!(echo.receiver_seq, ack.receiver_seq);
        let echo_seq = echo.sender_seq;
        self.send_ack(echo_seq).await;

        // Key establishment: our initializer activates our inbound key;
        // the server's reply carries the initializer for our outbound.
        let initializer = self.crypto.configure_inbound().unwrap();
        self.send(MessageRecord::RequestAccess(RequestAccess {
            identifier: "00000b420042".into(),
            initializer,
        }))
        .await;

        let reply = self.read_packet().await;
        let MessageRecord::RequestAccess(access) = &reply.message else {
            panic!("expected RequestAccess reply, got {:?}", reply.message);
        };
        assert_eq!(access.identifier, SESSION_ID);
        self.crypto.configure_outbound(&access.initializer).unwrap();
        let reply_seq = reply.sender_seq;
        self.send_ack(reply_seq).await;
    }

    async fn send_ack(&mut self, receiver_seq: u8) {
        self.local_seq = self.local_seq.wrapping_add(1);
        let packet = MessagePacket {
            sender_seq: self.local_seq,
            receiver_seq,
            app_seq: None,
            message: MessageRecord::SimpleAck(SimpleAck),
        };
        let payload = self.crypto.encrypt(&packet.encode().unwrap());
        let wire = frame(SESSION_ID.as_bytes(), &payload);
        self.stream.write_all(&wire).await.unwrap();
    }
}

struct Harness {
    store: Arc<PanelStateStore>,
    registry: Arc<SessionRegistry>,
    addr: std::net::SocketAddr,
}

async fn start_bridge() -> Harness {
    let config = Arc::new(
        BridgeConfig::builder()
            .integration_id(SESSION_ID)
            .type2_access_code(ACCESS_CODE)
            // Short quiet window and a heartbeat that never fires keep
            // the test deterministic.
            .flush_quiet_ms(100)
            .heartbeat_interval_secs(3600)
            .build(),
    );
    let store = Arc::new(PanelStateStore::new());
    let registry = Arc::new(SessionRegistry::new(store.event_sender()));
    let dispatcher = Arc::new(NotificationDispatcher::new(store.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = PanelServer::new(config, registry.clone(), dispatcher);
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    Harness {
        store,
        registry,
        addr,
    }
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(Duration::from_secs(5), async {
        loop {
            if condition().await {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_handshake_registers_session() {
    let harness = start_bridge().await;
    let mut panel = TestPanel::connect(harness.addr).await;
    panel.handshake().await;

    let registry = harness.registry.clone();
    wait_until(|| {
        let registry = registry.clone();
        async move { registry.get(SESSION_ID).await.is_ok() }
    })
    .await;

    assert_eq!(harness.registry.session_ids().await, vec![SESSION_ID.to_string()]);
}

#[tokio::test]
async fn test_arm_flow_and_notifications() {
    let harness = start_bridge().await;
    let mut panel = TestPanel::connect(harness.addr).await;
    panel.handshake().await;

    let registry = harness.registry.clone();
    wait_until(|| {
        let registry = registry.clone();
        async move { registry.get(SESSION_ID).await.is_ok() }
    })
    .await;
    let handle = harness.registry.get(SESSION_ID).await.unwrap();

    // Dispatch the arm command; the handle blocks on the flush gate
    // until the link has gone quiet once.
    let arm_task = tokio::spawn(async move {
        handle
            .send_message(MessageRecord::PartitionArm(PartitionArm {
                partition: 1,
                arm_mode: ArmMode::AwayArm,
                access_code: "1234".into(),
            }))
            .await
    });

    // Panel receives the encrypted arm command.
    let packet = timeout(Duration::from_secs(5), panel.read_packet())
        .await
        .unwrap();
    let MessageRecord::PartitionArm(arm) = &packet.message else {
        panic!("expected PartitionArm, got {:?}", packet.message);
    };
    assert_eq!(arm.partition, 1);
    assert_eq!(arm.arm_mode, ArmMode::AwayArm);
    assert_eq!(arm.access_code, "1234");
    assert!(packet.app_seq.is_some());

    // Respond success; the bridge acks the response and the command
    // resolves.
    let command_seq = packet.sender_seq;
    panel
        .send(MessageRecord::CommandResponse(
            dsc_tlink_bridge::messages::records::CommandResponse {
                code: NackCode::Success,
            },
        ))
        .await;
    // The panel's CommandResponse correlates via receiver_seq.
    // send() used remote_seq which read_packet kept current.
    assert_eq!(panel.remote_seq, command_seq);

    let ack = timeout(Duration::from_secs(5), panel.read_packet())
        .await
        .unwrap();
    assert!(matches!(ack.message, MessageRecord::SimpleAck(_)));

    let result = timeout(Duration::from_secs(5), arm_task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok(), "arm command failed: {:?}", result);

    // The panel reports the arming; state follows.
    panel
        .send(MessageRecord::ArmDisarm(NotificationArmDisarm {
            partition: 1,
            arm_mode: ArmMode::AwayArm,
            user: 40,
        }))
        .await;
    let ack = timeout(Duration::from_secs(5), panel.read_packet())
        .await
        .unwrap();
    assert!(matches!(ack.message, MessageRecord::SimpleAck(_)));

    let store = harness.store.clone();
    wait_until(|| {
        let store = store.clone();
        async move {
            store
                .partition(SESSION_ID, 1)
                .await
                .is_some_and(|p| p.status == ArmingStatus::ArmedAway)
        }
    })
    .await;
}

#[tokio::test]
async fn test_exit_delay_preempted_by_ready() {
    let harness = start_bridge().await;
    let mut panel = TestPanel::connect(harness.addr).await;
    panel.handshake().await;

    // Exit delay starts: effective status reads as arming.
    panel
        .send(MessageRecord::ExitDelay(NotificationExitDelay {
            partition: 1,
            flags: DelayFlags::ACTIVE | DelayFlags::AUDIBLE,
            duration: 60,
        }))
        .await;
    let ack = timeout(Duration::from_secs(5), panel.read_packet())
        .await
        .unwrap();
    assert!(matches!(ack.message, MessageRecord::SimpleAck(_)));

    let store = harness.store.clone();
    wait_until(|| {
        let store = store.clone();
        async move {
            store
                .partition(SESSION_ID, 1)
                .await
                .is_some_and(|p| p.effective_status() == ArmingStatus::Arming)
        }
    })
    .await;

    // Ready status preempts: disarmed, ready, no exit delay.
    panel
        .send(MessageRecord::PartitionReadyStatus(
            NotificationPartitionReadyStatus {
                partition: 1,
                status: ReadyStatus::ReadyToArm,
            },
        ))
        .await;
    let ack = timeout(Duration::from_secs(5), panel.read_packet())
        .await
        .unwrap();
    assert!(matches!(ack.message, MessageRecord::SimpleAck(_)));

    let store = harness.store.clone();
    wait_until(|| {
        let store = store.clone();
        async move {
            store.partition(SESSION_ID, 1).await.is_some_and(|p| {
                p.status == ArmingStatus::Disarmed && p.is_ready && p.exit_delay.is_none()
            })
        }
    })
    .await;
}

#[tokio::test]
async fn test_session_deregistered_on_disconnect() {
    let harness = start_bridge().await;
    let mut panel = TestPanel::connect(harness.addr).await;
    panel.handshake().await;

    let registry = harness.registry.clone();
    wait_until(|| {
        let registry = registry.clone();
        async move { registry.get(SESSION_ID).await.is_ok() }
    })
    .await;

    drop(panel);

    let registry = harness.registry.clone();
    wait_until(|| {
        let registry = registry.clone();
        async move { registry.is_empty().await }
    })
    .await;
}
