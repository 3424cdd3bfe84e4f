// MIT License - Copyright (c) 2026 Peter Wright
// Per-exchange acknowledgement state machines

use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{NackCode, Result, TLinkError};
use crate::messages::{
    CommandResponse, MessagePacket, MessageRecord, SimpleAck, TransactionPattern,
};

/// Which side started the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Outbound SimpleAck pattern: waiting for the peer's ack.
    AwaitingAck,
    /// Outbound CommandResponse pattern: waiting for the explicit response.
    AwaitingResponse,
    /// Inbound CommandResponse pattern: we sent `CommandResponse(Success)`
    /// and wait for the peer to ack it.
    AwaitingFinalAck,
    /// Outbound CommandRequest pattern: waiting for the requested record.
    AwaitingRequested,
    Done,
}

/// What a packet offer produced.
#[derive(Debug)]
pub enum Offer {
    /// Packet does not belong to this transaction.
    NotMine,
    /// Packet consumed. `reply` is a record the session must send;
    /// `completed_inbound` carries the finished result of an inbound
    /// exchange for dispatch.
    Consumed {
        reply: Option<MessageRecord>,
        completed_inbound: Option<MessageRecord>,
    },
}

/// Outcome of beginning an inbound exchange.
pub struct InboundBegin {
    /// Pending transaction, when the pattern needs further packets.
    pub transaction: Option<Transaction>,
    /// Record the session must send in reply.
    pub reply: Option<MessageRecord>,
    /// Completed result, for immediate dispatch.
    pub completed: Option<MessageRecord>,
}

/// One in-flight message exchange.
///
/// Transactions are plain state machines: they never touch the wire.
/// Packet offers return the records the session should send, which keeps
/// the session as the single owner of the transport and the sequence
/// counters.
pub struct Transaction {
    pattern: TransactionPattern,
    direction: Direction,
    initiating: MessageRecord,
    /// Inbound: the peer `senderSeq` captured at start.
    /// Outbound: our `localSeq` captured when the initiating packet was
    /// sent; responses echo it as `receiverSeq`.
    correlation_seq: u8,
    /// `localSeq` of the reply we sent for an inbound exchange; the
    /// peer's final ack echoes it.
    reply_seq: Option<u8>,
    /// CommandRequest pattern: the command that completes the exchange.
    requested: Option<crate::messages::Command>,
    deadline: Option<Instant>,
    state: State,
    result_tx: Option<oneshot::Sender<Result<MessageRecord>>>,
}

impl Transaction {
    /// Begin an outbound exchange for `record`. The session sends the
    /// record itself and passes the assigned sequence as
    /// `correlation_seq`. Returns the transaction and the handle the
    /// sender awaits.
    pub fn begin_outbound(
        record: MessageRecord,
        pattern: TransactionPattern,
        correlation_seq: u8,
        deadline: Option<Duration>,
    ) -> Result<(Self, oneshot::Receiver<Result<MessageRecord>>)> {
        let (tx, rx) = oneshot::channel();
        let (state, requested) = match pattern {
            TransactionPattern::SimpleAck => (State::AwaitingAck, None),
            TransactionPattern::CommandResponse => (State::AwaitingResponse, None),
            TransactionPattern::CommandRequest => {
                let MessageRecord::CommandRequest(req) = &record else {
                    return Err(TLinkError::ProtocolViolation {
                        details: "CommandRequest pattern requires a CommandRequest record".into(),
                    });
                };
                (State::AwaitingRequested, Some(req.requested_command))
            }
        };
        Ok((
            Self {
                pattern,
                direction: Direction::Outbound,
                initiating: record,
                correlation_seq,
                reply_seq: None,
                requested,
                deadline: deadline.map(|d| Instant::now() + d),
                state,
                result_tx: Some(tx),
            },
            rx,
        ))
    }

    /// Begin an inbound exchange for a packet no pending transaction
    /// claimed. SimpleAck-pattern records complete immediately; the
    /// CommandRequest pattern cannot be initiated by the peer.
    pub fn begin_inbound(
        record: MessageRecord,
        pattern: TransactionPattern,
        sender_seq: u8,
        deadline: Option<Duration>,
    ) -> Result<InboundBegin> {
        match pattern {
            TransactionPattern::SimpleAck => Ok(InboundBegin {
                transaction: None,
                reply: Some(MessageRecord::SimpleAck(SimpleAck)),
                completed: Some(record),
            }),
            TransactionPattern::CommandResponse => Ok(InboundBegin {
                transaction: Some(Self {
                    pattern,
                    direction: Direction::Inbound,
                    initiating: record,
                    correlation_seq: sender_seq,
                    reply_seq: None,
                    requested: None,
                    deadline: deadline.map(|d| Instant::now() + d),
                    state: State::AwaitingFinalAck,
                    result_tx: None,
                }),
                reply: Some(MessageRecord::CommandResponse(CommandResponse {
                    code: NackCode::Success,
                })),
                completed: None,
            }),
            TransactionPattern::CommandRequest => Err(TLinkError::ProtocolViolation {
                details: "peer attempted to initiate a CommandRequest exchange".into(),
            }),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn pattern(&self) -> TransactionPattern {
        self.pattern
    }

    pub fn initiating(&self) -> &MessageRecord {
        &self.initiating
    }

    /// Record the sequence assigned to the reply we sent, so the peer's
    /// ack of that reply correlates back here.
    pub fn note_reply_seq(&mut self, seq: u8) {
        self.reply_seq = Some(seq);
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    fn correlates(&self, packet: &MessagePacket) -> bool {
        match self.direction {
            Direction::Outbound => packet.receiver_seq == self.correlation_seq,
            Direction::Inbound => {
                packet.sender_seq == self.correlation_seq
                    || self.reply_seq.is_some_and(|s| packet.receiver_seq == s)
            }
        }
    }

    /// Offer an inbound packet. Correlated packets advance the state
    /// machine; everything else is `NotMine` so later transactions, or a
    /// fresh inbound exchange, can claim the packet.
    pub fn offer(&mut self, packet: &MessagePacket) -> Offer {
        if self.state == State::Done || !self.correlates(packet) {
            return Offer::NotMine;
        }

        match (self.state, &packet.message) {
            (State::AwaitingAck, MessageRecord::SimpleAck(_)) => {
                self.complete(Ok(packet.message.clone()));
                Offer::Consumed { reply: None, completed_inbound: None }
            }
            (State::AwaitingAck, MessageRecord::CommandError(e)) => {
                self.complete(Err(TLinkError::Nack(e.nack)));
                Offer::Consumed { reply: None, completed_inbound: None }
            }

            (State::AwaitingResponse, MessageRecord::CommandResponse(resp)) => {
                let result = if resp.code == NackCode::Success {
                    Ok(packet.message.clone())
                } else {
                    Err(TLinkError::Nack(resp.code))
                };
                self.complete(result);
                // The response is acked whether or not it reported success.
                Offer::Consumed {
                    reply: Some(MessageRecord::SimpleAck(SimpleAck)),
                    completed_inbound: None,
                }
            }
            (State::AwaitingResponse, MessageRecord::CommandError(e)) => {
                self.complete(Err(TLinkError::Nack(e.nack)));
                Offer::Consumed { reply: None, completed_inbound: None }
            }

            (State::AwaitingFinalAck, MessageRecord::SimpleAck(_)) => {
                let completed = self.initiating.clone();
                self.complete(Ok(completed.clone()));
                Offer::Consumed {
                    reply: None,
                    completed_inbound: Some(completed),
                }
            }
            (State::AwaitingFinalAck, MessageRecord::CommandError(e)) => {
                self.complete(Err(TLinkError::Nack(e.nack)));
                Offer::Consumed { reply: None, completed_inbound: None }
            }

            (State::AwaitingRequested, message) => match message {
                MessageRecord::CommandError(e) => {
                    self.complete(Err(TLinkError::Nack(e.nack)));
                    Offer::Consumed { reply: None, completed_inbound: None }
                }
                MessageRecord::SimpleAck(_) | MessageRecord::CommandResponse(_) => {
                    self.complete(Err(TLinkError::UnexpectedResponse {
                        state: "awaiting requested record",
                    }));
                    Offer::Consumed { reply: None, completed_inbound: None }
                }
                other if Some(other.command()) == self.requested => {
                    self.complete(Ok(other.clone()));
                    Offer::Consumed { reply: None, completed_inbound: None }
                }
                _ => Offer::NotMine,
            },

            // A correlated ack or response arriving in a state that does
            // not expect it aborts the exchange and swallows the packet.
            (_, MessageRecord::SimpleAck(_)) | (_, MessageRecord::CommandResponse(_)) => {
                self.complete(Err(TLinkError::UnexpectedResponse {
                    state: self.state_name(),
                }));
                Offer::Consumed { reply: None, completed_inbound: None }
            }

            _ => Offer::NotMine,
        }
    }

    fn state_name(&self) -> &'static str {
        match self.state {
            State::AwaitingAck => "awaiting ack",
            State::AwaitingResponse => "awaiting response",
            State::AwaitingFinalAck => "awaiting final ack",
            State::AwaitingRequested => "awaiting requested record",
            State::Done => "done",
        }
    }

    fn complete(&mut self, result: Result<MessageRecord>) {
        self.state = State::Done;
        if let Some(tx) = self.result_tx.take() {
            let _ = tx.send(result);
        }
    }

    /// Resolve with a timeout if the deadline has passed. Expired
    /// transactions stop correlating further packets.
    pub fn expire_if_due(&mut self, now: Instant) -> bool {
        if self.state == State::Done {
            return false;
        }
        if self.deadline.is_some_and(|d| now >= d) {
            debug!("Transaction deadline elapsed ({})", self.state_name());
            let context = self.state_name().to_string();
            self.complete(Err(TLinkError::Timeout { context }));
            true
        } else {
            false
        }
    }

    /// Abort on session shutdown.
    pub fn abort(&mut self) {
        if self.state != State::Done {
            self.complete(Err(TLinkError::Aborted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{
        Command, CommandError, CommandRequest, ConnectionPoll, PartitionArm, SoftwareVersion,
    };
    use crate::messages::records::ArmMode;

    fn packet(sender: u8, receiver: u8, message: MessageRecord) -> MessagePacket {
        MessagePacket {
            sender_seq: sender,
            receiver_seq: receiver,
            app_seq: None,
            message,
        }
    }

    fn arm_record() -> MessageRecord {
        MessageRecord::PartitionArm(PartitionArm {
            partition: 1,
            arm_mode: ArmMode::AwayArm,
            access_code: "1234".into(),
        })
    }

    #[test]
    fn test_outbound_simple_ack_completes_on_ack() {
        let record = MessageRecord::ConnectionPoll(ConnectionPoll);
        let (mut txn, mut rx) =
            Transaction::begin_outbound(record, TransactionPattern::SimpleAck, 7, None).unwrap();

        // Uncorrelated packet is ignored
        let other = packet(1, 3, MessageRecord::SimpleAck(SimpleAck));
        assert!(matches!(txn.offer(&other), Offer::NotMine));

        let ack = packet(1, 7, MessageRecord::SimpleAck(SimpleAck));
        assert!(matches!(txn.offer(&ack), Offer::Consumed { reply: None, .. }));
        assert!(txn.is_done());
        assert!(matches!(rx.try_recv().unwrap(), Ok(MessageRecord::SimpleAck(_))));
    }

    #[test]
    fn test_outbound_simple_ack_nacked() {
        let record = MessageRecord::ConnectionPoll(ConnectionPoll);
        let (mut txn, mut rx) =
            Transaction::begin_outbound(record, TransactionPattern::SimpleAck, 2, None).unwrap();
        let err = packet(
            1,
            2,
            MessageRecord::CommandError(CommandError { nack: NackCode::Busy }),
        );
        assert!(matches!(txn.offer(&err), Offer::Consumed { .. }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(TLinkError::Nack(NackCode::Busy))
        ));
    }

    #[test]
    fn test_outbound_command_response_success_then_ack() {
        let (mut txn, mut rx) =
            Transaction::begin_outbound(arm_record(), TransactionPattern::CommandResponse, 4, None)
                .unwrap();

        let resp = packet(
            9,
            4,
            MessageRecord::CommandResponse(CommandResponse { code: NackCode::Success }),
        );
        let Offer::Consumed { reply, .. } = txn.offer(&resp) else {
            panic!("expected consumption");
        };
        assert!(matches!(reply, Some(MessageRecord::SimpleAck(_))));
        assert!(txn.is_done());
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn test_outbound_command_response_nack_still_acked() {
        let (mut txn, mut rx) =
            Transaction::begin_outbound(arm_record(), TransactionPattern::CommandResponse, 4, None)
                .unwrap();
        let resp = packet(
            9,
            4,
            MessageRecord::CommandResponse(CommandResponse { code: NackCode::NotReady }),
        );
        let Offer::Consumed { reply, .. } = txn.offer(&resp) else {
            panic!("expected consumption");
        };
        assert!(matches!(reply, Some(MessageRecord::SimpleAck(_))));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(TLinkError::Nack(NackCode::NotReady))
        ));
    }

    #[test]
    fn test_outbound_command_response_unexpected_ack_aborts() {
        let (mut txn, mut rx) =
            Transaction::begin_outbound(arm_record(), TransactionPattern::CommandResponse, 4, None)
                .unwrap();
        let ack = packet(9, 4, MessageRecord::SimpleAck(SimpleAck));
        assert!(matches!(txn.offer(&ack), Offer::Consumed { .. }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(TLinkError::UnexpectedResponse { .. })
        ));
    }

    #[test]
    fn test_inbound_simple_ack_completes_immediately() {
        let record = MessageRecord::ConnectionPoll(ConnectionPoll);
        let begin =
            Transaction::begin_inbound(record.clone(), TransactionPattern::SimpleAck, 3, None)
                .unwrap();
        assert!(begin.transaction.is_none());
        assert!(matches!(begin.reply, Some(MessageRecord::SimpleAck(_))));
        assert_eq!(begin.completed, Some(record));
    }

    #[test]
    fn test_inbound_command_response_waits_for_ack() {
        let begin =
            Transaction::begin_inbound(arm_record(), TransactionPattern::CommandResponse, 3, None)
                .unwrap();
        let mut txn = begin.transaction.unwrap();
        assert!(matches!(
            begin.reply,
            Some(MessageRecord::CommandResponse(CommandResponse { code: NackCode::Success }))
        ));
        txn.note_reply_seq(5);

        // Peer acks our response, echoing the reply sequence.
        let ack = packet(4, 5, MessageRecord::SimpleAck(SimpleAck));
        let Offer::Consumed { completed_inbound, .. } = txn.offer(&ack) else {
            panic!("expected consumption");
        };
        assert_eq!(completed_inbound, Some(arm_record()));
        assert!(txn.is_done());
    }

    #[test]
    fn test_inbound_command_request_is_protocol_violation() {
        let record = MessageRecord::CommandRequest(CommandRequest {
            requested_command: Command::SOFTWARE_VERSION,
            data: vec![],
        });
        assert!(matches!(
            Transaction::begin_inbound(record, TransactionPattern::CommandRequest, 1, None),
            Err(TLinkError::ProtocolViolation { .. })
        ));
    }

    #[test]
    fn test_command_request_completes_on_requested_record() {
        let record = MessageRecord::CommandRequest(CommandRequest {
            requested_command: Command::SOFTWARE_VERSION,
            data: vec![],
        });
        let (mut txn, mut rx) =
            Transaction::begin_outbound(record, TransactionPattern::CommandRequest, 6, None)
                .unwrap();

        // A different record type does not complete the request
        let other = packet(2, 6, MessageRecord::ConnectionPoll(ConnectionPoll));
        assert!(matches!(txn.offer(&other), Offer::NotMine));

        let version = packet(
            3,
            6,
            MessageRecord::SoftwareVersion(SoftwareVersion {
                major: 1,
                minor: 4,
                build: 210,
                description: "HS2064".into(),
            }),
        );
        assert!(matches!(txn.offer(&version), Offer::Consumed { .. }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Ok(MessageRecord::SoftwareVersion(_))
        ));
    }

    #[test]
    fn test_command_request_aborted_by_error() {
        let record = MessageRecord::CommandRequest(CommandRequest {
            requested_command: Command::SOFTWARE_VERSION,
            data: vec![],
        });
        let (mut txn, mut rx) =
            Transaction::begin_outbound(record, TransactionPattern::CommandRequest, 6, None)
                .unwrap();
        let err = packet(
            3,
            6,
            MessageRecord::CommandError(CommandError { nack: NackCode::NotSupported }),
        );
        assert!(matches!(txn.offer(&err), Offer::Consumed { .. }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(TLinkError::Nack(NackCode::NotSupported))
        ));
    }

    #[test]
    fn test_deadline_expiry_stops_correlation() {
        let (mut txn, mut rx) = Transaction::begin_outbound(
            arm_record(),
            TransactionPattern::CommandResponse,
            4,
            Some(Duration::from_secs(0)),
        )
        .unwrap();
        assert!(txn.expire_if_due(Instant::now() + Duration::from_millis(1)));
        assert!(matches!(rx.try_recv().unwrap(), Err(TLinkError::Timeout { .. })));

        // Further packets no longer correlate
        let resp = packet(
            9,
            4,
            MessageRecord::CommandResponse(CommandResponse { code: NackCode::Success }),
        );
        assert!(matches!(txn.offer(&resp), Offer::NotMine));
    }

    #[test]
    fn test_abort_resolves_pending_result() {
        let (mut txn, mut rx) =
            Transaction::begin_outbound(arm_record(), TransactionPattern::CommandResponse, 1, None)
                .unwrap();
        txn.abort();
        assert!(matches!(rx.try_recv().unwrap(), Err(TLinkError::Aborted)));
    }
}
