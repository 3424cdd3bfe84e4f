// MIT License - Copyright (c) 2026 Peter Wright
// Command catalogue, registry and packet envelope

pub mod notifications;
pub mod records;

use std::fmt;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::{Result, TLinkError};

pub use notifications::*;
pub use records::*;

/// 16-bit wire command identifier, big-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command(pub u16);

impl Command {
    pub const CONNECTION_POLL: Command = Command(0x0500);
    pub const SIMPLE_ACK: Command = Command(0x0501);
    pub const COMMAND_RESPONSE: Command = Command(0x0502);
    pub const COMMAND_ERROR: Command = Command(0x0503);
    pub const COMMAND_REQUEST: Command = Command(0x0504);
    pub const MULTIPLE_MESSAGE: Command = Command(0x0521);
    pub const OPEN_SESSION: Command = Command(0x060A);
    pub const REQUEST_ACCESS: Command = Command(0x060E);

    pub const PARTITION_ARM: Command = Command(0x0401);
    pub const PARTITION_DISARM: Command = Command(0x0402);
    pub const ZONE_BYPASS: Command = Command(0x0403);
    pub const OUTPUT_CONTROL: Command = Command(0x0404);
    pub const TIME_DATE_BROADCAST_CONTROL: Command = Command(0x0405);

    pub const SOFTWARE_VERSION: Command = Command(0x0206);
    pub const EVENT_BUFFER: Command = Command(0x0210);
    pub const PARTITION_LABEL: Command = Command(0x0305);
    pub const ZONE_LABEL: Command = Command(0x0306);
    pub const ZONE_ASSIGNMENT: Command = Command(0x0307);

    pub const NOTIFY_ARM_DISARM: Command = Command(0x0810);
    pub const NOTIFY_PARTITION_READY: Command = Command(0x0811);
    pub const NOTIFY_EXIT_DELAY: Command = Command(0x0812);
    pub const NOTIFY_ENTRY_DELAY: Command = Command(0x0813);
    pub const NOTIFY_LIFESTYLE_ZONE: Command = Command(0x0814);
    pub const NOTIFY_ZONE_STATUS: Command = Command(0x0815);
    pub const NOTIFY_DATE_TIME: Command = Command(0x0816);
    pub const NOTIFY_PARTITION_ALARM: Command = Command(0x0817);
    pub const NOTIFY_TROUBLE: Command = Command(0x0818);
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match REGISTRY.iter().find(|s| s.command == *self) {
            Some(spec) => write!(f, "{} (0x{:04X})", spec.name, self.0),
            None => write!(f, "Unknown (0x{:04X})", self.0),
        }
    }
}

/// Acknowledgement pattern a record's exchange follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPattern {
    /// Record is answered with a bare `SimpleAck`.
    SimpleAck,
    /// Record is answered with a `CommandResponse`, which is then acked.
    CommandResponse,
    /// `CommandRequest` wrapper: completed by the requested record itself.
    CommandRequest,
}

/// Registry metadata for one known command.
#[derive(Debug, Clone, Copy)]
pub struct MessageSpec {
    pub command: Command,
    pub name: &'static str,
    /// Whether the envelope carries an application-sequence byte.
    pub app_sequence: bool,
    pub pattern: TransactionPattern,
    /// Whether the record may be originated by the integration side.
    pub is_public: bool,
}

/// Process-wide immutable command catalogue.
///
/// One entry per known command; duplicate codes are a startup error
/// (checked by [`verify_registry`]). Unknown inbound commands decode to
/// [`DefaultMessage`]; unknown outbound record types fail `NotRegistered`.
pub static REGISTRY: &[MessageSpec] = &[
    MessageSpec { command: Command::OPEN_SESSION, name: "OpenSession", app_sequence: false, pattern: TransactionPattern::SimpleAck, is_public: true },
    MessageSpec { command: Command::REQUEST_ACCESS, name: "RequestAccess", app_sequence: false, pattern: TransactionPattern::SimpleAck, is_public: true },
    MessageSpec { command: Command::CONNECTION_POLL, name: "ConnectionPoll", app_sequence: false, pattern: TransactionPattern::SimpleAck, is_public: true },
    MessageSpec { command: Command::SIMPLE_ACK, name: "SimpleAck", app_sequence: false, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::COMMAND_RESPONSE, name: "CommandResponse", app_sequence: false, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::COMMAND_ERROR, name: "CommandError", app_sequence: false, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::COMMAND_REQUEST, name: "CommandRequest", app_sequence: true, pattern: TransactionPattern::CommandRequest, is_public: true },
    MessageSpec { command: Command::MULTIPLE_MESSAGE, name: "MultipleMessagePacket", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::PARTITION_ARM, name: "PartitionArm", app_sequence: true, pattern: TransactionPattern::CommandResponse, is_public: true },
    MessageSpec { command: Command::PARTITION_DISARM, name: "PartitionDisarm", app_sequence: true, pattern: TransactionPattern::CommandResponse, is_public: true },
    MessageSpec { command: Command::ZONE_BYPASS, name: "ZoneBypass", app_sequence: true, pattern: TransactionPattern::CommandResponse, is_public: true },
    MessageSpec { command: Command::OUTPUT_CONTROL, name: "OutputControl", app_sequence: true, pattern: TransactionPattern::CommandResponse, is_public: true },
    MessageSpec { command: Command::TIME_DATE_BROADCAST_CONTROL, name: "TimeDateBroadcastControl", app_sequence: true, pattern: TransactionPattern::CommandResponse, is_public: true },
    MessageSpec { command: Command::SOFTWARE_VERSION, name: "SoftwareVersion", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::EVENT_BUFFER, name: "EventBuffer", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::PARTITION_LABEL, name: "PartitionLabel", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::ZONE_LABEL, name: "ZoneLabel", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::ZONE_ASSIGNMENT, name: "ZoneAssignment", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::NOTIFY_ARM_DISARM, name: "NotificationArmDisarm", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::NOTIFY_PARTITION_READY, name: "NotificationPartitionReadyStatus", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::NOTIFY_EXIT_DELAY, name: "NotificationExitDelay", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::NOTIFY_ENTRY_DELAY, name: "NotificationEntryDelay", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::NOTIFY_LIFESTYLE_ZONE, name: "NotificationLifestyleZoneStatus", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::NOTIFY_ZONE_STATUS, name: "NotificationZoneStatus", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::NOTIFY_DATE_TIME, name: "NotificationDateTimeBroadcast", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::NOTIFY_PARTITION_ALARM, name: "NotificationPartitionAlarm", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
    MessageSpec { command: Command::NOTIFY_TROUBLE, name: "NotificationTroubleStatus", app_sequence: true, pattern: TransactionPattern::SimpleAck, is_public: false },
];

/// Look up registry metadata for a wire command.
pub fn spec_for(command: Command) -> Option<&'static MessageSpec> {
    REGISTRY.iter().find(|s| s.command == command)
}

/// Panics when two registry entries share a command code. Called once at
/// server startup.
pub fn verify_registry() {
    for (i, a) in REGISTRY.iter().enumerate() {
        for b in &REGISTRY[i + 1..] {
            assert!(
                a.command != b.command,
                "duplicate command code 0x{:04X} ({} / {})",
                a.command.0,
                a.name,
                b.name
            );
        }
    }
}

/// Container whose payload is a concatenation of length-prefixed
/// sub-messages, each carrying its own command header. Sub-messages never
/// carry an app-sequence byte. A zero length byte ends the list (cipher
/// zero padding).
#[derive(Debug, Clone, PartialEq)]
pub struct MultipleMessage {
    pub messages: Vec<MessageRecord>,
}

impl MultipleMessage {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        for message in &self.messages {
            let mut sub = ByteWriter::new();
            sub.write_u16(message.command().0);
            message.encode_body(&mut sub)?;
            w.write_bytes_prefixed(&sub.into_bytes(), 1)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        let mut messages = Vec::new();
        while !r.is_empty() {
            let len = r.read_u8()? as usize;
            if len == 0 {
                break;
            }
            let sub_bytes = r.take(len)?;
            let mut sub = ByteReader::new(sub_bytes);
            let command = Command(sub.read_u16()?);
            messages.push(MessageRecord::decode_body(command, &mut sub)?);
        }
        Ok(Self { messages })
    }
}

/// Typed payload of one command: the tagged union every inbound packet
/// decodes into. Unknown commands land in [`MessageRecord::Unknown`].
#[derive(Debug, Clone, PartialEq)]
pub enum MessageRecord {
    OpenSession(OpenSession),
    RequestAccess(RequestAccess),
    SimpleAck(SimpleAck),
    CommandResponse(CommandResponse),
    CommandError(CommandError),
    CommandRequest(CommandRequest),
    ConnectionPoll(ConnectionPoll),
    Multiple(MultipleMessage),
    PartitionArm(PartitionArm),
    PartitionDisarm(PartitionDisarm),
    ZoneBypass(ZoneBypass),
    OutputControl(OutputControl),
    TimeDateBroadcastControl(TimeDateBroadcastControl),
    SoftwareVersion(SoftwareVersion),
    EventBuffer(EventBuffer),
    PartitionLabel(PartitionLabel),
    ZoneLabel(ZoneLabel),
    ZoneAssignment(ZoneAssignment),
    ArmDisarm(NotificationArmDisarm),
    PartitionReadyStatus(NotificationPartitionReadyStatus),
    ExitDelay(NotificationExitDelay),
    EntryDelay(NotificationEntryDelay),
    LifestyleZoneStatus(NotificationLifestyleZoneStatus),
    ZoneStatus(NotificationZoneStatus),
    DateTimeBroadcast(NotificationDateTimeBroadcast),
    PartitionAlarm(NotificationPartitionAlarm),
    TroubleStatus(NotificationTroubleStatus),
    Unknown(DefaultMessage),
}

impl MessageRecord {
    /// The wire command this record serialises under.
    pub fn command(&self) -> Command {
        match self {
            Self::OpenSession(_) => Command::OPEN_SESSION,
            Self::RequestAccess(_) => Command::REQUEST_ACCESS,
            Self::SimpleAck(_) => Command::SIMPLE_ACK,
            Self::CommandResponse(_) => Command::COMMAND_RESPONSE,
            Self::CommandError(_) => Command::COMMAND_ERROR,
            Self::CommandRequest(_) => Command::COMMAND_REQUEST,
            Self::ConnectionPoll(_) => Command::CONNECTION_POLL,
            Self::Multiple(_) => Command::MULTIPLE_MESSAGE,
            Self::PartitionArm(_) => Command::PARTITION_ARM,
            Self::PartitionDisarm(_) => Command::PARTITION_DISARM,
            Self::ZoneBypass(_) => Command::ZONE_BYPASS,
            Self::OutputControl(_) => Command::OUTPUT_CONTROL,
            Self::TimeDateBroadcastControl(_) => Command::TIME_DATE_BROADCAST_CONTROL,
            Self::SoftwareVersion(_) => Command::SOFTWARE_VERSION,
            Self::EventBuffer(_) => Command::EVENT_BUFFER,
            Self::PartitionLabel(_) => Command::PARTITION_LABEL,
            Self::ZoneLabel(_) => Command::ZONE_LABEL,
            Self::ZoneAssignment(_) => Command::ZONE_ASSIGNMENT,
            Self::ArmDisarm(_) => Command::NOTIFY_ARM_DISARM,
            Self::PartitionReadyStatus(_) => Command::NOTIFY_PARTITION_READY,
            Self::ExitDelay(_) => Command::NOTIFY_EXIT_DELAY,
            Self::EntryDelay(_) => Command::NOTIFY_ENTRY_DELAY,
            Self::LifestyleZoneStatus(_) => Command::NOTIFY_LIFESTYLE_ZONE,
            Self::ZoneStatus(_) => Command::NOTIFY_ZONE_STATUS,
            Self::DateTimeBroadcast(_) => Command::NOTIFY_DATE_TIME,
            Self::PartitionAlarm(_) => Command::NOTIFY_PARTITION_ALARM,
            Self::TroubleStatus(_) => Command::NOTIFY_TROUBLE,
            Self::Unknown(d) => d.command,
        }
    }

    /// Registry metadata for this record; `None` for unknown commands.
    pub fn spec(&self) -> Option<&'static MessageSpec> {
        spec_for(self.command())
    }

    /// Acknowledgement, response and error records are consumed by
    /// pending transactions and never start an inbound exchange.
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Self::SimpleAck(_) | Self::CommandResponse(_) | Self::CommandError(_)
        )
    }

    pub fn encode_body(&self, w: &mut ByteWriter) -> Result<()> {
        match self {
            Self::OpenSession(m) => m.encode(w),
            Self::RequestAccess(m) => m.encode(w),
            Self::SimpleAck(m) => m.encode(w),
            Self::CommandResponse(m) => m.encode(w),
            Self::CommandError(m) => m.encode(w),
            Self::CommandRequest(m) => m.encode(w),
            Self::ConnectionPoll(m) => m.encode(w),
            Self::Multiple(m) => m.encode(w),
            Self::PartitionArm(m) => m.encode(w),
            Self::PartitionDisarm(m) => m.encode(w),
            Self::ZoneBypass(m) => m.encode(w),
            Self::OutputControl(m) => m.encode(w),
            Self::TimeDateBroadcastControl(m) => m.encode(w),
            Self::SoftwareVersion(m) => m.encode(w),
            Self::EventBuffer(m) => m.encode(w),
            Self::PartitionLabel(m) => m.encode(w),
            Self::ZoneLabel(m) => m.encode(w),
            Self::ZoneAssignment(m) => m.encode(w),
            Self::ArmDisarm(m) => m.encode(w),
            Self::PartitionReadyStatus(m) => m.encode(w),
            Self::ExitDelay(m) => m.encode(w),
            Self::EntryDelay(m) => m.encode(w),
            Self::LifestyleZoneStatus(m) => m.encode(w),
            Self::ZoneStatus(m) => m.encode(w),
            Self::DateTimeBroadcast(m) => m.encode(w),
            Self::PartitionAlarm(m) => m.encode(w),
            Self::TroubleStatus(m) => m.encode(w),
            Self::Unknown(m) => m.encode(w),
        }
    }

    pub fn decode_body(command: Command, r: &mut ByteReader) -> Result<Self> {
        Ok(match command {
            Command::OPEN_SESSION => Self::OpenSession(OpenSession::decode(r)?),
            Command::REQUEST_ACCESS => Self::RequestAccess(RequestAccess::decode(r)?),
            Command::SIMPLE_ACK => Self::SimpleAck(SimpleAck::decode(r)?),
            Command::COMMAND_RESPONSE => Self::CommandResponse(CommandResponse::decode(r)?),
            Command::COMMAND_ERROR => Self::CommandError(CommandError::decode(r)?),
            Command::COMMAND_REQUEST => Self::CommandRequest(CommandRequest::decode(r)?),
            Command::CONNECTION_POLL => Self::ConnectionPoll(ConnectionPoll::decode(r)?),
            Command::MULTIPLE_MESSAGE => Self::Multiple(MultipleMessage::decode(r)?),
            Command::PARTITION_ARM => Self::PartitionArm(PartitionArm::decode(r)?),
            Command::PARTITION_DISARM => Self::PartitionDisarm(PartitionDisarm::decode(r)?),
            Command::ZONE_BYPASS => Self::ZoneBypass(ZoneBypass::decode(r)?),
            Command::OUTPUT_CONTROL => Self::OutputControl(OutputControl::decode(r)?),
            Command::TIME_DATE_BROADCAST_CONTROL => {
                Self::TimeDateBroadcastControl(TimeDateBroadcastControl::decode(r)?)
            }
            Command::SOFTWARE_VERSION => Self::SoftwareVersion(SoftwareVersion::decode(r)?),
            Command::EVENT_BUFFER => Self::EventBuffer(EventBuffer::decode(r)?),
            Command::PARTITION_LABEL => Self::PartitionLabel(PartitionLabel::decode(r)?),
            Command::ZONE_LABEL => Self::ZoneLabel(ZoneLabel::decode(r)?),
            Command::ZONE_ASSIGNMENT => Self::ZoneAssignment(ZoneAssignment::decode(r)?),
            Command::NOTIFY_ARM_DISARM => Self::ArmDisarm(NotificationArmDisarm::decode(r)?),
            Command::NOTIFY_PARTITION_READY => {
                Self::PartitionReadyStatus(NotificationPartitionReadyStatus::decode(r)?)
            }
            Command::NOTIFY_EXIT_DELAY => Self::ExitDelay(NotificationExitDelay::decode(r)?),
            Command::NOTIFY_ENTRY_DELAY => Self::EntryDelay(NotificationEntryDelay::decode(r)?),
            Command::NOTIFY_LIFESTYLE_ZONE => {
                Self::LifestyleZoneStatus(NotificationLifestyleZoneStatus::decode(r)?)
            }
            Command::NOTIFY_ZONE_STATUS => Self::ZoneStatus(NotificationZoneStatus::decode(r)?),
            Command::NOTIFY_DATE_TIME => {
                Self::DateTimeBroadcast(NotificationDateTimeBroadcast::decode(r)?)
            }
            Command::NOTIFY_PARTITION_ALARM => {
                Self::PartitionAlarm(NotificationPartitionAlarm::decode(r)?)
            }
            Command::NOTIFY_TROUBLE => Self::TroubleStatus(NotificationTroubleStatus::decode(r)?),
            unknown => Self::Unknown(DefaultMessage::decode(unknown, r)?),
        })
    }
}

/// One decrypted packet payload: sequence bytes, optional app sequence,
/// and the typed record.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePacket {
    pub sender_seq: u8,
    pub receiver_seq: u8,
    pub app_seq: Option<u8>,
    pub message: MessageRecord,
}

impl MessagePacket {
    /// Serialise to a plaintext payload:
    /// `senderSeq receiverSeq commandHigh commandLow [appSeq] body`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let command = self.message.command();
        let spec = spec_for(command);
        if spec.is_none() && !matches!(self.message, MessageRecord::Unknown(_)) {
            return Err(TLinkError::NotRegistered {
                type_name: "unmapped record",
            });
        }

        let mut w = ByteWriter::new();
        w.write_u8(self.sender_seq);
        w.write_u8(self.receiver_seq);
        w.write_u16(command.0);
        if spec.is_some_and(|s| s.app_sequence) {
            w.write_u8(self.app_seq.unwrap_or(0));
        }
        self.message.encode_body(&mut w)?;
        Ok(w.into_bytes())
    }

    /// Parse a decrypted payload. Trailing bytes a record does not
    /// consume (block-cipher zero padding) are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(payload);
        let sender_seq = r.read_u8()?;
        let receiver_seq = r.read_u8()?;
        let command = Command(r.read_u16()?);
        let app_seq = match spec_for(command) {
            Some(spec) if spec.app_sequence => Some(r.read_u8()?),
            _ => None,
        };
        let message = MessageRecord::decode_body(command, &mut r)?;
        Ok(Self {
            sender_seq,
            receiver_seq,
            app_seq,
            message,
        })
    }
}
