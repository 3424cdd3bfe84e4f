// MIT License - Copyright (c) 2026 Peter Wright
// Session and command records

use crate::codec::{ByteReader, ByteWriter};
use crate::crypto::EncryptionType;
use crate::error::{NackCode, Result};
use crate::messages::Command;

/// First record on every link. Carries the panel's identity and the
/// encryption mode the session must negotiate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub device_type: u8,
    pub device_id: u16,
    pub software_version: u16,
    pub protocol_version: u16,
    /// Largest payload the peer will accept on this link.
    pub rx_buffer_size: u16,
    pub encryption_type: EncryptionType,
}

impl OpenSession {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.device_type);
        w.write_u16(self.device_id);
        w.write_u16(self.software_version);
        w.write_u16(self.protocol_version);
        w.write_u16(self.rx_buffer_size);
        w.write_u8(self.encryption_type as u8);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            device_type: r.read_u8()?,
            device_id: r.read_u16()?,
            software_version: r.read_u16()?,
            protocol_version: r.read_u16()?,
            rx_buffer_size: r.read_u16()?,
            encryption_type: EncryptionType::from_wire(r.read_u8()?),
        })
    }
}

/// Key-establishment record (§ encryption handshake). The initializer is
/// 48 bytes for Type 1 links, 16 bytes for Type 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestAccess {
    /// Peer identity digits, BCD with a byte-count prefix.
    pub identifier: String,
    pub initializer: Vec<u8>,
}

impl RequestAccess {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_bcd_prefixed(&self.identifier)?;
        w.write_bytes_prefixed(&self.initializer, 1)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            identifier: r.read_bcd_prefixed()?,
            initializer: r.read_bytes_prefixed(1)?,
        })
    }
}

/// Bare acknowledgement. No payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimpleAck;

impl SimpleAck {
    pub fn encode(&self, _w: &mut ByteWriter) -> Result<()> {
        Ok(())
    }

    pub fn decode(_r: &mut ByteReader) -> Result<Self> {
        Ok(Self)
    }
}

/// Explicit command outcome; `Success` or a nack classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResponse {
    pub code: NackCode,
}

impl CommandResponse {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.code.to_wire());
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            code: NackCode::from_wire(r.read_u8()?),
        })
    }
}

/// Panel-signalled failure for the in-flight exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandError {
    pub nack: NackCode,
}

impl CommandError {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.nack.to_wire());
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            nack: NackCode::from_wire(r.read_u8()?),
        })
    }
}

/// Asks the peer to produce the record identified by `requested_command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub requested_command: Command,
    pub data: Vec<u8>,
}

impl CommandRequest {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u16(self.requested_command.0);
        w.write_bytes_prefixed(&self.data, 1)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            requested_command: Command(r.read_u16()?),
            data: r.read_bytes_prefixed(1)?,
        })
    }
}

/// Keep-alive poll; defeats the panel's idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionPoll;

impl ConnectionPoll {
    pub fn encode(&self, _w: &mut ByteWriter) -> Result<()> {
        Ok(())
    }

    pub fn decode(_r: &mut ByteReader) -> Result<Self> {
        Ok(Self)
    }
}

/// Arming mode carried by arm commands and arm/disarm notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmMode {
    Disarm,
    AwayArm,
    AwayArmQuick,
    StayArm,
    StayArmQuick,
    NightArm,
    ArmWithNoEntryDelay,
    Other(u8),
}

impl ArmMode {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0x00 => Self::Disarm,
            0x01 => Self::AwayArm,
            0x02 => Self::AwayArmQuick,
            0x03 => Self::StayArm,
            0x04 => Self::StayArmQuick,
            0x05 => Self::NightArm,
            0x06 => Self::ArmWithNoEntryDelay,
            other => Self::Other(other),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Disarm => 0x00,
            Self::AwayArm => 0x01,
            Self::AwayArmQuick => 0x02,
            Self::StayArm => 0x03,
            Self::StayArmQuick => 0x04,
            Self::NightArm => 0x05,
            Self::ArmWithNoEntryDelay => 0x06,
            Self::Other(b) => b,
        }
    }
}

/// Arm one partition. An empty access code is sent as a zero-length BCD
/// string (quick-arm).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionArm {
    pub partition: u8,
    pub arm_mode: ArmMode,
    pub access_code: String,
}

impl PartitionArm {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.partition);
        w.write_u8(self.arm_mode.to_wire());
        w.write_bcd_prefixed(&self.access_code)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            partition: r.read_u8()?,
            arm_mode: ArmMode::from_wire(r.read_u8()?),
            access_code: r.read_bcd_prefixed()?,
        })
    }
}

/// Disarm one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDisarm {
    pub partition: u8,
    pub access_code: String,
}

impl PartitionDisarm {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.partition);
        w.write_bcd_prefixed(&self.access_code)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            partition: r.read_u8()?,
            access_code: r.read_bcd_prefixed()?,
        })
    }
}

/// Bypass or restore one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneBypass {
    pub zone: u16,
    pub bypassed: bool,
}

impl ZoneBypass {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u16(self.zone);
        w.write_u8(self.bypassed as u8);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            zone: r.read_u16()?,
            bypassed: r.read_u8()? != 0,
        })
    }
}

/// Drive a command output on or off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputControl {
    pub output: u8,
    pub active: bool,
}

impl OutputControl {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.output);
        w.write_u8(self.active as u8);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            output: r.read_u8()?,
            active: r.read_u8()? != 0,
        })
    }
}

/// Enable or disable the panel's periodic date/time broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeDateBroadcastControl {
    pub enabled: bool,
}

impl TimeDateBroadcastControl {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.enabled as u8);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            enabled: r.read_u8()? != 0,
        })
    }
}

/// Panel firmware identification, requested through `CommandRequest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
    pub description: String,
}

impl SoftwareVersion {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.major);
        w.write_u8(self.minor);
        w.write_u16(self.build);
        w.write_utf16_string(&self.description, 1)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            major: r.read_u8()?,
            minor: r.read_u8()?,
            build: r.read_u16()?,
            description: r.read_utf16_string(1)?,
        })
    }
}

/// Programmed label for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionLabel {
    pub partition: u8,
    pub label: String,
}

impl PartitionLabel {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.partition);
        w.write_utf16_string(&self.label, 1)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            partition: r.read_u8()?,
            label: r.read_utf16_string(1)?,
        })
    }
}

/// Programmed label for one zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneLabel {
    pub zone: u16,
    pub label: String,
}

impl ZoneLabel {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u16(self.zone);
        w.write_utf16_string(&self.label, 1)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            zone: r.read_u16()?,
            label: r.read_utf16_string(1)?,
        })
    }
}

/// Partitions a zone belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneAssignment {
    pub zone: u16,
    pub partitions: Vec<u8>,
}

impl ZoneAssignment {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u16(self.zone);
        w.write_bytes_prefixed(&self.partitions, 1)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            zone: r.read_u16()?,
            partitions: r.read_bytes_prefixed(1)?,
        })
    }
}

/// One historical event in the panel's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub timestamp: chrono::NaiveDateTime,
    pub event_type: u8,
    pub partition: u8,
    pub zone: u16,
}

impl EventRecord {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_packed_datetime(self.timestamp)?;
        w.write_u8(self.event_type);
        w.write_u8(self.partition);
        w.write_u16(self.zone);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            timestamp: r.read_packed_datetime()?,
            event_type: r.read_u8()?,
            partition: r.read_u8()?,
            zone: r.read_u16()?,
        })
    }
}

/// A page of the event buffer: a count-prefixed array of nested
/// [`EventRecord`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBuffer {
    pub events: Vec<EventRecord>,
}

impl EventBuffer {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.events.len() as u8);
        for event in &self.events {
            event.encode(w)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        let count = r.read_u8()? as usize;
        let mut events = Vec::with_capacity(count);
        for _ in 0..count {
            events.push(EventRecord::decode(r)?);
        }
        Ok(Self { events })
    }
}

/// Unknown command: the payload is kept verbatim, no more and no less.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultMessage {
    pub command: Command,
    pub raw: Vec<u8>,
}

impl DefaultMessage {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_bytes_remaining(&self.raw);
        Ok(())
    }

    pub fn decode(command: Command, r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            command,
            raw: r.read_bytes_remaining(),
        })
    }
}
