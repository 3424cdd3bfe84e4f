// MIT License - Copyright (c) 2026 Peter Wright
// Unsolicited notification records

use bitflags::bitflags;
use chrono::NaiveDateTime;

use crate::codec::{ByteReader, ByteWriter};
use crate::error::Result;
use crate::messages::records::ArmMode;

/// A partition was armed or disarmed at the keypad or by another
/// integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationArmDisarm {
    pub partition: u8,
    pub arm_mode: ArmMode,
    /// User number, compact-encoded; 0 when not attributable.
    pub user: u16,
}

impl NotificationArmDisarm {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.partition);
        w.write_u8(self.arm_mode.to_wire());
        w.write_compact_unsigned(self.user as u64, 2);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            partition: r.read_u8()?,
            arm_mode: ArmMode::from_wire(r.read_u8()?),
            user: r.read_compact_unsigned(2)? as u16,
        })
    }
}

/// Partition readiness classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyStatus {
    NotReady,
    ReadyToArm,
    ReadyToForceArm,
    Other(u8),
}

impl ReadyStatus {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0x00 => Self::NotReady,
            0x01 => Self::ReadyToArm,
            0x02 => Self::ReadyToForceArm,
            other => Self::Other(other),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::NotReady => 0x00,
            Self::ReadyToArm => 0x01,
            Self::ReadyToForceArm => 0x02,
            Self::Other(b) => b,
        }
    }

    /// Whether this status means the partition can be armed.
    pub fn is_ready(self) -> bool {
        matches!(self, Self::ReadyToArm | Self::ReadyToForceArm)
    }
}

/// Partition readiness changed. Always implies the partition is disarmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPartitionReadyStatus {
    pub partition: u8,
    pub status: ReadyStatus,
}

impl NotificationPartitionReadyStatus {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.partition);
        w.write_u8(self.status.to_wire());
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            partition: r.read_u8()?,
            status: ReadyStatus::from_wire(r.read_u8()?),
        })
    }
}

bitflags! {
    /// Flag byte carried by exit/entry delay notifications.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DelayFlags: u8 {
        /// Delay countdown is running
        const ACTIVE    = 0x80;
        /// Keypad sounder annunciates the delay
        const AUDIBLE   = 0x01;
        /// Countdown restarted from the top
        const RESTARTED = 0x02;
        /// Final, faster portion of the countdown
        const URGENT    = 0x04;
    }
}

/// Exit-delay countdown started, restarted or ended on a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationExitDelay {
    pub partition: u8,
    pub flags: DelayFlags,
    /// Countdown length in seconds.
    pub duration: u16,
}

impl NotificationExitDelay {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.partition);
        w.write_u8(self.flags.bits());
        w.write_u16(self.duration);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            partition: r.read_u8()?,
            flags: DelayFlags::from_bits_retain(r.read_u8()?),
            duration: r.read_u16()?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.flags.contains(DelayFlags::ACTIVE)
    }
}

/// Entry-delay countdown on a partition. Surfaced as an event only; it
/// does not alter the stored arming status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEntryDelay {
    pub partition: u8,
    pub flags: DelayFlags,
    pub duration: u16,
}

impl NotificationEntryDelay {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.partition);
        w.write_u8(self.flags.bits());
        w.write_u16(self.duration);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            partition: r.read_u8()?,
            flags: DelayFlags::from_bits_retain(r.read_u8()?),
            duration: r.read_u16()?,
        })
    }
}

/// Open/closed classifier for lifestyle zone reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifestyleZoneStatus {
    Closed,
    Open,
    Other(u8),
}

impl LifestyleZoneStatus {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0x00 => Self::Closed,
            0x01 => Self::Open,
            other => Self::Other(other),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Closed => 0x00,
            Self::Open => 0x01,
            Self::Other(b) => b,
        }
    }
}

/// Lifestyle (activity) zone open/close report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationLifestyleZoneStatus {
    pub zone: u16,
    pub status: LifestyleZoneStatus,
}

impl NotificationLifestyleZoneStatus {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u16(self.zone);
        w.write_u8(self.status.to_wire());
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            zone: r.read_u16()?,
            status: LifestyleZoneStatus::from_wire(r.read_u8()?),
        })
    }
}

bitflags! {
    /// Full zone condition, packed into a 2-byte bit-field group.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ZoneConditionFlags: u16 {
        const OPEN            = 0x0001;
        const TAMPER          = 0x0002;
        const FAULT           = 0x0004;
        const LOW_BATTERY     = 0x0008;
        const DELINQUENT      = 0x0010;
        const ALARM           = 0x0020;
        const ALARM_IN_MEMORY = 0x0040;
        const BYPASSED        = 0x0080;
    }
}

/// Detailed zone condition report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationZoneStatus {
    pub zone: u16,
    pub condition: ZoneConditionFlags,
}

impl NotificationZoneStatus {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u16(self.zone);
        w.write_bitfield(self.condition.bits() as u32, 2)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            zone: r.read_u16()?,
            condition: ZoneConditionFlags::from_bits_retain(r.read_bitfield(2)? as u16),
        })
    }
}

/// Alarm classifier for partition alarm notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmType {
    Burglary,
    Fire,
    Panic,
    Medical,
    Duress,
    Tamper,
    Other(u8),
}

impl AlarmType {
    pub fn from_wire(value: u8) -> Self {
        match value {
            0x00 => Self::Burglary,
            0x01 => Self::Fire,
            0x02 => Self::Panic,
            0x03 => Self::Medical,
            0x04 => Self::Duress,
            0x05 => Self::Tamper,
            other => Self::Other(other),
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Self::Burglary => 0x00,
            Self::Fire => 0x01,
            Self::Panic => 0x02,
            Self::Medical => 0x03,
            Self::Duress => 0x04,
            Self::Tamper => 0x05,
            Self::Other(b) => b,
        }
    }
}

/// A partition went into alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPartitionAlarm {
    pub partition: u8,
    pub alarm_type: AlarmType,
    /// Zone that triggered, 0 when not zone-attributable.
    pub zone: u16,
}

impl NotificationPartitionAlarm {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.partition);
        w.write_u8(self.alarm_type.to_wire());
        w.write_u16(self.zone);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            partition: r.read_u8()?,
            alarm_type: AlarmType::from_wire(r.read_u8()?),
            zone: r.read_u16()?,
        })
    }
}

/// A trouble condition appeared or cleared on a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTroubleStatus {
    pub device: u8,
    pub trouble_type: u8,
    pub active: bool,
}

impl NotificationTroubleStatus {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u8(self.device);
        w.write_u8(self.trouble_type);
        w.write_u8(self.active as u8);
        Ok(())
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            device: r.read_u8()?,
            trouble_type: r.read_u8()?,
            active: r.read_u8()? != 0,
        })
    }
}

/// Periodic panel clock broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDateTimeBroadcast {
    pub timestamp: NaiveDateTime,
}

impl NotificationDateTimeBroadcast {
    pub fn encode(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_packed_datetime(self.timestamp)
    }

    pub fn decode(r: &mut ByteReader) -> Result<Self> {
        Ok(Self {
            timestamp: r.read_packed_datetime()?,
        })
    }
}
