// MIT License - Copyright (c) 2026 Peter Wright
// Error taxonomy and panel nack codes

use std::fmt;

/// Error classifiers returned by the panel in a `CommandError` record or a
/// non-success `CommandResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NackCode {
    /// 0x00 — command accepted (never surfaces as an error)
    Success,
    /// 0x01 — command code not recognised by the panel
    UnknownCommand,
    /// 0x02 — payload failed the panel's validation
    InvalidData,
    /// 0x03 — access code rejected
    InvalidAccessCode,
    /// 0x04 — partition out of range or not enabled
    InvalidPartition,
    /// 0x05 — zone out of range or not enabled
    InvalidZone,
    /// 0x06 — partition not ready to arm
    NotReady,
    /// 0x07 — command refused in the current arming state
    WrongArmState,
    /// 0x08 — panel busy, retry later
    Busy,
    /// 0x09 — feature not enabled on this panel
    NotSupported,
    /// 0x0A — request sequence error
    SequenceError,
    /// Any other classifier byte
    Other(u8),
}

impl NackCode {
    /// Parse the classifier byte from a `CommandError` / `CommandResponse`.
    pub fn from_wire(value: u8) -> Self {
        match value {
            0x00 => Self::Success,
            0x01 => Self::UnknownCommand,
            0x02 => Self::InvalidData,
            0x03 => Self::InvalidAccessCode,
            0x04 => Self::InvalidPartition,
            0x05 => Self::InvalidZone,
            0x06 => Self::NotReady,
            0x07 => Self::WrongArmState,
            0x08 => Self::Busy,
            0x09 => Self::NotSupported,
            0x0A => Self::SequenceError,
            other => Self::Other(other),
        }
    }

    /// The classifier byte as carried on the wire.
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::UnknownCommand => 0x01,
            Self::InvalidData => 0x02,
            Self::InvalidAccessCode => 0x03,
            Self::InvalidPartition => 0x04,
            Self::InvalidZone => 0x05,
            Self::NotReady => 0x06,
            Self::WrongArmState => 0x07,
            Self::Busy => 0x08,
            Self::NotSupported => 0x09,
            Self::SequenceError => 0x0A,
            Self::Other(b) => b,
        }
    }

    /// Human-readable description of the nack code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::UnknownCommand => "Unknown command",
            Self::InvalidData => "Invalid data",
            Self::InvalidAccessCode => "Invalid access code",
            Self::InvalidPartition => "Invalid partition",
            Self::InvalidZone => "Invalid zone",
            Self::NotReady => "Partition not ready",
            Self::WrongArmState => "Wrong arming state",
            Self::Busy => "Panel busy",
            Self::NotSupported => "Not supported",
            Self::SequenceError => "Sequence error",
            Self::Other(_) => "Unrecognised nack code",
        }
    }
}

impl fmt::Display for NackCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(b) => write!(f, "0x{b:02X}: {}", self.description()),
            _ => write!(f, "0x{:02X}: {}", self.to_wire(), self.description()),
        }
    }
}

/// All errors that can occur in the bridge.
#[derive(Debug, thiserror::Error)]
pub enum TLinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Session shutting down")]
    Aborted,

    #[error("Transaction timeout: {context}")]
    Timeout { context: String },

    #[error("Timed out waiting for the transaction lock")]
    LockTimeout,

    #[error("Peer disconnected")]
    Disconnected,

    #[error("Framing error: {details}")]
    Framing { details: String },

    #[error("Encoding error: {details}")]
    Encoding { details: String },

    #[error("CRC failure")]
    CrcFailure,

    #[error("Unexpected response while {state}")]
    UnexpectedResponse { state: &'static str },

    #[error("Panel refused command: {0}")]
    Nack(NackCode),

    #[error("Key establishment check failed")]
    CryptoCheck,

    #[error("Encryption already configured for this direction")]
    CryptoAlreadyConfigured,

    #[error("Invalid key material: {details}")]
    InvalidKeyMaterial { details: String },

    #[error("Record type not registered for sending: {type_name}")]
    NotRegistered { type_name: &'static str },

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Session already registered: {session_id}")]
    DuplicateSession { session_id: String },

    #[error("Protocol violation: {details}")]
    ProtocolViolation { details: String },

    #[error("Channel closed")]
    ChannelClosed,
}

impl TLinkError {
    /// Whether this error is fatal to the session that produced it.
    /// Fatal errors close the socket; the server keeps accepting new
    /// connections.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            TLinkError::Io(_)
                | TLinkError::Disconnected
                | TLinkError::Framing { .. }
                | TLinkError::Encoding { .. }
                | TLinkError::CrcFailure
                | TLinkError::CryptoCheck
                | TLinkError::ProtocolViolation { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TLinkError>;
