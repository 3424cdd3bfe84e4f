// MIT License - Copyright (c) 2026 Peter Wright
// ITv2 protocol constants

/// Escape prefix for byte stuffing.
pub const ESCAPE: u8 = 0x7D;
/// Terminates the stuffed header, starts the payload.
pub const HEADER_TERMINATOR: u8 = 0x7E;
/// Terminates the packet.
pub const PACKET_TERMINATOR: u8 = 0x7F;

/// Escape code for a literal `0x7D`.
pub const ESCAPE_CODE_ESCAPE: u8 = 0x00;
/// Escape code for a literal `0x7E`.
pub const ESCAPE_CODE_HEADER: u8 = 0x01;
/// Escape code for a literal `0x7F`.
pub const ESCAPE_CODE_PACKET: u8 = 0x02;

/// AES block size in bytes; the handshake works in whole blocks.
pub const AES_BLOCK_SIZE: usize = 16;

/// Default TCP port panels dial out to.
pub const DEFAULT_PANEL_PORT: u16 = 3072;
/// Default WebSocket facade port.
pub const DEFAULT_WS_PORT: u16 = 8455;

/// Inbound quiet window before the flush gate releases, in milliseconds.
/// Communicators flush queued messages on reconnect and ignore our
/// sequence numbers until the burst drains.
pub const FLUSH_QUIET_MS: u64 = 2000;

/// Heartbeat interval in seconds. The panel drops idle links after
/// roughly two minutes, so poll just under that.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 100;

/// How long a sender waits for the per-session transaction lock.
pub const TRANSACTION_LOCK_TIMEOUT_SECS: u64 = 30;

/// How long the whole key-establishment handshake may take.
pub const HANDSHAKE_TIMEOUT_SECS: u64 = 30;

/// Transaction deadline for arm/disarm commands, in seconds.
pub const ARM_COMMAND_TIMEOUT_SECS: u64 = 5;
/// Transaction deadline for other command-pattern records, in seconds.
pub const COMMAND_TIMEOUT_SECS: u64 = 10;
/// Transaction deadline for outbound notifications awaiting ack, in seconds.
pub const NOTIFICATION_TIMEOUT_SECS: u64 = 5;

/// Number of decimal digits in the integration identification number.
pub const INTEGRATION_ID_DIGITS: usize = 12;
