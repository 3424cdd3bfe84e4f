// MIT License - Copyright (c) 2026 Peter Wright
// ITv2 byte-stuffed framing

use crate::constants::{
    ESCAPE, ESCAPE_CODE_ESCAPE, ESCAPE_CODE_HEADER, ESCAPE_CODE_PACKET, HEADER_TERMINATOR,
    PACKET_TERMINATOR,
};
use crate::error::{Result, TLinkError};

/// One reassembled packet: header and payload, both unstuffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Reassembles `header 0x7E payload 0x7F` packets from a byte stream and
/// emits stuffed packets for the transport.
///
/// The header is opaque at this layer. The first successfully read header
/// is cached and re-used for outbound packets on the same link.
#[derive(Debug, Default)]
pub struct Framer {
    buffer: Vec<u8>,
    cached_header: Option<Vec<u8>>,
}

impl Framer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header captured from the first inbound packet, if any.
    pub fn cached_header(&self) -> Option<&[u8]> {
        self.cached_header.as_deref()
    }

    /// Feed raw transport bytes into the reassembly buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next complete packet from the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed. The packet ends at
    /// the first unescaped `0x7F`; the header/payload boundary is the
    /// first unescaped `0x7E`. A second unescaped `0x7E` before the
    /// terminator is a framing error, as is a missing boundary.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut boundary: Option<usize> = None;
        let mut end: Option<usize> = None;

        let mut i = 0;
        while i < self.buffer.len() {
            match self.buffer[i] {
                ESCAPE => {
                    // Skip the escape code byte; incomplete pairs wait for
                    // more data, validity is checked during unstuffing.
                    if i + 1 >= self.buffer.len() {
                        return Ok(None);
                    }
                    i += 2;
                }
                HEADER_TERMINATOR => {
                    if boundary.is_some() {
                        return Err(TLinkError::Framing {
                            details: "header terminator inside payload".into(),
                        });
                    }
                    boundary = Some(i);
                    i += 1;
                }
                PACKET_TERMINATOR => {
                    end = Some(i);
                    break;
                }
                _ => i += 1,
            }
        }

        let Some(end) = end else {
            return Ok(None);
        };
        let Some(boundary) = boundary else {
            return Err(TLinkError::Framing {
                details: "packet terminator before header terminator".into(),
            });
        };

        let header = unstuff(&self.buffer[..boundary])?;
        let payload = unstuff(&self.buffer[boundary + 1..end])?;
        self.buffer.drain(..=end);

        if self.cached_header.is_none() {
            self.cached_header = Some(header.clone());
        }

        Ok(Some(Frame { header, payload }))
    }

    /// Stuff and frame an outbound payload using the cached header.
    pub fn write_frame(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let header = self.cached_header.as_deref().ok_or(TLinkError::Framing {
            details: "no header observed yet on this link".into(),
        })?;
        Ok(frame(header, payload))
    }
}

/// Apply the stuffing rule to a byte run.
pub fn stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    for &b in data {
        match b {
            ESCAPE => out.extend_from_slice(&[ESCAPE, ESCAPE_CODE_ESCAPE]),
            HEADER_TERMINATOR => out.extend_from_slice(&[ESCAPE, ESCAPE_CODE_HEADER]),
            PACKET_TERMINATOR => out.extend_from_slice(&[ESCAPE, ESCAPE_CODE_PACKET]),
            _ => out.push(b),
        }
    }
    out
}

/// Reverse the stuffing rule. `0x7D` followed by anything other than
/// `0x00`/`0x01`/`0x02` (or at end of input) is an encoding error.
pub fn unstuff(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b == ESCAPE {
            let Some(&code) = data.get(i + 1) else {
                return Err(TLinkError::Encoding {
                    details: "escape byte at end of stuffed region".into(),
                });
            };
            let raw = match code {
                ESCAPE_CODE_ESCAPE => ESCAPE,
                ESCAPE_CODE_HEADER => HEADER_TERMINATOR,
                ESCAPE_CODE_PACKET => PACKET_TERMINATOR,
                other => {
                    return Err(TLinkError::Encoding {
                        details: format!("invalid escape code 0x{other:02X}"),
                    })
                }
            };
            out.push(raw);
            i += 2;
        } else {
            out.push(b);
            i += 1;
        }
    }
    Ok(out)
}

/// Build a complete on-wire packet from an unstuffed header and payload.
pub fn frame(header: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut out = stuff(header);
    out.push(HEADER_TERMINATOR);
    out.extend_from_slice(&stuff(payload));
    out.push(PACKET_TERMINATOR);
    out
}
