// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Frame codec
//!
//! Pure logic for the two fixed headers on the wire.
//!
//! ## Outbound (host → coprocessor)
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬──────┬──────┬─────────────┬───────┐
//! │ WRITE    │ len (hi) │ len (lo) │ 0x00 │ 0x00 │ payload     │ [pad] │
//! └──────────┴──────────┴──────────┴──────┴──────┴─────────────┴───────┘
//!   len = payload + pad, pad present iff the payload length is even
//! ```
//!
//! ## Inbound (coprocessor → host)
//!
//! The host clocks out a 10-byte read header: the 5-byte SPI header followed
//! by the first 5 bytes of the HCI packet. The HCI type tag selects how many
//! bytes remain.

use crate::error::{TransportError, TransportResult};

/// Bytes in the SPI header preceding every HCI packet
pub const SPI_HEADER_LEN: usize = 5;

/// Bytes clocked in before the remaining length is known
pub const READ_HEADER_LEN: usize = 10;

/// Type tag of an outbound SPI header
pub const SPI_OP_WRITE: u8 = 0x01;

/// Filler byte clocked out while reading
pub const SPI_OP_READ: u8 = 0x03;

/// Largest payload whose padded length fits the 16-bit length field
pub const MAX_WRITE_PAYLOAD: usize = u16::MAX as usize;

const HCI_TYPE_OFFSET: usize = 0;
const HCI_LENGTH_OFFSET: usize = 3;

/// HCI packet kinds, by type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Command = 0x01,
    Data = 0x02,
    Patch = 0x03,
    Event = 0x04,
}

impl TryFrom<u8> for FrameKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FrameKind::Command),
            0x02 => Ok(FrameKind::Data),
            0x03 => Ok(FrameKind::Patch),
            0x04 => Ok(FrameKind::Event),
            other => Err(other),
        }
    }
}

/// Where a frame kind keeps its inbound length, relative to the HCI header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthField {
    /// No inbound length; nothing follows the read header
    Absent,
    /// One byte, minus `bias` bytes already inside the read header
    U8 { offset: usize, bias: usize },
    /// Two bytes, little-endian
    U16Le { offset: usize },
}

impl LengthField {
    fn read(self, hci: &[u8]) -> usize {
        match self {
            LengthField::Absent => 0,
            LengthField::U8 { offset, bias } => (hci[offset] as usize).saturating_sub(bias),
            LengthField::U16Le { offset } => {
                u16::from_le_bytes([hci[offset], hci[offset + 1]]) as usize
            }
        }
    }
}

impl FrameKind {
    /// Inbound length encoding for this kind
    pub fn length_field(self) -> LengthField {
        match self {
            FrameKind::Data => LengthField::U16Le {
                offset: HCI_LENGTH_OFFSET,
            },
            FrameKind::Event => LengthField::U8 {
                offset: HCI_LENGTH_OFFSET,
                bias: 1,
            },
            FrameKind::Command | FrameKind::Patch => LengthField::Absent,
        }
    }
}

/// What remains to be read after the 10-byte read header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboundLayout {
    /// Decoded kind, `None` for an unknown tag
    pub kind: Option<FrameKind>,
    /// Length decoded from the header, before padding
    pub declared: usize,
    /// Whether one pad byte follows
    pub pad: bool,
}

impl InboundLayout {
    /// Bytes still to be clocked in, pad included
    pub fn remaining(&self) -> usize {
        self.declared + self.pad as usize
    }

    /// Bytes the whole frame occupies in the InboundFrame
    pub fn total(&self) -> usize {
        READ_HEADER_LEN + self.remaining()
    }
}

/// Decode the remaining length from a 10-byte read header
///
/// Unknown tags, commands and patches decode as zero-payload frames.
pub fn decode_read_header(header: &[u8; READ_HEADER_LEN]) -> InboundLayout {
    let hci = &header[SPI_HEADER_LEN..];
    let kind = FrameKind::try_from(hci[HCI_TYPE_OFFSET]).ok();

    let field = kind.map_or(LengthField::Absent, FrameKind::length_field);
    if field == LengthField::Absent {
        return InboundLayout {
            kind,
            declared: 0,
            pad: false,
        };
    }

    let declared = field.read(hci);
    InboundLayout {
        kind,
        declared,
        pad: (READ_HEADER_LEN + declared) % 2 == 0,
    }
}

/// Layout of an outbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundLayout {
    /// SPI header to place in front of the payload
    pub header: [u8; SPI_HEADER_LEN],
    /// Whether one pad byte follows the payload
    pub pad: bool,
    /// Bytes exchanged on the bus, header and pad included
    pub total: usize,
}

/// Length field value for a payload: payload plus pad, pad iff even
pub fn padded_len(payload_len: usize) -> usize {
    payload_len + (payload_len % 2 == 0) as usize
}

/// Build the SPI header for a payload of `payload_len` bytes
///
/// # Errors
///
/// `FrameTooLarge` if the padded length does not fit the 16-bit length field
pub fn encode_write_header(payload_len: usize) -> TransportResult<OutboundLayout> {
    if padded_len(payload_len) > u16::MAX as usize {
        return Err(TransportError::FrameTooLarge {
            len: payload_len,
            max: MAX_WRITE_PAYLOAD,
        });
    }
    let wire_len = padded_len(payload_len) as u16;
    let [hi, lo] = wire_len.to_be_bytes();
    Ok(OutboundLayout {
        header: [SPI_OP_WRITE, hi, lo, 0x00, 0x00],
        pad: payload_len % 2 == 0,
        total: SPI_HEADER_LEN + wire_len as usize,
    })
}
