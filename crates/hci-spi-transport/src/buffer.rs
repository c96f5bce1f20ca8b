// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport-owned frame buffers
//!
//! Both buffers reserve one byte past their usable capacity for a guard byte
//! written once at allocation. The transport never writes that byte itself;
//! finding anything other than [`GUARD_BYTE`] there means something wrote
//! past the buffer bound.

use crate::error::{BufferSide, Corruption, TransportError, TransportResult};
use crate::frame::{self, READ_HEADER_LEN, SPI_HEADER_LEN};

/// Sentinel stored one byte past the usable capacity
pub const GUARD_BYTE: u8 = 0xDE;

fn check_guard(storage: &[u8], side: BufferSide) -> Result<(), Corruption> {
    // Storage always holds capacity + 1 bytes
    let found = storage[storage.len() - 1];
    if found == GUARD_BYTE {
        Ok(())
    } else {
        Err(Corruption::GuardByte { side, found })
    }
}

fn guarded_storage(capacity: usize) -> Box<[u8]> {
    let mut storage = vec![0u8; capacity + 1].into_boxed_slice();
    storage[capacity] = GUARD_BYTE;
    storage
}

/// Outbound frame buffer
///
/// The caller places the payload after the 5 header bytes the transport
/// fills in; ownership moves into `submit_write` for the duration of the
/// write and comes back when it completes.
///
/// ```rust
/// use hci_spi_transport::OutboundFrame;
///
/// let mut frame = OutboundFrame::new(64);
/// frame.write_payload(&[0x01, 0x0B, 0x40, 0x00]).unwrap();
/// assert_eq!(frame.payload(), &[0x01, 0x0B, 0x40, 0x00]);
/// ```
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    storage: Box<[u8]>,
    payload_len: usize,
}

impl OutboundFrame {
    /// Smallest usable capacity: header plus the pad of an empty payload
    pub const MIN_CAPACITY: usize = SPI_HEADER_LEN + 1;

    /// Allocate a frame with `capacity` usable bytes (header and pad included)
    ///
    /// Capacities below [`Self::MIN_CAPACITY`] are raised to it.
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: guarded_storage(capacity.max(Self::MIN_CAPACITY)),
            payload_len: 0,
        }
    }

    /// Usable bytes, guard byte excluded
    pub fn capacity(&self) -> usize {
        self.storage.len() - 1
    }

    /// Largest payload that still leaves room for header and pad
    pub fn max_payload(&self) -> usize {
        let room = self.capacity() - SPI_HEADER_LEN;
        let max = if room % 2 == 1 { room } else { room - 1 };
        max.min(frame::MAX_WRITE_PAYLOAD)
    }

    /// Current payload length
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Current payload
    pub fn payload(&self) -> &[u8] {
        &self.storage[SPI_HEADER_LEN..SPI_HEADER_LEN + self.payload_len]
    }

    /// Writable payload area, `max_payload()` bytes long
    ///
    /// Fill it in place and commit with [`Self::set_payload_len`].
    pub fn payload_area_mut(&mut self) -> &mut [u8] {
        let end = SPI_HEADER_LEN + self.max_payload();
        &mut self.storage[SPI_HEADER_LEN..end]
    }

    /// Commit the number of payload bytes placed through `payload_area_mut`
    ///
    /// # Errors
    ///
    /// `FrameTooLarge` if `len` exceeds `max_payload()`
    pub fn set_payload_len(&mut self, len: usize) -> TransportResult<()> {
        let max = self.max_payload();
        if len > max {
            return Err(TransportError::FrameTooLarge { len, max });
        }
        self.payload_len = len;
        Ok(())
    }

    /// Copy `data` in as the payload
    ///
    /// # Errors
    ///
    /// `FrameTooLarge` if `data` exceeds `max_payload()`
    pub fn write_payload(&mut self, data: &[u8]) -> TransportResult<()> {
        let max = self.max_payload();
        if data.len() > max {
            return Err(TransportError::FrameTooLarge {
                len: data.len(),
                max,
            });
        }
        self.storage[SPI_HEADER_LEN..SPI_HEADER_LEN + data.len()].copy_from_slice(data);
        self.payload_len = data.len();
        Ok(())
    }

    /// Drop the payload, keeping the allocation
    pub fn clear(&mut self) {
        self.payload_len = 0;
    }

    /// Whole backing store, guard byte included
    ///
    /// For upper layers that assemble packets at fixed offsets. Writing the
    /// last byte trips the corruption detector on the next write.
    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }

    /// Verify the guard byte
    pub fn check_guard(&self) -> Result<(), Corruption> {
        check_guard(&self.storage, BufferSide::Tx)
    }

    /// Write header and pad in place, returning the bytes to exchange
    pub(crate) fn prepare(&mut self) -> TransportResult<usize> {
        let layout = frame::encode_write_header(self.payload_len)?;
        self.storage[..SPI_HEADER_LEN].copy_from_slice(&layout.header);
        if layout.pad {
            self.storage[SPI_HEADER_LEN + self.payload_len] = 0x00;
        }
        Ok(layout.total)
    }

    /// First `total` bytes as laid out by `prepare`
    pub(crate) fn wire(&self, total: usize) -> &[u8] {
        &self.storage[..total]
    }
}

/// Inbound frame buffer, owned by the transport for its whole lifetime
///
/// Single-buffered: every read overwrites the previous frame.
#[derive(Debug)]
pub struct InboundFrame {
    storage: Box<[u8]>,
    len: usize,
}

impl InboundFrame {
    /// Smallest usable capacity: read header plus one pad byte
    pub const MIN_CAPACITY: usize = READ_HEADER_LEN + 1;

    /// Allocate with `capacity` usable bytes and write the guard byte
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: guarded_storage(capacity.max(Self::MIN_CAPACITY)),
            len: 0,
        }
    }

    /// Usable bytes, guard byte excluded
    pub fn capacity(&self) -> usize {
        self.storage.len() - 1
    }

    /// Verify the guard byte
    pub fn check_guard(&self) -> Result<(), Corruption> {
        check_guard(&self.storage, BufferSide::Rx)
    }

    /// Bytes after the SPI header of the last completed frame
    pub fn payload(&self) -> &[u8] {
        if self.len < SPI_HEADER_LEN {
            return &[];
        }
        &self.storage[SPI_HEADER_LEN..self.len]
    }

    /// Read header slot, `READ_HEADER_LEN` bytes
    pub(crate) fn begin(&mut self) -> &mut [u8] {
        self.len = 0;
        &mut self.storage[..READ_HEADER_LEN]
    }

    pub(crate) fn header(&self) -> [u8; READ_HEADER_LEN] {
        let mut header = [0u8; READ_HEADER_LEN];
        header.copy_from_slice(&self.storage[..READ_HEADER_LEN]);
        header
    }

    /// Room for `remaining` bytes after the read header
    ///
    /// Refuses anything that would reach the guard byte.
    pub(crate) fn body_mut(&mut self, remaining: usize) -> Result<&mut [u8], Corruption> {
        let needed = READ_HEADER_LEN + remaining;
        if needed > self.capacity() {
            return Err(Corruption::Overrun {
                needed,
                capacity: self.capacity(),
            });
        }
        Ok(&mut self.storage[READ_HEADER_LEN..needed])
    }

    pub(crate) fn complete(&mut self, total: usize) {
        self.len = total;
    }

    #[cfg(test)]
    pub(crate) fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.storage
    }
}
