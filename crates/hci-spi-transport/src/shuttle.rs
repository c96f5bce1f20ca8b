// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Byte shuttle
//!
//! Full-duplex loops over the single-byte exchange primitive. Each byte sent
//! yields one byte received; the write loop drops what comes back and the
//! read loop clocks out the READ filler.

use hci_spi_hal::SpiLink;

use crate::error::{TransportError, TransportResult};
use crate::frame::SPI_OP_READ;

/// Send every byte of `bytes`, discarding what comes back
pub fn write_synchronous<B: SpiLink + ?Sized>(bus: &mut B, bytes: &[u8]) -> TransportResult<()> {
    for &byte in bytes {
        bus.exchange_byte(byte).map_err(TransportError::bus)?;
    }
    Ok(())
}

/// Fill `into` with bytes clocked in against the READ filler
pub fn read_synchronous<B: SpiLink + ?Sized>(bus: &mut B, into: &mut [u8]) -> TransportResult<()> {
    for slot in into.iter_mut() {
        *slot = bus.exchange_byte(SPI_OP_READ).map_err(TransportError::bus)?;
    }
    Ok(())
}
