// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # hci-spi - HCI over SPI for networking coprocessors
//!
//! Host side of the half-duplex SPI link to a networking coprocessor that
//! speaks HCI (CC3000 family). One state machine serializes every bus
//! transaction between blocking writers and the coprocessor's interrupt line.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! hci-spi = "0.1"
//! ```
//!
//! ## Feature Flags
//!
//! - **`observability`** (default): logging setup and per-crate debug flags
//! - **`sim`** (default): the `hci_spi_sim` tool over the mock coprocessor
//! - **`file-logging`**: daily-rotated log file
//! - **`embedded-hal`**: adapter for any `embedded-hal` 1.0 SPI bus + pins
//!
//! ## Usage
//!
//! ```rust
//! use hci_spi::prelude::*;
//!
//! let coprocessor = MockCoprocessor::new();
//! coprocessor.set_auto_ready(true);
//!
//! let transport = Transport::open(
//!     coprocessor.bus(),
//!     coprocessor.interrupt_line(),
//!     |payload: &[u8]| println!("received {:02x?}", payload),
//!     &HciSpiConfig::default(),
//! )?;
//!
//! // Warm-up, then a normal write
//! for _ in 0..2 {
//!     let mut frame = transport.new_frame();
//!     frame.write_payload(&[0x01, 0x0B, 0x40, 0x00])?;
//!     transport.submit_write(frame)?;
//! }
//! assert_eq!(transport.state(), TransportState::Idle);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: hci-spi-config                             │
//! │  (hci_spi.toml, env + CLI overrides, validation)        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Platform: hci-spi-hal                                  │
//! │  (SpiLink, InterruptLine, embedded-hal adapter, mock)   │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Transport: hci-spi-transport                           │
//! │  (frame codec, guarded buffers, state machine)          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

// Re-export foundation
pub use hci_spi_config as config;

// Re-export platform layer
pub use hci_spi_hal as hal;

// Re-export transport
pub use hci_spi_transport as transport;

#[cfg(feature = "observability")]
pub use hci_spi_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{load_config, HciSpiConfig};
    pub use crate::hal::{InterruptLine, MockCoprocessor, SpiLink};
    pub use crate::transport::{
        FrameSink, OutboundFrame, Transport, TransportError, TransportResult, TransportState,
        TransportStats,
    };

    #[cfg(feature = "embedded-hal")]
    pub use crate::hal::{EmbeddedHalLink, PinInterruptLine};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let config = HciSpiConfig::default();
        assert_eq!(config.buffers.rx_capacity, crate::config::DEFAULT_BUFFER_CAPACITY);
        assert!(TransportState::PowerUp.needs_warmup());
    }
}
