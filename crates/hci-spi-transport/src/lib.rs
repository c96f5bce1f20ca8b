// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # hci-spi-transport
//!
//! Half-duplex HCI-over-SPI transport between a host and a networking
//! coprocessor. Serializes every bus transaction through one state machine
//! that mediates between blocking writers and the coprocessor's interrupt
//! line.
//!
//! ## Layout
//! - [`frame`]: SPI/HCI header codec (pure)
//! - [`buffer`]: guarded outbound and inbound frame buffers
//! - [`shuttle`]: byte-by-byte exchange loops
//! - [`transport`]: the state machine itself
//! - [`sink`]: upper-layer consumer of inbound frames
//!
//! ## Example
//!
//! ```rust
//! use hci_spi_config::HciSpiConfig;
//! use hci_spi_hal::MockCoprocessor;
//! use hci_spi_transport::{Transport, TransportState};
//!
//! let coprocessor = MockCoprocessor::new();
//! let transport = Transport::open(
//!     coprocessor.bus(),
//!     coprocessor.interrupt_line(),
//!     |payload: &[u8]| println!("event {:02x?}", payload),
//!     &HciSpiConfig::default(),
//! )
//! .unwrap();
//!
//! // First write performs the warm-up handshake
//! let mut frame = transport.new_frame();
//! frame.write_payload(&[0x01, 0x00, 0x40, 0x00]).unwrap();
//! let _frame = transport.submit_write(frame).unwrap();
//! assert_eq!(transport.state(), TransportState::Idle);
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod buffer;
pub mod error;
pub mod frame;
pub mod shuttle;
pub mod sink;
pub mod state;
pub mod transport;

pub use buffer::{InboundFrame, OutboundFrame, GUARD_BYTE};
pub use error::{BufferSide, Corruption, TransportError, TransportResult};
pub use frame::{
    decode_read_header, encode_write_header, padded_len, FrameKind, InboundLayout, LengthField,
    OutboundLayout, READ_HEADER_LEN, SPI_HEADER_LEN, SPI_OP_READ, SPI_OP_WRITE,
};
pub use sink::{DiscardSink, FrameSink};
pub use state::{TransportState, TransportStats};
pub use transport::{Transport, TransportSettings};
