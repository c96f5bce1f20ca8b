// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! # HCI-SPI HAL
//!
//! Platform abstraction for the host side of an HCI-over-SPI link to a
//! networking coprocessor.
//!
//! This crate provides:
//! - **HAL traits** (`hal` module) - the bus capability ([`SpiLink`]) and the
//!   coprocessor interrupt signal ([`InterruptLine`])
//! - **Platform implementations** (`platforms` module) - an `embedded-hal` 1.0
//!   adapter and an in-memory mock coprocessor for tests and simulation
//!
//! ## Feature Flags
//!
//! - `embedded-hal` - adapter over any `embedded-hal` 1.0 SPI bus, chip-select
//!   pin, delay and input pin

/// Hardware abstraction traits shared by all platforms.
pub mod hal;

/// Concrete platform implementations (embedded-hal adapter, mock coprocessor).
pub mod platforms;

pub use hal::{InterruptLine, SpiLink};

pub use platforms::mock::{BusEvent, MockBus, MockCoprocessor, MockError, MockInterruptLine};

#[cfg(feature = "embedded-hal")]
pub use platforms::embedded_hal::{EmbeddedHalLink, EmbeddedHalLinkError, PinInterruptLine};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
