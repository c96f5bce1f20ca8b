// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Platform implementations for the HCI-SPI link
//!
//! Each platform module implements the HAL traits defined in `crate::hal`.
//!
//! Available platforms:
//! - Any `embedded-hal` 1.0 target (linux-embedded-hal spidev, RP2040, STM32F4, ...)
//! - In-memory mock coprocessor (tests, simulation)

#[cfg(feature = "embedded-hal")]
pub mod embedded_hal;

pub mod mock;

#[cfg(feature = "embedded-hal")]
pub use self::embedded_hal::{EmbeddedHalLink, EmbeddedHalLinkError, PinInterruptLine};

pub use mock::{BusEvent, MockBus, MockCoprocessor, MockError, MockInterruptLine};
