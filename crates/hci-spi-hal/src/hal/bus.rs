// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/// Synchronous serial bus shared with the coprocessor
///
/// The transport owns its `SpiLink` for the whole lifetime of the link and
/// only drives it while a transaction is open, so implementations do not
/// need any locking of their own.
///
/// ## Electrical conventions
///
/// - Chip-select is active low: `assert_select` drives it low.
/// - Every `exchange_byte` clocks exactly one byte out and one byte in.
pub trait SpiLink {
    /// Platform-specific error type
    type Error: core::fmt::Debug;

    /// Drive chip-select to its active level
    fn assert_select(&mut self) -> Result<(), Self::Error>;

    /// Release chip-select
    fn deassert_select(&mut self) -> Result<(), Self::Error>;

    /// Send one byte and return the byte received in the same clock frame
    ///
    /// # Arguments
    /// * `out` - Byte to transmit
    ///
    /// # Returns
    /// The byte shifted in while `out` was shifted out
    fn exchange_byte(&mut self, out: u8) -> Result<u8, Self::Error>;

    /// Busy-wait for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

impl<T: SpiLink + ?Sized> SpiLink for &mut T {
    type Error = T::Error;

    fn assert_select(&mut self) -> Result<(), Self::Error> {
        (**self).assert_select()
    }

    fn deassert_select(&mut self) -> Result<(), Self::Error> {
        (**self).deassert_select()
    }

    fn exchange_byte(&mut self, out: u8) -> Result<u8, Self::Error> {
        (**self).exchange_byte(out)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}
