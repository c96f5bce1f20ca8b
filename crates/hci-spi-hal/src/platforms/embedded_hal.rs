// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! `embedded-hal` 1.0 adapter
//!
//! Bonds a generic SPI bus, a manually driven chip-select pin and a delay
//! provider into a [`SpiLink`], and an input pin plus an edge-watch switch
//! into an [`InterruptLine`].
//!
//! ```rust,ignore
//! use hci_spi_hal::platforms::embedded_hal::{EmbeddedHalLink, PinInterruptLine};
//!
//! let link = EmbeddedHalLink::new(spi, cs_pin, delay);
//! let line = PinInterruptLine::new(irq_pin, |enabled| set_pin_watch(enabled));
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;

use crate::hal::{InterruptLine, SpiLink};

/// Error raised by [`EmbeddedHalLink`]
#[derive(Debug)]
pub enum EmbeddedHalLinkError<S, P> {
    /// SPI bus transfer failed
    Spi(S),
    /// Chip-select pin could not be driven
    ChipSelect(P),
}

/// [`SpiLink`] over an `embedded-hal` SPI bus with a software chip-select
pub struct EmbeddedHalLink<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
}

impl<SPI, CS, D> EmbeddedHalLink<SPI, CS, D>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    /// Create the link; chip-select is left as the caller configured it
    pub fn new(spi: SPI, cs: CS, delay: D) -> Self {
        Self { spi, cs, delay }
    }

    /// Give the peripherals back
    pub fn release(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }
}

impl<SPI, CS, D> SpiLink for EmbeddedHalLink<SPI, CS, D>
where
    SPI: SpiBus<u8>,
    CS: OutputPin,
    D: DelayNs,
{
    type Error = EmbeddedHalLinkError<SPI::Error, CS::Error>;

    fn assert_select(&mut self) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(EmbeddedHalLinkError::ChipSelect)
    }

    fn deassert_select(&mut self) -> Result<(), Self::Error> {
        // Clock out anything still queued before releasing the device
        self.spi.flush().map_err(EmbeddedHalLinkError::Spi)?;
        self.cs.set_high().map_err(EmbeddedHalLinkError::ChipSelect)
    }

    fn exchange_byte(&mut self, out: u8) -> Result<u8, Self::Error> {
        let mut word = [out];
        self.spi
            .transfer_in_place(&mut word)
            .map_err(EmbeddedHalLinkError::Spi)?;
        Ok(word[0])
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}

/// [`InterruptLine`] over an `embedded-hal` input pin
///
/// `embedded-hal` has no notion of edge interrupts, so enabling and
/// disabling edge delivery is delegated to a platform callback (EXTI mask,
/// GPIO IRQ enable, pin watch, ...).
pub struct PinInterruptLine<P, W> {
    pin: P,
    watch: W,
}

impl<P, W> PinInterruptLine<P, W>
where
    P: InputPin,
    W: FnMut(bool),
{
    /// Create the line from the IRQ input pin and the edge-watch switch
    pub fn new(pin: P, watch: W) -> Self {
        Self { pin, watch }
    }
}

impl<P, W> InterruptLine for PinInterruptLine<P, W>
where
    P: InputPin,
    W: FnMut(bool),
{
    type Error = P::Error;

    fn enable(&mut self) -> Result<(), Self::Error> {
        (self.watch)(true);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        (self.watch)(false);
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.pin.is_high()
    }
}
