// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/// Interrupt signal driven by the coprocessor
///
/// The coprocessor pulls the line low when it has a frame for the host or
/// when it is ready to accept one. The platform wires the falling edge to
/// the transport's `on_interrupt` entry point; this trait only covers the
/// parts the transport drives itself.
pub trait InterruptLine {
    /// Platform-specific error type
    type Error: core::fmt::Debug;

    /// Start delivering edges to the registered handler
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Stop delivering edges to the registered handler
    ///
    /// Edges that occur while disabled may be lost.
    fn disable(&mut self) -> Result<(), Self::Error>;

    /// Read the current line level synchronously
    ///
    /// # Returns
    /// True if the line is high (released), false if low
    fn is_high(&mut self) -> Result<bool, Self::Error>;

    /// Check whether the coprocessor is currently requesting service
    ///
    /// The line is active low.
    fn is_asserted(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_high()?)
    }
}
