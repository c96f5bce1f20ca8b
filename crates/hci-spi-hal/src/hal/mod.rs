// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/// Chip-select framed byte exchange with the coprocessor.
pub mod bus;
/// Coprocessor request/ready signal line.
pub mod interrupt;

// Re-export trait types
pub use bus::SpiLink;
pub use interrupt::InterruptLine;
