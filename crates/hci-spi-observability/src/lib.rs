// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # hci-spi-observability
//!
//! Logging setup shared by the HCI-SPI crates and tools, with per-crate
//! debug flag support.
//!
//! ## Features
//! - `file-logging`: daily-rotated log file next to the console output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

// Re-export commonly used items
pub use cli::*;
pub use init::*;

/// Known crate names for debug flags (also the `tracing` targets they log under)
pub const KNOWN_CRATES: &[&str] = &[
    "hci-spi",
    "hci-spi-hal",
    "hci-spi-config",
    "hci-spi-transport",
    "hci-spi-observability",
];
