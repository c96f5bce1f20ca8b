// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `hci_spi.toml`.

use core::time::Duration;

use serde::{Deserialize, Serialize};

/// Usable bytes of the coprocessor's minimal RX buffer
pub const DEFAULT_BUFFER_CAPACITY: usize = 130;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HciSpiConfig {
    pub buffers: BuffersConfig,
    pub timing: TimingConfig,
    pub timeouts: TimeoutsConfig,
    pub power_up: PowerUpConfig,
    pub logging: LoggingConfig,
}

/// Transport-owned buffer sizes
///
/// Capacities count usable bytes; the guard byte is stored one past them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuffersConfig {
    /// InboundFrame capacity (10-byte read header + payload + pad)
    pub rx_capacity: usize,
    /// OutboundFrame capacity (5-byte SPI header + payload + pad)
    pub tx_capacity: usize,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            rx_capacity: DEFAULT_BUFFER_CAPACITY,
            tx_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

/// Warm-up handshake timing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Settling delay before and between the two warm-up portions
    pub warmup_delay_us: u32,
    /// Bytes sent in the first warm-up portion
    pub warmup_first_portion: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            warmup_delay_us: 50,
            warmup_first_portion: 4,
        }
    }
}

/// Bounds on blocking waits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Upper bound for each wait inside a write (0 = wait forever)
    pub write_timeout_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: 1000,
        }
    }
}

impl TimeoutsConfig {
    /// Write timeout as a `Duration`, `None` when unbounded
    pub fn write_timeout(&self) -> Option<Duration> {
        if self.write_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.write_timeout_ms))
        }
    }
}

/// Power-up behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PowerUpConfig {
    /// Hold the first write until the coprocessor's alive edge has been seen
    pub wait_for_ready_edge: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let timeouts = TimeoutsConfig { write_timeout_ms: 0 };
        assert_eq!(timeouts.write_timeout(), None);
    }

    #[test]
    fn test_timeout_conversion() {
        let timeouts = TimeoutsConfig::default();
        assert_eq!(timeouts.write_timeout(), Some(Duration::from_millis(1000)));
    }
}
