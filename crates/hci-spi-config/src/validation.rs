// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures buffer sizes can hold the fixed headers, fit the 16-bit wire
//! length field, and that timing values are sane.

use crate::{ConfigError, ConfigResult, HciSpiConfig};

/// Smallest InboundFrame: the 10-byte read header plus one pad byte
pub const MIN_RX_CAPACITY: usize = 11;

/// Smallest OutboundFrame: 5-byte SPI header plus the pad of an empty payload
pub const MIN_TX_CAPACITY: usize = 6;

/// Largest frame whose length still fits the 16-bit length field
pub const MAX_CAPACITY: usize = 5 + u16::MAX as usize;

/// Longest warm-up settling delay accepted
pub const MAX_WARMUP_DELAY_US: u32 = 100_000;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    CapacityTooSmall { field: String, value: usize, min: usize },
    CapacityTooLarge { field: String, value: usize, max: usize },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityTooSmall { field, value, min } => {
                write!(f, "{} = {} is below the minimum of {}", field, value, min)
            }
            Self::CapacityTooLarge { field, value, max } => {
                write!(f, "{} = {} exceeds the maximum of {}", field, value, max)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &HciSpiConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_buffers(config, &mut errors);
    validate_timing(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn check_capacity(
    field: &str,
    value: usize,
    min: usize,
    errors: &mut Vec<ConfigValidationError>,
) {
    if value < min {
        errors.push(ConfigValidationError::CapacityTooSmall {
            field: field.to_string(),
            value,
            min,
        });
    } else if value > MAX_CAPACITY {
        errors.push(ConfigValidationError::CapacityTooLarge {
            field: field.to_string(),
            value,
            max: MAX_CAPACITY,
        });
    }
}

fn validate_buffers(config: &HciSpiConfig, errors: &mut Vec<ConfigValidationError>) {
    check_capacity(
        "buffers.rx_capacity",
        config.buffers.rx_capacity,
        MIN_RX_CAPACITY,
        errors,
    );
    check_capacity(
        "buffers.tx_capacity",
        config.buffers.tx_capacity,
        MIN_TX_CAPACITY,
        errors,
    );
}

fn validate_timing(config: &HciSpiConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.timing.warmup_delay_us > MAX_WARMUP_DELAY_US {
        errors.push(ConfigValidationError::InvalidValue {
            field: "timing.warmup_delay_us".to_string(),
            reason: format!("must be at most {} us", MAX_WARMUP_DELAY_US),
        });
    }

    // The first portion must leave at least one byte for the second one
    let first = config.timing.warmup_first_portion;
    if first == 0 || first >= MIN_TX_CAPACITY {
        errors.push(ConfigValidationError::InvalidValue {
            field: "timing.warmup_first_portion".to_string(),
            reason: format!("must be between 1 and {}", MIN_TX_CAPACITY - 1),
        });
    }
}

fn validate_logging(config: &HciSpiConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.logging.level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.level".to_string(),
            reason: format!("'{}' is not one of {}", config.logging.level, LOG_LEVELS.join(", ")),
        });
    }
}
