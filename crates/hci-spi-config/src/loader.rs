// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, HciSpiConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "hci_spi.toml";

/// Find the HCI-SPI configuration file
///
/// Search order:
/// 1. `HCI_SPI_CONFIG_PATH` environment variable
/// 2. Current working directory: `./hci_spi.toml`
/// 3. Parent directories (up to 5 levels)
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("HCI_SPI_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by HCI_SPI_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    for path in &search_paths {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "HCI-SPI configuration file '{}' not found in any of these locations:\n{}\n\nSet HCI_SPI_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Returns
///
/// Complete `HciSpiConfig` with all overrides applied
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<HciSpiConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: HciSpiConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "1" || value == "yes"
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `HCI_SPI_RX_CAPACITY` -> `buffers.rx_capacity`
/// - `HCI_SPI_TX_CAPACITY` -> `buffers.tx_capacity`
/// - `HCI_SPI_WARMUP_DELAY_US` -> `timing.warmup_delay_us`
/// - `HCI_SPI_WRITE_TIMEOUT_MS` -> `timeouts.write_timeout_ms`
/// - `HCI_SPI_WAIT_FOR_READY_EDGE` -> `power_up.wait_for_ready_edge`
/// - `HCI_SPI_LOG_LEVEL` -> `logging.level`
pub fn apply_environment_overrides(config: &mut HciSpiConfig) {
    if let Ok(value) = env::var("HCI_SPI_RX_CAPACITY") {
        if let Ok(capacity) = value.parse::<usize>() {
            config.buffers.rx_capacity = capacity;
        }
    }
    if let Ok(value) = env::var("HCI_SPI_TX_CAPACITY") {
        if let Ok(capacity) = value.parse::<usize>() {
            config.buffers.tx_capacity = capacity;
        }
    }
    if let Ok(value) = env::var("HCI_SPI_WARMUP_DELAY_US") {
        if let Ok(delay) = value.parse::<u32>() {
            config.timing.warmup_delay_us = delay;
        }
    }
    if let Ok(value) = env::var("HCI_SPI_WRITE_TIMEOUT_MS") {
        if let Ok(timeout) = value.parse::<u64>() {
            config.timeouts.write_timeout_ms = timeout;
        }
    }
    if let Ok(value) = env::var("HCI_SPI_WAIT_FOR_READY_EDGE") {
        config.power_up.wait_for_ready_edge = parse_flag(&value);
    }
    if let Ok(value) = env::var("HCI_SPI_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"rx_capacity": "1520", "log_level": "debug"}`)
pub fn apply_cli_overrides(config: &mut HciSpiConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("rx_capacity") {
        if let Ok(capacity) = value.parse::<usize>() {
            config.buffers.rx_capacity = capacity;
        }
    }
    if let Some(value) = cli_args.get("tx_capacity") {
        if let Ok(capacity) = value.parse::<usize>() {
            config.buffers.tx_capacity = capacity;
        }
    }
    if let Some(value) = cli_args.get("warmup_delay_us") {
        if let Ok(delay) = value.parse::<u32>() {
            config.timing.warmup_delay_us = delay;
        }
    }
    if let Some(value) = cli_args.get("write_timeout_ms") {
        if let Ok(timeout) = value.parse::<u64>() {
            config.timeouts.write_timeout_ms = timeout;
        }
    }
    if let Some(value) = cli_args.get("wait_for_ready_edge") {
        config.power_up.wait_for_ready_edge = parse_flag(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}
