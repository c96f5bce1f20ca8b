// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the HCI-SPI transport

use std::time::Duration;

use crate::state::TransportState;

/// Result type alias using TransportError
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Which transport-owned buffer tripped the corruption detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSide {
    /// OutboundFrame
    Tx,
    /// InboundFrame
    Rx,
}

impl std::fmt::Display for BufferSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferSide::Tx => write!(f, "TX"),
            BufferSide::Rx => write!(f, "RX"),
        }
    }
}

/// Detected buffer-bound violation; the transport halts on any of these
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// Guard byte past the usable capacity no longer holds its sentinel
    GuardByte { side: BufferSide, found: u8 },
    /// Coprocessor announced more bytes than the InboundFrame can hold
    Overrun { needed: usize, capacity: usize },
}

impl std::fmt::Display for Corruption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Corruption::GuardByte { side, found } => {
                write!(f, "{} guard byte overwritten (found {:#04x})", side, found)
            }
            Corruption::Overrun { needed, capacity } => write!(
                f,
                "inbound frame of {} bytes exceeds buffer capacity {}",
                needed, capacity
            ),
        }
    }
}

/// Error types for the HCI-SPI transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Buffer corruption detected; the transport is halted for good
    #[error("Transport halted: {0}")]
    Corrupted(Corruption),

    /// A bounded wait inside a write expired
    #[error("Timed out after {waited:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: &'static str,
        waited: Duration,
    },

    /// The bus capability reported a failure
    #[error("Bus error: {0}")]
    Bus(String),

    /// The interrupt signal reported a failure
    #[error("Interrupt line error: {0}")]
    Interrupt(String),

    /// Payload does not fit the frame buffer or the length field
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// Operation not allowed in the current state
    #[error("Invalid state for {operation}: {state:?}")]
    InvalidState {
        operation: &'static str,
        state: TransportState,
    },
}

impl TransportError {
    /// Check if the error is terminal (only a reset of the link recovers)
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Corrupted(_))
    }

    /// Check if retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. } | TransportError::Bus(_) | TransportError::Interrupt(_)
        )
    }

    pub(crate) fn bus<E: std::fmt::Debug>(err: E) -> Self {
        TransportError::Bus(format!("{:?}", err))
    }

    pub(crate) fn interrupt<E: std::fmt::Debug>(err: E) -> Self {
        TransportError::Interrupt(format!("{:?}", err))
    }
}

impl From<Corruption> for TransportError {
    fn from(corruption: Corruption) -> Self {
        TransportError::Corrupted(corruption)
    }
}
