// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport state and counters

/// Transport state machine position
///
/// Exactly one value is live at any instant and it is the only record of
/// who owns the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransportState {
    /// Opened, coprocessor not heard from yet
    PowerUp = 0,
    /// Coprocessor announced itself, warm-up write still pending
    Initialized = 1,
    /// Bus free
    Idle = 2,
    /// Write armed, chip-select asserted, waiting for the ready edge
    WriteIrq = 3,
    /// Warm-up write in progress
    WriteFirstPortion = 4,
    /// Write bytes being exchanged
    WriteEot = 5,
    /// Read edge accepted, chip-select asserted
    ReadIrq = 6,
    /// Read header being exchanged
    ReadFirstPortion = 7,
    /// Read payload being exchanged
    ReadEot = 8,
    /// Buffer corruption detected; terminal
    Halted = 9,
}

impl TransportState {
    /// Get state as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::PowerUp => "POWER_UP",
            TransportState::Initialized => "INITIALIZED",
            TransportState::Idle => "IDLE",
            TransportState::WriteIrq => "WRITE_IRQ",
            TransportState::WriteFirstPortion => "WRITE_FIRST_PORTION",
            TransportState::WriteEot => "WRITE_EOT",
            TransportState::ReadIrq => "READ_IRQ",
            TransportState::ReadFirstPortion => "READ_FIRST_PORTION",
            TransportState::ReadEot => "READ_EOT",
            TransportState::Halted => "HALTED",
        }
    }

    /// Whether the next write must run the warm-up handshake
    pub fn needs_warmup(&self) -> bool {
        matches!(self, TransportState::PowerUp | TransportState::Initialized)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Outbound frames fully exchanged (warm-up included)
    pub frames_written: u64,
    /// Inbound frames handed to the sink
    pub frames_received: u64,
    /// Writes completed inside `submit_write` because the ready edge was missed
    pub missed_edge_writes: u64,
    /// Edges ignored because the line was no longer asserted
    pub spurious_edges: u64,
    /// Writes abandoned on timeout
    pub timeouts: u64,
    /// Transactions aborted by a bus error
    pub bus_errors: u64,
}
