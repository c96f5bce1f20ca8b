// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory mock coprocessor
//!
//! A [`MockCoprocessor`] hands out a [`MockBus`] and a [`MockInterruptLine`]
//! that share one piece of state, so a test (or the simulation tool) can
//! script the coprocessor side of the link:
//!
//! - bytes queued with [`MockCoprocessor::queue_inbound`] are shifted out on
//!   MISO one per exchanged byte,
//! - the interrupt line is pulled low while the coprocessor has something to
//!   say, and an edge is delivered on the [`MockCoprocessor::edges`] channel
//!   when edge delivery is enabled (otherwise it is counted as missed),
//! - every select, deselect, byte exchange and delay the host performs is
//!   recorded as a [`BusEvent`].
//!
//! With `auto_ready` enabled the coprocessor answers every chip-select assert
//! that is not a read by pulling the line low, which is how the real device
//! signals "ready to receive".

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::hal::{InterruptLine, SpiLink};

/// One host-side action observed on the mock bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Chip-select asserted
    Select,
    /// Chip-select released
    Deselect,
    /// One byte clocked each way
    Exchange {
        /// Byte sent by the host
        mosi: u8,
        /// Byte returned by the coprocessor
        miso: u8,
    },
    /// Busy-wait requested by the host
    Delay(u32),
}

/// Error injected by the mock bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    /// Scripted exchange failure
    ExchangeFailed,
}

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockError::ExchangeFailed => write!(f, "mock bus exchange failed"),
        }
    }
}

impl std::error::Error for MockError {}

#[derive(Debug)]
struct CoprocessorState {
    selected: bool,
    events: Vec<BusEvent>,
    miso: VecDeque<u8>,
    line_high: bool,
    line_enabled: bool,
    enable_calls: usize,
    disable_calls: usize,
    delivered_edges: usize,
    missed_edges: usize,
    auto_ready: bool,
    exchanges_until_failure: Option<usize>,
}

impl Default for CoprocessorState {
    fn default() -> Self {
        Self {
            selected: false,
            events: Vec::new(),
            miso: VecDeque::new(),
            line_high: true,
            line_enabled: false,
            enable_calls: 0,
            disable_calls: 0,
            delivered_edges: 0,
            missed_edges: 0,
            auto_ready: false,
            exchanges_until_failure: None,
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<CoprocessorState>,
    edge_tx: Sender<()>,
    edge_rx: Receiver<()>,
}

impl Shared {
    /// Pull the line low and deliver a falling edge if the host listens
    fn pull_low(&self, state: &mut CoprocessorState) -> bool {
        let was_high = state.line_high;
        state.line_high = false;
        if !was_high {
            return false;
        }
        if state.line_enabled {
            state.delivered_edges += 1;
            // Receiver lives as long as `Shared`, send cannot fail
            let _ = self.edge_tx.send(());
            true
        } else {
            state.missed_edges += 1;
            false
        }
    }
}

/// Scriptable coprocessor shared by a [`MockBus`] and a [`MockInterruptLine`]
#[derive(Debug, Clone)]
pub struct MockCoprocessor {
    shared: Arc<Shared>,
}

impl Default for MockCoprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCoprocessor {
    /// Create an idle coprocessor: line high, edge delivery disabled
    pub fn new() -> Self {
        let (edge_tx, edge_rx) = unbounded();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CoprocessorState::default()),
                edge_tx,
                edge_rx,
            }),
        }
    }

    /// Bus endpoint to hand to the transport
    pub fn bus(&self) -> MockBus {
        MockBus {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Interrupt line endpoint to hand to the transport
    pub fn interrupt_line(&self) -> MockInterruptLine {
        MockInterruptLine {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Channel carrying one message per delivered falling edge
    ///
    /// The platform's interrupt context drains this and calls the
    /// transport's `on_interrupt`.
    pub fn edges(&self) -> Receiver<()> {
        self.shared.edge_rx.clone()
    }

    /// Answer write-side chip-select asserts by pulling the line low
    pub fn set_auto_ready(&self, enabled: bool) {
        self.shared.state.lock().auto_ready = enabled;
    }

    /// Force the line level without generating an edge
    pub fn set_line_high(&self, high: bool) {
        self.shared.state.lock().line_high = high;
    }

    /// Pull the line low, delivering an edge if enabled
    ///
    /// # Returns
    /// True if an edge was delivered, false if it was missed or the line
    /// was already low
    pub fn raise_request(&self) -> bool {
        let mut state = self.shared.state.lock();
        self.shared.pull_low(&mut state)
    }

    /// Queue a frame the coprocessor will shift out on the next read
    ///
    /// While chip-select is asserted the request is deferred until release.
    ///
    /// # Returns
    /// True if an edge was delivered immediately
    pub fn queue_inbound(&self, bytes: &[u8]) -> bool {
        let mut state = self.shared.state.lock();
        state.miso.extend(bytes.iter().copied());
        if state.selected {
            return false;
        }
        self.shared.pull_low(&mut state)
    }

    /// Fail the exchange after `count` more successful ones
    pub fn fail_exchanges_after(&self, count: usize) {
        self.shared.state.lock().exchanges_until_failure = Some(count);
    }

    /// Everything the host did on the bus so far
    pub fn events(&self) -> Vec<BusEvent> {
        self.shared.state.lock().events.clone()
    }

    /// Forget recorded bus events
    pub fn clear_events(&self) {
        self.shared.state.lock().events.clear();
    }

    /// Host-to-coprocessor bytes, one vector per chip-select window
    pub fn transactions(&self) -> Vec<Vec<u8>> {
        let state = self.shared.state.lock();
        let mut windows = Vec::new();
        let mut current: Option<Vec<u8>> = None;
        for event in &state.events {
            match event {
                BusEvent::Select => current = Some(Vec::new()),
                BusEvent::Deselect => {
                    if let Some(window) = current.take() {
                        windows.push(window);
                    }
                }
                BusEvent::Exchange { mosi, .. } => {
                    if let Some(window) = current.as_mut() {
                        window.push(*mosi);
                    }
                }
                BusEvent::Delay(_) => {}
            }
        }
        windows
    }

    /// Whether chip-select is currently asserted
    pub fn is_selected(&self) -> bool {
        self.shared.state.lock().selected
    }

    /// Current line level
    pub fn line_high(&self) -> bool {
        self.shared.state.lock().line_high
    }

    /// Whether edge delivery is enabled
    pub fn line_enabled(&self) -> bool {
        self.shared.state.lock().line_enabled
    }

    /// Number of `enable` / `disable` calls made by the host
    pub fn line_toggles(&self) -> (usize, usize) {
        let state = self.shared.state.lock();
        (state.enable_calls, state.disable_calls)
    }

    /// Edges delivered on the channel
    pub fn delivered_edges(&self) -> usize {
        self.shared.state.lock().delivered_edges
    }

    /// Edges that fired while delivery was disabled
    pub fn missed_edges(&self) -> usize {
        self.shared.state.lock().missed_edges
    }

    /// Inbound bytes not yet clocked out
    pub fn pending_inbound(&self) -> usize {
        self.shared.state.lock().miso.len()
    }
}

/// Host-side bus endpoint of a [`MockCoprocessor`]
#[derive(Debug, Clone)]
pub struct MockBus {
    shared: Arc<Shared>,
}

impl SpiLink for MockBus {
    type Error = MockError;

    fn assert_select(&mut self) -> Result<(), Self::Error> {
        let mut state = self.shared.state.lock();
        state.selected = true;
        state.events.push(BusEvent::Select);
        if state.auto_ready && state.miso.is_empty() {
            self.shared.pull_low(&mut state);
        }
        Ok(())
    }

    fn deassert_select(&mut self) -> Result<(), Self::Error> {
        let mut state = self.shared.state.lock();
        state.selected = false;
        state.events.push(BusEvent::Deselect);
        state.line_high = true;
        if !state.miso.is_empty() {
            self.shared.pull_low(&mut state);
        }
        Ok(())
    }

    fn exchange_byte(&mut self, out: u8) -> Result<u8, Self::Error> {
        let mut state = self.shared.state.lock();
        if let Some(remaining) = state.exchanges_until_failure.as_mut() {
            if *remaining == 0 {
                state.exchanges_until_failure = None;
                return Err(MockError::ExchangeFailed);
            }
            *remaining -= 1;
        }
        let miso = state.miso.pop_front().unwrap_or(0x00);
        state.events.push(BusEvent::Exchange { mosi: out, miso });
        Ok(miso)
    }

    fn delay_us(&mut self, us: u32) {
        self.shared.state.lock().events.push(BusEvent::Delay(us));
    }
}

/// Host-side interrupt endpoint of a [`MockCoprocessor`]
#[derive(Debug, Clone)]
pub struct MockInterruptLine {
    shared: Arc<Shared>,
}

impl InterruptLine for MockInterruptLine {
    type Error = MockError;

    fn enable(&mut self) -> Result<(), Self::Error> {
        let mut state = self.shared.state.lock();
        state.line_enabled = true;
        state.enable_calls += 1;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        let mut state = self.shared.state.lock();
        state.line_enabled = false;
        state.disable_calls += 1;
        Ok(())
    }

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.shared.state.lock().line_high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_shifts_queued_bytes() {
        let coprocessor = MockCoprocessor::new();
        let mut bus = coprocessor.bus();

        coprocessor.queue_inbound(&[0xAA, 0xBB]);
        bus.assert_select().unwrap();
        assert_eq!(bus.exchange_byte(0x03).unwrap(), 0xAA);
        assert_eq!(bus.exchange_byte(0x03).unwrap(), 0xBB);
        assert_eq!(bus.exchange_byte(0x03).unwrap(), 0x00);
        bus.deassert_select().unwrap();

        assert_eq!(coprocessor.transactions(), vec![vec![0x03, 0x03, 0x03]]);
        assert!(coprocessor.line_high());
    }

    #[test]
    fn test_edge_missed_while_disabled() {
        let coprocessor = MockCoprocessor::new();
        let mut line = coprocessor.interrupt_line();

        assert!(!coprocessor.raise_request());
        assert_eq!(coprocessor.missed_edges(), 1);
        assert!(line.is_asserted().unwrap());

        coprocessor.set_line_high(true);
        line.enable().unwrap();
        assert!(coprocessor.raise_request());
        assert!(coprocessor.edges().try_recv().is_ok());
    }

    #[test]
    fn test_auto_ready_pulls_line_on_select() {
        let coprocessor = MockCoprocessor::new();
        coprocessor.set_auto_ready(true);
        let mut bus = coprocessor.bus();
        let mut line = coprocessor.interrupt_line();

        bus.assert_select().unwrap();
        assert!(line.is_asserted().unwrap());
        bus.deassert_select().unwrap();
        assert!(!line.is_asserted().unwrap());
    }

    #[test]
    fn test_inbound_queued_during_select_is_deferred() {
        let coprocessor = MockCoprocessor::new();
        let mut bus = coprocessor.bus();
        let mut line = coprocessor.interrupt_line();
        line.enable().unwrap();

        bus.assert_select().unwrap();
        assert!(!coprocessor.queue_inbound(&[0x01]));
        bus.deassert_select().unwrap();

        assert_eq!(coprocessor.delivered_edges(), 1);
        assert!(line.is_asserted().unwrap());
    }

    #[test]
    fn test_scripted_failure() {
        let coprocessor = MockCoprocessor::new();
        let mut bus = coprocessor.bus();
        coprocessor.fail_exchanges_after(1);

        assert!(bus.exchange_byte(0x01).is_ok());
        assert_eq!(bus.exchange_byte(0x01), Err(MockError::ExchangeFailed));
        assert!(bus.exchange_byte(0x01).is_ok());
    }
}
