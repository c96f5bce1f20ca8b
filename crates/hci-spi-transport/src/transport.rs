// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport state machine
//!
//! Two execution contexts share one [`Transport`]:
//!
//! - caller threads in [`Transport::submit_write`], which block until their
//!   frame has been clocked out,
//! - the interrupt context in [`Transport::on_interrupt`], which services
//!   inbound frames and finishes armed writes.
//!
//! All bus access happens with the state lock held, so the single
//! [`TransportState`] value decides who owns the bus. A write that cannot run
//! immediately is armed (chip-select asserted, state `WriteIrq`) and the
//! caller parks on a condition variable until the interrupt path completes it.
//!
//! Lock order: `rx` before `inner`. The sink runs holding `rx` with `inner`
//! released, so it may query the transport while another thread is already
//! waiting to service the next edge.

use std::time::{Duration, Instant};

use hci_spi_config::HciSpiConfig;
use hci_spi_hal::{InterruptLine, SpiLink};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, trace, warn};

use crate::buffer::{InboundFrame, OutboundFrame};
use crate::error::{Corruption, TransportError, TransportResult};
use crate::frame::{decode_read_header, InboundLayout};
use crate::shuttle::{read_synchronous, write_synchronous};
use crate::sink::FrameSink;
use crate::state::{TransportState, TransportStats};

/// Settings the transport keeps from [`HciSpiConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    /// InboundFrame usable bytes
    pub rx_capacity: usize,
    /// Usable bytes of frames handed out by `new_frame`
    pub tx_capacity: usize,
    /// Busy-wait before and between the warm-up portions
    pub warmup_delay_us: u32,
    /// Bytes in the first warm-up portion
    pub warmup_first_portion: usize,
    /// Bound on every wait inside `submit_write`; `None` waits forever
    pub write_timeout: Option<Duration>,
    /// Hold the warm-up until the coprocessor's alive edge
    pub wait_for_ready_edge: bool,
}

impl From<&HciSpiConfig> for TransportSettings {
    fn from(config: &HciSpiConfig) -> Self {
        Self {
            rx_capacity: config.buffers.rx_capacity,
            tx_capacity: config.buffers.tx_capacity,
            warmup_delay_us: config.timing.warmup_delay_us,
            warmup_first_portion: config.timing.warmup_first_portion,
            write_timeout: config.timeouts.write_timeout(),
            wait_for_ready_edge: config.power_up.wait_for_ready_edge,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self::from(&HciSpiConfig::default())
    }
}

/// Write armed in `WriteIrq`, waiting for the ready edge
#[derive(Debug)]
struct ArmedWrite {
    frame: OutboundFrame,
    total: usize,
}

struct Inner<B, L> {
    state: TransportState,
    bus: B,
    line: L,
    armed: Option<ArmedWrite>,
    completed: Option<TransportResult<OutboundFrame>>,
    fault: Option<Corruption>,
    stats: TransportStats,
}

impl<B, L> Inner<B, L> {
    fn set_state(&mut self, next: TransportState) {
        trace!(target: "hci-spi-transport", "{} -> {}", self.state, next);
        self.state = next;
    }

    fn halted_error(&self, operation: &'static str) -> TransportError {
        match self.fault {
            Some(corruption) => TransportError::Corrupted(corruption),
            None => TransportError::InvalidState {
                operation,
                state: self.state,
            },
        }
    }
}

struct Receive<S> {
    frame: InboundFrame,
    sink: S,
}

/// Half-duplex HCI-over-SPI transport
///
/// `B` drives the bus, `L` is the coprocessor's active-low interrupt line and
/// `S` receives completed inbound frames. Share it behind an `Arc` between the
/// writer threads and whatever forwards interrupt edges to
/// [`Transport::on_interrupt`].
pub struct Transport<B, L, S> {
    inner: Mutex<Inner<B, L>>,
    rx: Mutex<Receive<S>>,
    changed: Condvar,
    writers: Mutex<()>,
    settings: TransportSettings,
}

impl<B, L, S> Transport<B, L, S>
where
    B: SpiLink + Send,
    L: InterruptLine + Send,
    S: FrameSink,
{
    /// Open the link
    ///
    /// Allocates the InboundFrame with its guard byte, enters `PowerUp` and
    /// enables the interrupt line. The first edge afterwards announces the
    /// coprocessor; the first write performs the warm-up.
    pub fn open(bus: B, line: L, sink: S, config: &HciSpiConfig) -> TransportResult<Self> {
        Self::with_settings(bus, line, sink, TransportSettings::from(config))
    }

    /// Open the link with explicit settings
    pub fn with_settings(
        bus: B,
        line: L,
        sink: S,
        settings: TransportSettings,
    ) -> TransportResult<Self> {
        let transport = Self {
            inner: Mutex::new(Inner {
                state: TransportState::PowerUp,
                bus,
                line,
                armed: None,
                completed: None,
                fault: None,
                stats: TransportStats::default(),
            }),
            rx: Mutex::new(Receive {
                frame: InboundFrame::new(settings.rx_capacity),
                sink,
            }),
            changed: Condvar::new(),
            writers: Mutex::new(()),
            settings,
        };

        transport
            .inner
            .lock()
            .line
            .enable()
            .map_err(TransportError::interrupt)?;
        debug!(
            target: "hci-spi-transport",
            "Transport opened (rx {} bytes, tx {} bytes)",
            settings.rx_capacity,
            settings.tx_capacity
        );
        Ok(transport)
    }

    /// Close the link
    ///
    /// Disables the interrupt line and returns to `PowerUp`, so the next write
    /// repeats the warm-up. A halted transport stays halted. Fails while a
    /// write is armed.
    pub fn close(&self) -> TransportResult<()> {
        let mut inner = self.inner.lock();
        let state = inner.state;
        match state {
            TransportState::Halted => {
                inner.line.disable().map_err(TransportError::interrupt)?;
                Ok(())
            }
            TransportState::Idle | TransportState::PowerUp | TransportState::Initialized => {
                inner.line.disable().map_err(TransportError::interrupt)?;
                inner.set_state(TransportState::PowerUp);
                self.changed.notify_all();
                debug!(target: "hci-spi-transport", "Transport closed");
                Ok(())
            }
            state => Err(TransportError::InvalidState {
                operation: "close",
                state,
            }),
        }
    }

    /// Current state
    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    /// Corruption that halted the transport, if any
    pub fn fault(&self) -> Option<Corruption> {
        self.inner.lock().fault
    }

    /// Counter snapshot
    pub fn stats(&self) -> TransportStats {
        self.inner.lock().stats
    }

    /// Settings in effect
    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Allocate an OutboundFrame of the configured TX capacity
    pub fn new_frame(&self) -> OutboundFrame {
        OutboundFrame::new(self.settings.tx_capacity)
    }

    /// Write one frame, blocking until it has been clocked out
    ///
    /// The first write after `open` or `close` runs the warm-up handshake.
    /// Later writes wait for `Idle`, arm the write and either complete it on
    /// the spot (the ready edge already fired) or park until `on_interrupt`
    /// completes it. The frame is handed back on success; on error it is
    /// dropped.
    ///
    /// # Errors
    ///
    /// - `Corrupted` if a guard byte no longer matches, or the transport halted
    /// - `Timeout` if the configured write timeout expires
    /// - `Bus` / `Interrupt` if a capability fails
    pub fn submit_write(&self, mut frame: OutboundFrame) -> TransportResult<OutboundFrame> {
        let _writer = self.writers.lock();
        let started = Instant::now();
        let deadline = self.settings.write_timeout.map(|timeout| started + timeout);

        let mut inner = self.inner.lock();
        if inner.state == TransportState::Halted {
            return Err(inner.halted_error("submit_write"));
        }
        if let Err(corruption) = frame.check_guard() {
            return Err(self.halt(&mut inner, corruption));
        }
        let total = frame.prepare()?;

        let mut expired = false;
        loop {
            let state = inner.state;
            match state {
                TransportState::Halted => return Err(inner.halted_error("submit_write")),
                TransportState::Idle => break,
                TransportState::PowerUp if self.settings.wait_for_ready_edge => {
                    if expired {
                        return Err(self.timed_out(&mut inner, "coprocessor ready edge", started));
                    }
                }
                state if state.needs_warmup() => {
                    self.warm_up(&mut inner, &frame, total)?;
                    return Ok(frame);
                }
                _ => {
                    if expired {
                        return Err(self.timed_out(&mut inner, "idle", started));
                    }
                }
            }
            expired = !self.wait(&mut inner, deadline);
        }

        self.arm(&mut inner, frame, total)?;

        let asserted = match inner.line.is_asserted() {
            Ok(asserted) => asserted,
            Err(e) => {
                inner.armed = None;
                return Err(self.abort(&mut inner, TransportError::interrupt(e)));
            }
        };
        if asserted {
            // Edge fired while the line was disabled
            inner.stats.missed_edge_writes += 1;
            debug!(target: "hci-spi-transport", "Ready edge already passed, writing now");
            return self.complete_armed_write(&mut inner);
        }

        let mut expired = false;
        loop {
            if let Some(result) = inner.completed.take() {
                return result;
            }
            if inner.state == TransportState::Halted {
                return Err(inner.halted_error("submit_write"));
            }
            if expired {
                return Err(self.disarm(&mut inner, started));
            }
            expired = !self.wait(&mut inner, deadline);
        }
    }

    /// Handle one falling edge of the interrupt line
    ///
    /// | State | Action |
    /// |-------|--------|
    /// | `PowerUp` | coprocessor alive, enter `Initialized` |
    /// | `Idle` | read one inbound frame and hand it to the sink |
    /// | `WriteIrq` | clock out the armed write |
    /// | `Halted` | nothing |
    ///
    /// Edges in any other state, and edges whose line is no longer asserted,
    /// are ignored.
    pub fn on_interrupt(&self) -> TransportResult<()> {
        let mut inner = self.inner.lock();
        if inner.state == TransportState::Idle {
            // Re-acquire in lock order; a sink still running elsewhere finishes first
            drop(inner);
            let rx = self.rx.lock();
            inner = self.inner.lock();
            if inner.state == TransportState::Idle {
                if !self.line_asserted(&mut inner)? {
                    return Ok(());
                }
                return self.service_read(inner, rx);
            }
        }

        let state = inner.state;
        match state {
            TransportState::Halted => Ok(()),
            TransportState::PowerUp => {
                inner.set_state(TransportState::Initialized);
                self.changed.notify_all();
                debug!(target: "hci-spi-transport", "Coprocessor announced itself");
                Ok(())
            }
            TransportState::WriteIrq => {
                if !self.line_asserted(&mut inner)? {
                    return Ok(());
                }
                let result = self.complete_armed_write(&mut inner);
                let outcome = match &result {
                    Ok(_) => Ok(()),
                    Err(e) => Err(e.clone()),
                };
                inner.completed = Some(result);
                self.changed.notify_all();
                outcome
            }
            state => {
                trace!(target: "hci-spi-transport", "Ignoring edge in {}", state);
                Ok(())
            }
        }
    }

    /// Tear the transport down, returning the capabilities and the sink
    pub fn into_parts(self) -> (B, L, S) {
        let inner = self.inner.into_inner();
        let rx = self.rx.into_inner();
        (inner.bus, inner.line, rx.sink)
    }

    fn line_asserted(&self, inner: &mut Inner<B, L>) -> TransportResult<bool> {
        let asserted = inner.line.is_asserted().map_err(TransportError::interrupt)?;
        if !asserted {
            inner.stats.spurious_edges += 1;
            trace!(target: "hci-spi-transport", "Line released before edge was serviced");
        }
        Ok(asserted)
    }

    /// Park until the state changes; false once `deadline` has passed
    fn wait(&self, inner: &mut MutexGuard<'_, Inner<B, L>>, deadline: Option<Instant>) -> bool {
        match deadline {
            Some(deadline) => !self.changed.wait_until(inner, deadline).timed_out(),
            None => {
                self.changed.wait(inner);
                true
            }
        }
    }

    fn warm_up(
        &self,
        inner: &mut Inner<B, L>,
        frame: &OutboundFrame,
        total: usize,
    ) -> TransportResult<()> {
        inner.set_state(TransportState::WriteFirstPortion);
        let wire = frame.wire(total);
        let first = self.settings.warmup_first_portion.min(total);
        let delay = self.settings.warmup_delay_us;

        let exchanged = Self::exchange_warm_up(&mut inner.bus, wire, first, delay);
        let released = inner.bus.deassert_select().map_err(TransportError::bus);
        if let Err(e) = exchanged.and(released) {
            return Err(self.abort(inner, e));
        }

        if let Err(corruption) = frame.check_guard() {
            return Err(self.halt(inner, corruption));
        }
        inner.set_state(TransportState::Idle);
        inner.stats.frames_written += 1;
        self.changed.notify_all();
        debug!(target: "hci-spi-transport", "Warm-up write done ({} bytes)", total);
        Ok(())
    }

    /// Select, settle, first portion, settle, remainder
    fn exchange_warm_up(bus: &mut B, wire: &[u8], first: usize, delay: u32) -> TransportResult<()> {
        bus.assert_select().map_err(TransportError::bus)?;
        bus.delay_us(delay);
        write_synchronous(&mut *bus, &wire[..first])?;
        bus.delay_us(delay);
        write_synchronous(&mut *bus, &wire[first..])
    }

    /// Disable edges, record the write, select the coprocessor, re-enable
    fn arm(
        &self,
        inner: &mut Inner<B, L>,
        frame: OutboundFrame,
        total: usize,
    ) -> TransportResult<()> {
        inner.line.disable().map_err(TransportError::interrupt)?;
        inner.set_state(TransportState::WriteIrq);
        inner.armed = Some(ArmedWrite { frame, total });
        inner.completed = None;

        if let Err(e) = inner.bus.assert_select() {
            inner.armed = None;
            if let Err(line_err) = inner.line.enable() {
                warn!(
                    target: "hci-spi-transport",
                    "Interrupt line left disabled after failed select: {:?}",
                    line_err
                );
            }
            return Err(self.abort(inner, TransportError::bus(e)));
        }
        if let Err(e) = inner.line.enable() {
            inner.armed = None;
            return Err(self.abort(inner, TransportError::interrupt(e)));
        }
        Ok(())
    }

    fn complete_armed_write(&self, inner: &mut Inner<B, L>) -> TransportResult<OutboundFrame> {
        let Some(ArmedWrite { frame, total }) = inner.armed.take() else {
            return Err(TransportError::InvalidState {
                operation: "complete write",
                state: inner.state,
            });
        };

        inner.set_state(TransportState::WriteEot);
        let written = write_synchronous(&mut inner.bus, frame.wire(total));
        let released = inner.bus.deassert_select().map_err(TransportError::bus);
        if let Err(e) = written.and(released) {
            return Err(self.abort(inner, e));
        }

        if let Err(corruption) = frame.check_guard() {
            return Err(self.halt(inner, corruption));
        }
        inner.set_state(TransportState::Idle);
        inner.stats.frames_written += 1;
        self.changed.notify_all();
        debug!(
            target: "hci-spi-transport",
            "Wrote frame ({} payload bytes, {} on the wire)",
            frame.payload_len(),
            total
        );
        Ok(frame)
    }

    fn service_read(
        &self,
        mut inner: MutexGuard<'_, Inner<B, L>>,
        mut rx: MutexGuard<'_, Receive<S>>,
    ) -> TransportResult<()> {
        if let Err(corruption) = rx.frame.check_guard() {
            return Err(self.halt(&mut inner, corruption));
        }

        inner.set_state(TransportState::ReadIrq);
        let layout = match Self::read_frame(&mut inner, &mut rx.frame) {
            Ok(layout) => layout,
            Err(TransportError::Corrupted(corruption)) => {
                return Err(self.halt(&mut inner, corruption))
            }
            Err(e) => return Err(self.abort(&mut inner, e)),
        };

        if let Err(corruption) = rx.frame.check_guard() {
            return Err(self.halt(&mut inner, corruption));
        }
        inner.set_state(TransportState::Idle);
        inner.stats.frames_received += 1;
        self.changed.notify_all();
        drop(inner);

        debug!(
            target: "hci-spi-transport",
            "Received {:?} frame ({} bytes after header)",
            layout.kind,
            layout.remaining()
        );
        let Receive { frame, sink } = &mut *rx;
        sink.on_frame_received(frame.payload());
        Ok(())
    }

    fn read_frame(inner: &mut Inner<B, L>, frame: &mut InboundFrame) -> TransportResult<InboundLayout> {
        inner.bus.assert_select().map_err(TransportError::bus)?;
        inner.set_state(TransportState::ReadFirstPortion);
        read_synchronous(&mut inner.bus, frame.begin())?;

        let layout = decode_read_header(&frame.header());
        inner.set_state(TransportState::ReadEot);
        read_synchronous(&mut inner.bus, frame.body_mut(layout.remaining())?)?;
        inner.bus.deassert_select().map_err(TransportError::bus)?;

        frame.complete(layout.total());
        Ok(layout)
    }

    /// Enter `Halted`; nothing touches the bus afterwards
    ///
    /// The bus is left as it is: a read that overran the InboundFrame keeps
    /// chip-select asserted.
    fn halt(&self, inner: &mut Inner<B, L>, corruption: Corruption) -> TransportError {
        error!(
            target: "hci-spi-transport",
            "Buffer corruption in {}: {}; transport halted",
            inner.state,
            corruption
        );
        inner.armed = None;
        inner.fault = Some(corruption);
        inner.set_state(TransportState::Halted);
        self.changed.notify_all();
        TransportError::Corrupted(corruption)
    }

    /// Abandon the transaction after a capability failure
    fn abort(&self, inner: &mut Inner<B, L>, error: TransportError) -> TransportError {
        warn!(
            target: "hci-spi-transport",
            "Transaction aborted in {}: {}",
            inner.state,
            error
        );
        let _ = inner.bus.deassert_select();
        inner.stats.bus_errors += 1;
        inner.set_state(TransportState::Idle);
        self.changed.notify_all();
        error
    }

    fn timed_out(
        &self,
        inner: &mut Inner<B, L>,
        waiting_for: &'static str,
        started: Instant,
    ) -> TransportError {
        inner.stats.timeouts += 1;
        let waited = started.elapsed();
        warn!(
            target: "hci-spi-transport",
            "Write gave up after {:?} waiting for {}",
            waited,
            waiting_for
        );
        TransportError::Timeout {
            waiting_for,
            waited,
        }
    }

    /// Take back an armed write whose edge never came
    fn disarm(&self, inner: &mut Inner<B, L>, started: Instant) -> TransportError {
        inner.armed = None;
        let _ = inner.bus.deassert_select();
        inner.set_state(TransportState::Idle);
        self.changed.notify_all();
        self.timed_out(inner, "ready edge", started)
    }
}
