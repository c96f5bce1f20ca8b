// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end transport scenarios against the mock coprocessor

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use hci_spi_hal::{BusEvent, MockBus, MockCoprocessor, MockInterruptLine};
use hci_spi_transport::{
    FrameSink, Transport, TransportError, TransportSettings, TransportState, TransportStats,
    SPI_OP_READ,
};
use parking_lot::Mutex;

#[derive(Clone, Default)]
struct Collect(Arc<Mutex<Vec<Vec<u8>>>>);

impl Collect {
    fn frames(&self) -> Vec<Vec<u8>> {
        self.0.lock().clone()
    }
}

impl FrameSink for Collect {
    fn on_frame_received(&mut self, payload: &[u8]) {
        self.0.lock().push(payload.to_vec());
    }
}

type MockTransport = Transport<MockBus, MockInterruptLine, Collect>;

fn open_with(coprocessor: &MockCoprocessor, settings: TransportSettings) -> (MockTransport, Collect) {
    let sink = Collect::default();
    let transport = Transport::with_settings(
        coprocessor.bus(),
        coprocessor.interrupt_line(),
        sink.clone(),
        settings,
    )
    .unwrap();
    (transport, sink)
}

fn open(coprocessor: &MockCoprocessor, timeout_ms: u64) -> (MockTransport, Collect) {
    open_with(
        coprocessor,
        TransportSettings {
            write_timeout: Some(Duration::from_millis(timeout_ms)),
            ..TransportSettings::default()
        },
    )
}

fn write(transport: &MockTransport, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut frame = transport.new_frame();
    frame.write_payload(payload).unwrap();
    transport
        .submit_write(frame)
        .map(|frame| frame.payload().to_vec())
}

/// Open, run the warm-up and forget its bus traffic
fn warmed_up(coprocessor: &MockCoprocessor, timeout_ms: u64) -> (MockTransport, Collect) {
    let (transport, sink) = open(coprocessor, timeout_ms);
    write(&transport, &[0x01, 0x0B, 0x40]).unwrap();
    coprocessor.clear_events();
    (transport, sink)
}

fn wait_for_state(transport: &MockTransport, state: TransportState) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while transport.state() != state {
        assert!(Instant::now() < deadline, "never reached {}", state);
        thread::sleep(Duration::from_millis(1));
    }
}

fn exchanges(events: &[BusEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, BusEvent::Exchange { .. }))
        .count()
}

#[test]
fn test_first_write_performs_warm_up() {
    let coprocessor = MockCoprocessor::new();
    let (transport, _) = open(&coprocessor, 100);

    let payload = [0x01, 0x00, 0x40, 0x01, 0x00];
    write(&transport, &payload).unwrap();

    let events = coprocessor.events();
    let mut expected = vec![BusEvent::Select, BusEvent::Delay(50)];
    let wire = [0x01, 0x00, 0x05, 0x00, 0x00, 0x01, 0x00, 0x40, 0x01, 0x00];
    for (index, &mosi) in wire.iter().enumerate() {
        if index == 4 {
            expected.push(BusEvent::Delay(50));
        }
        expected.push(BusEvent::Exchange { mosi, miso: 0x00 });
    }
    expected.push(BusEvent::Deselect);

    assert_eq!(events, expected);
    assert_eq!(transport.state(), TransportState::Idle);
    assert_eq!(transport.stats().frames_written, 1);
}

#[test]
fn test_warm_up_runs_once() {
    let coprocessor = MockCoprocessor::new();
    coprocessor.set_auto_ready(true);
    let (transport, _) = warmed_up(&coprocessor, 100);

    write(&transport, &[0x01, 0x02]).unwrap();

    let events = coprocessor.events();
    assert!(!events.iter().any(|event| matches!(event, BusEvent::Delay(_))));
    assert_eq!(
        coprocessor.transactions(),
        vec![vec![0x01, 0x00, 0x03, 0x00, 0x00, 0x01, 0x02, 0x00]]
    );
}

#[test]
fn test_missed_edge_completes_in_same_call() {
    let coprocessor = MockCoprocessor::new();
    coprocessor.set_auto_ready(true);
    let (transport, _) = warmed_up(&coprocessor, 100);
    let missed_before = coprocessor.missed_edges();

    let payload = write(&transport, &[0x01, 0x05, 0x10, 0x00]).unwrap();

    // Nobody called on_interrupt; the level re-check carried the write
    assert_eq!(payload, vec![0x01, 0x05, 0x10, 0x00]);
    assert_eq!(coprocessor.missed_edges(), missed_before + 1);
    assert_eq!(transport.state(), TransportState::Idle);
    assert!(!coprocessor.is_selected());
    assert_eq!(transport.stats().missed_edge_writes, 1);
    assert_eq!(coprocessor.transactions().len(), 1);
}

#[test]
fn test_interrupt_completes_armed_write() {
    let coprocessor = MockCoprocessor::new();
    let (transport, _) = warmed_up(&coprocessor, 2_000);
    let transport = Arc::new(transport);

    let writer = {
        let transport = Arc::clone(&transport);
        thread::spawn(move || write(&transport, &[0x01, 0x00, 0x40]))
    };

    wait_for_state(&transport, TransportState::WriteIrq);
    assert!(coprocessor.is_selected());
    assert!(coprocessor.line_enabled());
    assert_eq!(exchanges(&coprocessor.events()), 0);

    assert!(coprocessor.raise_request());
    transport.on_interrupt().unwrap();

    assert_eq!(writer.join().unwrap().unwrap(), vec![0x01, 0x00, 0x40]);
    assert_eq!(transport.state(), TransportState::Idle);
    assert_eq!(transport.stats().missed_edge_writes, 0);
    assert_eq!(transport.stats().frames_written, 2);
    assert_eq!(
        coprocessor.transactions(),
        vec![vec![0x01, 0x00, 0x03, 0x00, 0x00, 0x01, 0x00, 0x40]]
    );
}

#[test]
fn test_write_disables_line_while_arming() {
    let coprocessor = MockCoprocessor::new();
    coprocessor.set_auto_ready(true);
    let (transport, _) = warmed_up(&coprocessor, 100);
    let (enables, disables) = coprocessor.line_toggles();

    write(&transport, &[0x01]).unwrap();

    assert_eq!(coprocessor.line_toggles(), (enables + 1, disables + 1));
    assert!(coprocessor.line_enabled());
}

#[test]
fn test_event_frame_read() {
    let coprocessor = MockCoprocessor::new();
    let (transport, sink) = warmed_up(&coprocessor, 100);

    // Event length byte 0x05 -> 4 bytes, 10 + 4 is even -> one pad byte
    let header = [0x02, 0x00, 0xFF, 0x00, 0x00, 0x04, 0x0F, 0x40, 0x05, 0x00];
    let rest = [0x00, 0xAA, 0xBB, 0xCC, 0xDD];
    let mut inbound = header.to_vec();
    inbound.extend_from_slice(&rest);
    assert!(coprocessor.queue_inbound(&inbound));

    transport.on_interrupt().unwrap();

    let events = coprocessor.events();
    assert_eq!(events.first(), Some(&BusEvent::Select));
    assert_eq!(events.last(), Some(&BusEvent::Deselect));
    assert_eq!(exchanges(&events), 15);
    assert!(events.iter().all(|event| match event {
        BusEvent::Exchange { mosi, .. } => *mosi == SPI_OP_READ,
        _ => true,
    }));
    assert_eq!(coprocessor.pending_inbound(), 0);
    assert_eq!(sink.frames(), vec![inbound[5..].to_vec()]);
    assert_eq!(transport.state(), TransportState::Idle);
    assert_eq!(transport.stats().frames_received, 1);
}

#[test]
fn test_event_frame_without_pad() {
    let coprocessor = MockCoprocessor::new();
    let (transport, sink) = warmed_up(&coprocessor, 100);

    // 0x06 -> 5 bytes, 10 + 5 is odd -> no pad
    let inbound = [
        0x02, 0x00, 0xFF, 0x00, 0x00, 0x04, 0x0F, 0x40, 0x06, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05,
    ];
    coprocessor.queue_inbound(&inbound);
    transport.on_interrupt().unwrap();

    assert_eq!(exchanges(&coprocessor.events()), 15);
    assert_eq!(sink.frames(), vec![inbound[5..].to_vec()]);
}

#[test]
fn test_data_frame_read() {
    let coprocessor = MockCoprocessor::new();
    let (transport, sink) = warmed_up(&coprocessor, 100);

    // Little-endian 0x0006 -> 6 bytes, 10 + 6 is even -> pad
    let mut inbound = vec![0x02, 0x00, 0xFF, 0x00, 0x00, 0x02, 0x85, 0x00, 0x06, 0x00];
    inbound.extend_from_slice(&[0x00, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
    coprocessor.queue_inbound(&inbound);
    transport.on_interrupt().unwrap();

    assert_eq!(exchanges(&coprocessor.events()), 17);
    assert_eq!(sink.frames(), vec![inbound[5..].to_vec()]);
    assert_eq!(coprocessor.pending_inbound(), 0);
}

#[test]
fn test_unknown_type_is_zero_payload() {
    let coprocessor = MockCoprocessor::new();
    let (transport, sink) = warmed_up(&coprocessor, 100);

    let inbound = [0x02, 0x00, 0xFF, 0x00, 0x00, 0x7F, 0x01, 0x02, 0x30, 0x30];
    coprocessor.queue_inbound(&inbound);
    transport.on_interrupt().unwrap();

    assert_eq!(exchanges(&coprocessor.events()), 10);
    assert_eq!(sink.frames(), vec![inbound[5..].to_vec()]);
    assert_eq!(transport.state(), TransportState::Idle);
}

#[test]
fn test_sink_runs_after_bus_released() {
    let coprocessor = MockCoprocessor::new();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = {
        let coprocessor = coprocessor.clone();
        let observed = Arc::clone(&observed);
        move |payload: &[u8]| observed.lock().push((coprocessor.is_selected(), payload.len()))
    };
    let transport = Transport::with_settings(
        coprocessor.bus(),
        coprocessor.interrupt_line(),
        sink,
        TransportSettings::default(),
    )
    .unwrap();
    let mut frame = transport.new_frame();
    frame.write_payload(&[0x01]).unwrap();
    transport.submit_write(frame).unwrap();

    coprocessor.queue_inbound(&[0x02, 0x00, 0xFF, 0x00, 0x00, 0x04, 0x0F, 0x40, 0x06, 0x00, 1, 2, 3, 4, 5]);
    transport.on_interrupt().unwrap();

    assert_eq!(*observed.lock(), vec![(false, 10)]);
}

type StatsQuery = Box<dyn Fn() -> TransportStats + Send + Sync>;

/// Sink that lingers, then reads the transport's counters from inside the callback
#[derive(Clone, Default)]
struct QueryingSink {
    entered: Arc<AtomicBool>,
    query: Arc<OnceLock<StatsQuery>>,
    seen: Arc<Mutex<Vec<TransportStats>>>,
}

impl FrameSink for QueryingSink {
    fn on_frame_received(&mut self, _payload: &[u8]) {
        self.entered.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));
        if let Some(query) = self.query.get() {
            self.seen.lock().push(query());
        }
    }
}

#[test]
fn test_sink_queries_transport_while_next_edge_waits() {
    let coprocessor = MockCoprocessor::new();
    let sink = QueryingSink::default();
    let settings = TransportSettings {
        write_timeout: Some(Duration::from_millis(500)),
        ..TransportSettings::default()
    };
    let transport = Arc::new(
        Transport::with_settings(
            coprocessor.bus(),
            coprocessor.interrupt_line(),
            sink.clone(),
            settings,
        )
        .unwrap(),
    );
    let weak = Arc::downgrade(&transport);
    let query: StatsQuery =
        Box::new(move || weak.upgrade().map(|t| t.stats()).unwrap_or_default());
    assert!(sink.query.set(query).is_ok());

    let mut frame = transport.new_frame();
    frame.write_payload(&[0x01, 0x0B, 0x40]).unwrap();
    transport.submit_write(frame).unwrap();

    let inbound = [
        0x02, 0x00, 0xFF, 0x00, 0x00, 0x04, 0x0F, 0x40, 0x05, 0x00, 0x00, 0xAA, 0xBB, 0xCC, 0xDD,
    ];
    coprocessor.queue_inbound(&inbound);
    let first = {
        let transport = Arc::clone(&transport);
        thread::spawn(move || transport.on_interrupt())
    };

    let deadline = Instant::now() + Duration::from_secs(2);
    while !sink.entered.load(Ordering::SeqCst) {
        assert!(Instant::now() < deadline, "sink never ran");
        thread::sleep(Duration::from_millis(1));
    }

    // Second frame arrives while the first sink call is still running
    coprocessor.queue_inbound(&inbound);
    let second = {
        let transport = Arc::clone(&transport);
        thread::spawn(move || transport.on_interrupt())
    };

    let deadline = Instant::now() + Duration::from_secs(3);
    while !(first.is_finished() && second.is_finished()) {
        assert!(Instant::now() < deadline, "edge handlers blocked on the sink");
        thread::sleep(Duration::from_millis(1));
    }
    first.join().unwrap().unwrap();
    second.join().unwrap().unwrap();

    let seen = sink.seen.lock().clone();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].frames_received, 1);
    assert_eq!(seen[1].frames_received, 2);
    assert_eq!(transport.state(), TransportState::Idle);
    assert_eq!(coprocessor.pending_inbound(), 0);
}

#[test]
fn test_spurious_edge_is_ignored() {
    let coprocessor = MockCoprocessor::new();
    let (transport, sink) = warmed_up(&coprocessor, 100);

    // Line still high: the edge was already serviced
    transport.on_interrupt().unwrap();

    assert!(coprocessor.events().is_empty());
    assert!(sink.frames().is_empty());
    assert_eq!(transport.stats().spurious_edges, 1);
    assert_eq!(transport.state(), TransportState::Idle);
}

#[test]
fn test_timeout_disarms_write() {
    let coprocessor = MockCoprocessor::new();
    let (transport, _) = warmed_up(&coprocessor, 30);

    let err = write(&transport, &[0x01, 0x02, 0x03]).unwrap_err();

    assert!(matches!(
        err,
        TransportError::Timeout {
            waiting_for: "ready edge",
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(transport.state(), TransportState::Idle);
    assert!(!coprocessor.is_selected());
    assert_eq!(
        coprocessor.events(),
        vec![BusEvent::Select, BusEvent::Deselect]
    );
    assert_eq!(transport.stats().timeouts, 1);

    // The link is usable again
    coprocessor.set_auto_ready(true);
    write(&transport, &[0x01]).unwrap();
}

#[test]
fn test_bus_error_during_read_returns_to_idle() {
    let coprocessor = MockCoprocessor::new();
    let (transport, sink) = warmed_up(&coprocessor, 100);

    coprocessor.queue_inbound(&[0x02, 0x00, 0xFF, 0x00, 0x00, 0x04, 0x0F, 0x40, 0x06, 0x00, 1, 2, 3, 4, 5]);
    coprocessor.fail_exchanges_after(3);

    let err = transport.on_interrupt().unwrap_err();

    assert!(matches!(err, TransportError::Bus(_)));
    assert!(!err.is_fatal());
    assert_eq!(transport.state(), TransportState::Idle);
    assert!(!coprocessor.is_selected());
    assert!(sink.frames().is_empty());
    assert_eq!(transport.stats().bus_errors, 1);
}

#[test]
fn test_bus_error_during_write_returns_to_idle() {
    let coprocessor = MockCoprocessor::new();
    coprocessor.set_auto_ready(true);
    let (transport, _) = warmed_up(&coprocessor, 100);

    coprocessor.fail_exchanges_after(2);
    assert!(matches!(
        write(&transport, &[0x01, 0x02, 0x03]),
        Err(TransportError::Bus(_))
    ));
    assert_eq!(transport.state(), TransportState::Idle);
    assert!(!coprocessor.is_selected());

    write(&transport, &[0x01, 0x02, 0x03]).unwrap();
    assert_eq!(transport.stats().bus_errors, 1);
}

#[test]
fn test_close_then_write_repeats_warm_up() {
    let coprocessor = MockCoprocessor::new();
    let (transport, _) = warmed_up(&coprocessor, 100);

    transport.close().unwrap();
    assert_eq!(transport.state(), TransportState::PowerUp);
    assert!(!coprocessor.line_enabled());

    write(&transport, &[0x01, 0x02, 0x03]).unwrap();

    let events = coprocessor.events();
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, BusEvent::Delay(50)))
            .count(),
        2
    );
    assert_eq!(transport.state(), TransportState::Idle);
}

#[test]
fn test_wait_for_ready_edge_holds_warm_up() {
    let coprocessor = MockCoprocessor::new();
    let (transport, _) = open_with(
        &coprocessor,
        TransportSettings {
            wait_for_ready_edge: true,
            write_timeout: Some(Duration::from_secs(2)),
            ..TransportSettings::default()
        },
    );
    let transport = Arc::new(transport);

    let writer = {
        let transport = Arc::clone(&transport);
        thread::spawn(move || write(&transport, &[0x01, 0x02, 0x03]))
    };

    thread::sleep(Duration::from_millis(20));
    assert!(coprocessor.events().is_empty());
    assert_eq!(transport.state(), TransportState::PowerUp);

    coprocessor.raise_request();
    transport.on_interrupt().unwrap();

    writer.join().unwrap().unwrap();
    assert!(coprocessor.events().contains(&BusEvent::Delay(50)));
    assert_eq!(transport.state(), TransportState::Idle);
}

#[test]
fn test_wait_for_ready_edge_times_out() {
    let coprocessor = MockCoprocessor::new();
    let (transport, _) = open_with(
        &coprocessor,
        TransportSettings {
            wait_for_ready_edge: true,
            write_timeout: Some(Duration::from_millis(20)),
            ..TransportSettings::default()
        },
    );

    let err = write(&transport, &[0x01]).unwrap_err();

    assert!(matches!(
        err,
        TransportError::Timeout {
            waiting_for: "coprocessor ready edge",
            ..
        }
    ));
    assert_eq!(transport.state(), TransportState::PowerUp);
    assert!(coprocessor.events().is_empty());
}

#[test]
fn test_concurrent_writers_with_live_coprocessor() {
    const WRITERS: usize = 4;
    const WRITES_EACH: usize = 10;

    let coprocessor = MockCoprocessor::new();
    let (transport, _) = warmed_up(&coprocessor, 2_000);
    let transport = Arc::new(transport);
    let stop = Arc::new(AtomicBool::new(false));

    // Coprocessor answers every select by pulling the line low
    let responder = {
        let coprocessor = coprocessor.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if coprocessor.is_selected() && coprocessor.line_high() {
                    coprocessor.raise_request();
                }
                thread::sleep(Duration::from_micros(50));
            }
        })
    };

    // Interrupt context
    let isr = {
        let transport = Arc::clone(&transport);
        let edges = coprocessor.edges();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if edges.recv_timeout(Duration::from_millis(5)).is_ok() {
                    transport.on_interrupt().unwrap();
                }
            }
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                for index in 0..WRITES_EACH {
                    let payload = vec![0x01, writer as u8, index as u8];
                    assert_eq!(write(&transport, &payload).unwrap(), payload);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    responder.join().unwrap();
    isr.join().unwrap();

    let transactions = coprocessor.transactions();
    assert_eq!(transactions.len(), WRITERS * WRITES_EACH);
    for transaction in &transactions {
        assert_eq!(transaction[0], 0x01);
        assert_eq!(transaction.len() % 2, 0);
        assert_eq!(transaction.len(), 5 + transaction[2] as usize);
    }
    assert_eq!(transport.stats().frames_written as usize, WRITERS * WRITES_EACH + 1);
    assert_eq!(transport.state(), TransportState::Idle);
}
