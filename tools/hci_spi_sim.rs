// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! HCI-SPI link simulator.
//!
//! Runs the transport against the in-memory mock coprocessor: an interrupt
//! thread fed by the mock's edge channel, a responder that answers every
//! chip-select like the real device, a warm-up plus a batch of command
//! writes, then a batch of injected event and data frames. Prints what the
//! sink received and the final counters.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam::channel;
use hci_spi::config::{self, ConfigError, HciSpiConfig};
use hci_spi::hal::MockCoprocessor;
use hci_spi::observability::{debug_flags_help, init_logging, parse_debug_flags};
use hci_spi::transport::{Transport, TransportState};
use tracing::{info, warn};

struct Args {
    config_path: Option<PathBuf>,
    overrides: HashMap<String, String>,
    writes: usize,
    reads: usize,
    log_dir: Option<PathBuf>,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: hci_spi_sim [--config <path>] [--set <key>=<value>]... \
         [--writes <n>] [--reads <n>] [--log-dir <path>] [--debug-<crate>]...\n\n\
         Override keys: rx_capacity, tx_capacity, warmup_delay_us, write_timeout_ms,\n\
         wait_for_ready_edge, log_level\n\n{}",
        debug_flags_help()
    );
    process::exit(2);
}

fn parse_args() -> Args {
    let mut parsed = Args {
        config_path: None,
        overrides: HashMap::new(),
        writes: 8,
        reads: 8,
        log_dir: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                parsed.config_path = Some(PathBuf::from(v));
            }
            "--set" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                let Some((key, value)) = v.split_once('=') else {
                    eprintln!("Expected <key>=<value>, got: {v}");
                    usage_and_exit();
                };
                parsed.overrides.insert(key.to_string(), value.to_string());
            }
            "--writes" | "--reads" => {
                let count = args
                    .next()
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or_else(|| usage_and_exit());
                if arg == "--writes" {
                    parsed.writes = count;
                } else {
                    parsed.reads = count;
                }
            }
            "--log-dir" => {
                let v = args.next().unwrap_or_else(|| usage_and_exit());
                parsed.log_dir = Some(PathBuf::from(v));
            }
            "-h" | "--help" => usage_and_exit(),
            other if other.starts_with("--debug-") => {}
            other => {
                eprintln!("Unknown argument: {other}");
                usage_and_exit();
            }
        }
    }

    parsed
}

/// Config file if one is given or found, defaults otherwise
fn resolve_config(args: &Args) -> Result<HciSpiConfig> {
    let loaded = match &args.config_path {
        Some(path) => config::load_config(Some(path.as_path()), Some(&args.overrides)),
        None => match config::find_config_file() {
            Ok(path) => config::load_config(Some(path.as_path()), Some(&args.overrides)),
            Err(ConfigError::FileNotFound(_)) => {
                let mut defaults = HciSpiConfig::default();
                config::apply_environment_overrides(&mut defaults);
                config::apply_cli_overrides(&mut defaults, &args.overrides);
                Ok(defaults)
            }
            Err(e) => Err(e),
        },
    };
    let resolved = loaded.context("Failed to load configuration")?;
    config::validate_config(&resolved).context("Invalid configuration")?;
    Ok(resolved)
}

/// Inbound event frame: SPI header, HCI event header, parameters, pad
fn event_frame(opcode: u16, status: u8, params: &[u8]) -> Vec<u8> {
    let [opcode_lo, opcode_hi] = opcode.to_le_bytes();
    let mut hci = vec![0x04, opcode_lo, opcode_hi, params.len() as u8 + 1, status];
    hci.extend_from_slice(params);
    spi_wrap(hci, params.len())
}

/// Inbound data frame: SPI header, HCI data header, payload, pad
fn data_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let [len_lo, len_hi] = (payload.len() as u16).to_le_bytes();
    let mut hci = vec![0x02, opcode, 0x00, len_lo, len_hi];
    hci.extend_from_slice(payload);
    spi_wrap(hci, payload.len())
}

fn spi_wrap(mut hci: Vec<u8>, remaining: usize) -> Vec<u8> {
    if (10 + remaining) % 2 == 0 {
        hci.push(0x00);
    }
    let [len_hi, len_lo] = (hci.len() as u16).to_be_bytes();
    let mut frame = vec![0x02, len_hi, len_lo, 0x00, 0x00];
    frame.extend_from_slice(&hci);
    frame
}

fn wait_until(what: &str, timeout: Duration, mut done: impl FnMut() -> bool) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !done() {
        if Instant::now() >= deadline {
            bail!("Timed out waiting for {what}");
        }
        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();
    let config = resolve_config(&args)?;

    let debug_flags = parse_debug_flags();
    let _logging = init_logging(&debug_flags, &config.logging.level, args.log_dir.clone())?;
    for unknown in debug_flags.unknown_crates() {
        warn!(target: "hci-spi", "Unknown crate in debug flags: {}", unknown);
    }

    let coprocessor = MockCoprocessor::new();
    let (frame_tx, frame_rx) = channel::unbounded::<Vec<u8>>();
    let sink = move |payload: &[u8]| {
        // Receiver outlives the transport
        let _ = frame_tx.send(payload.to_vec());
    };
    let transport = Arc::new(
        Transport::open(coprocessor.bus(), coprocessor.interrupt_line(), sink, &config)
            .context("Failed to open transport")?,
    );
    info!(target: "hci-spi", "Transport opened on mock coprocessor");

    let stop = Arc::new(AtomicBool::new(false));

    let isr = {
        let transport = Arc::clone(&transport);
        let edges = coprocessor.edges();
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("hci-spi-irq".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if edges.recv_timeout(Duration::from_millis(10)).is_ok() {
                        if let Err(e) = transport.on_interrupt() {
                            warn!(target: "hci-spi", "Interrupt handling failed: {}", e);
                        }
                    }
                }
            })
            .context("Failed to spawn interrupt thread")?
    };

    let responder = {
        let coprocessor = coprocessor.clone();
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("coprocessor".to_string())
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if coprocessor.is_selected() && coprocessor.line_high() {
                        coprocessor.raise_request();
                    }
                    thread::sleep(Duration::from_micros(100));
                }
            })
            .context("Failed to spawn coprocessor thread")?
    };

    let result = run(&transport, &coprocessor, &frame_rx, &args);

    stop.store(true, Ordering::Relaxed);
    let _ = isr.join();
    let _ = responder.join();
    result?;

    let stats = transport.stats();
    println!("Final state:          {}", transport.state());
    println!("Frames written:       {}", stats.frames_written);
    println!("Frames received:      {}", stats.frames_received);
    println!("Missed-edge writes:   {}", stats.missed_edge_writes);
    println!("Spurious edges:       {}", stats.spurious_edges);
    println!("Timeouts:             {}", stats.timeouts);
    println!("Bus errors:           {}", stats.bus_errors);
    Ok(())
}

fn run(
    transport: &Transport<
        hci_spi::hal::MockBus,
        hci_spi::hal::MockInterruptLine,
        impl hci_spi::transport::FrameSink,
    >,
    coprocessor: &MockCoprocessor,
    frames: &channel::Receiver<Vec<u8>>,
    args: &Args,
) -> Result<()> {
    // Coprocessor announces itself
    coprocessor.raise_request();
    wait_until("coprocessor alive edge", Duration::from_secs(1), || {
        transport.state() == TransportState::Initialized
    })?;

    // Simple-link start, carries the warm-up
    let mut frame = transport.new_frame();
    frame.write_payload(&[0x01, 0x00, 0x40, 0x01, 0x00])?;
    let mut frame = transport.submit_write(frame)?;
    info!(target: "hci-spi", "Warm-up write complete");

    for index in 0..args.writes {
        frame.write_payload(&[0x01, 0x0B, 0x40, 0x01, index as u8])?;
        frame = transport.submit_write(frame)?;
    }
    info!(target: "hci-spi", "{} command writes complete", args.writes);

    for index in 0..args.reads {
        let inbound = if index % 2 == 0 {
            event_frame(0x400B, 0x00, &[index as u8; 4])
        } else {
            data_frame(0x85, &[index as u8; 7])
        };
        coprocessor.queue_inbound(&inbound);
        let payload = frames
            .recv_timeout(Duration::from_secs(1))
            .context("Inbound frame was not delivered")?;
        if payload != inbound[5..] {
            bail!("Frame {} corrupted: {:02x?}", index, payload);
        }
        println!("Received {:02x?}", payload);
    }

    if transport.state() != TransportState::Idle {
        bail!("Transport ended in {}", transport.state());
    }
    Ok(())
}
