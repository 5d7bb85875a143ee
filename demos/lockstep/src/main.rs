//! Convoy Lockstep Demo
//!
//! Runs two convoy sessions against each other over fault-injecting
//! in-process links, driven by virtual time. Every datagram either side
//! emits is shuttled by hand, so a full lossy conversation finishes in
//! microseconds and is exactly reproducible from its seed.
//!
//! Environment variables:
//! - CONVOY_MESSAGES: messages to transfer (default 40)
//! - CONVOY_LOSS: drop probability per datagram (default 0.25)
//! - CONVOY_DUPLICATE: duplication probability (default 0.10)
//! - CONVOY_REORDER: reorder probability (default 0.10)
//! - CONVOY_SEED: seed for the link conditioners (default 7)
//! - RUST_LOG: log level (error|warn|info|debug|trace)

use std::process::ExitCode;
use std::str::FromStr;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use convoy_protocol::prelude::*;
use log::{info, warn};

/// Virtual time per driver iteration.
const TICK: Duration = Duration::from_millis(100);

/// Abort threshold; a healthy run converges orders of magnitude sooner.
const MAX_TICKS: usize = 5000;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("ignoring unparseable {key}={raw}");
                default
            }
        },
        Err(_) => default,
    }
}

fn message(index: usize) -> String {
    format!("lockstep message {index:03}")
}

type Peer = Session<PacketEndpoint<ConditionedLink<QueueLink>>>;

fn peer(
    initial_sequence: u16,
    initial_remote_sequence: u16,
    faults: FaultConfig,
    seed: u64,
    start: Instant,
) -> (Peer, Receiver<Vec<u8>>) {
    let (queue, rx) = QueueLink::channel();
    let link = ConditionedLink::new(queue, faults, seed);
    let endpoint = PacketEndpoint::new(
        link,
        EndpointConfig {
            initial_sequence,
            initial_remote_sequence,
            ..Default::default()
        },
        start,
    );
    let session = Session::new(
        endpoint,
        SessionConfig {
            initial_remote_sequence,
            ..Default::default()
        },
    );
    (session, rx)
}

fn shuttle(rx: &Receiver<Vec<u8>>, to: &mut Peer) -> (usize, Vec<Delivery>) {
    let mut moved = 0;
    let mut deliveries = Vec::new();
    for datagram in rx.try_iter() {
        moved += 1;
        match to.handle_packet(&datagram) {
            Ok(run) => deliveries.extend(run),
            Err(error) => warn!("discarded datagram: {error}"),
        }
    }
    (moved, deliveries)
}

fn main() -> ExitCode {
    env_logger::init();

    let total: usize = env_or("CONVOY_MESSAGES", 40);
    let faults = FaultConfig {
        loss: env_or("CONVOY_LOSS", 0.25),
        duplicate: env_or("CONVOY_DUPLICATE", 0.10),
        reorder: env_or("CONVOY_REORDER", 0.10),
    };
    let seed: u64 = env_or("CONVOY_SEED", 7);

    info!(
        "transferring {total} messages (loss {:.0}%, duplicate {:.0}%, reorder {:.0}%, seed {seed})",
        faults.loss * 100.0,
        faults.duplicate * 100.0,
        faults.reorder * 100.0
    );

    let t0 = Instant::now();
    let (mut alice, alice_out) = peer(65533, 100, faults, seed, t0);
    let (mut bob, bob_out) = peer(100, 65533, faults, seed.wrapping_add(1), t0);

    let mut sent = 0;
    let mut received: Vec<Delivery> = Vec::new();
    let mut now = t0;
    let mut ticks = 0;

    while ticks < MAX_TICKS {
        ticks += 1;
        now += TICK;

        let serviced = alice.service(now);
        if serviced.resent > 0 {
            info!("tick {ticks}: retransmitted {} message(s)", serviced.resent);
        }
        bob.service(now);

        while sent < total {
            match alice.send(message(sent).as_bytes(), now) {
                Ok(_) => sent += 1,
                Err(WindowError::WindowFull { .. }) => break,
                Err(error) => {
                    warn!("enqueue failed: {error}");
                    return ExitCode::FAILURE;
                }
            }
        }

        loop {
            let (moved_out, deliveries) = shuttle(&alice_out, &mut bob);
            for delivery in &deliveries {
                info!(
                    "delivered seq {}: {}",
                    delivery.sequence,
                    String::from_utf8_lossy(&delivery.payload)
                );
            }
            received.extend(deliveries);
            let (moved_back, _) = shuttle(&bob_out, &mut alice);
            if moved_out == 0 && moved_back == 0 {
                break;
            }
        }

        if sent == total && received.len() == total && alice.window().in_flight() == 0 {
            break;
        }
    }

    let in_order = received
        .iter()
        .enumerate()
        .all(|(index, delivery)| delivery.payload == message(index).as_bytes());
    if received.len() != total || !in_order {
        println!(
            "FAILED: {}/{} messages after {ticks} ticks (in order: {in_order})",
            received.len(),
            total
        );
        return ExitCode::FAILURE;
    }

    let sender = alice.endpoint().counters();
    let receiver = bob.endpoint().counters();
    println!("delivered {}/{total} messages in order in {ticks} virtual ticks", received.len());
    println!(
        "sender: {} data packets for {total} messages ({} retransmissions), {} stale acks",
        sender.data_sent,
        sender.data_sent - total as u64,
        alice.window().stale_acks()
    );
    println!(
        "receiver: {} ack-only frames, {} duplicates dropped, {} overflows dropped",
        receiver.ack_only_sent,
        bob.reassembly().duplicates(),
        bob.reassembly().overflows()
    );
    if alice.endpoint().rtt().is_initialized() {
        println!("smoothed rtt {:.1} ms (virtual)", alice.endpoint().rtt().srtt_ms());
    }
    ExitCode::SUCCESS
}
