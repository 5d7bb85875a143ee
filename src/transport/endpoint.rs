//! The concrete transport endpoint.
//!
//! `PacketEndpoint` owns every wire-level concern the reliability state
//! machines delegate through the [`Endpoint`] trait:
//! - Outbound sequence allocation (monotonic, wrapping)
//! - Framing and decoding of datagrams
//! - Acknowledgement bookkeeping on both directions: which remote data
//!   sequences have arrived (to generate ack headers) and which local
//!   sequences the peer has confirmed (to report through
//!   `drain_acknowledgements`)
//! - RTT telemetry and traffic counters
//!
//! Acknowledgements piggyback on every outbound packet. A peer that has
//! received data since its last outbound frame owes an ack and flushes a
//! header-only ack packet on its next `advance_time` call, so acks flow
//! even when application traffic is one-directional.

use std::mem;
use std::time::{Duration, Instant};

use log::{trace, warn};

use crate::core::{
    ACK_BITS_SPAN, DEFAULT_ACK_WINDOW, Endpoint, Inbound, MAX_REASSEMBLY_CAPACITY,
    forward_distance, sequence_less_than,
};
use crate::transport::header::{self, HeaderError, PacketHeader, PacketKind, sizes};
use crate::transport::link::Link;
use crate::transport::timing::RttEstimator;

/// Configuration for a [`PacketEndpoint`].
#[derive(Debug, Clone, Copy)]
pub struct EndpointConfig {
    /// First sequence number this endpoint will allocate.
    pub initial_sequence: u16,
    /// First sequence number expected from the peer.
    ///
    /// Both peers must agree on each other's initial sequence; there is no
    /// handshake to negotiate it. A mismatch is a deployment defect.
    pub initial_remote_sequence: u16,
    /// Capacity of the received-sequence window, in sequences.
    ///
    /// Every sequence recorded here is eventually acknowledged, so the
    /// peer retires it for good. Pair the endpoint with a reassembly
    /// buffer that reaches at least as far as the acknowledgements do;
    /// the session constructor enforces the floor.
    pub ack_window: usize,
    /// Largest payload accepted for framing.
    pub max_payload: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            initial_sequence: 0,
            initial_remote_sequence: 0,
            ack_window: DEFAULT_ACK_WINDOW,
            max_payload: sizes::MAX_PAYLOAD,
        }
    }
}

/// Traffic counters kept by a [`PacketEndpoint`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndpointCounters {
    /// Data packets framed and transmitted (including retransmissions).
    pub data_sent: u64,
    /// Data packets decoded from inbound datagrams.
    pub data_received: u64,
    /// Ack-only packets transmitted.
    pub ack_only_sent: u64,
    /// Ack-only packets received.
    pub ack_only_received: u64,
    /// Local sequences newly confirmed by the peer.
    pub sequences_acked: u64,
    /// Inbound datagrams that failed header decoding.
    pub malformed: u64,
    /// Inbound data sequences outside the received-sequence window.
    pub out_of_range: u64,
}

/// Outcome of marking a received sequence in the ack window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// First sighting; now tracked for acknowledgement.
    Recorded,
    /// Behind the floor or bit already set.
    AlreadySeen,
    /// Too far ahead of the floor to track.
    OutOfRange,
}

/// Ring bitmap of received data sequences with a contiguous floor.
///
/// `next_floor` is the lowest sequence not yet received; everything before
/// it is implicitly acknowledged by the cumulative `ack` header field.
/// Sequences at or above the floor are tracked as individual bits, indexed
/// `sequence mod capacity`, and cleared as the floor passes them so slots
/// can be reused.
#[derive(Debug)]
struct AckWindow {
    next_floor: u16,
    bits: Vec<u64>,
    capacity: usize,
}

impl AckWindow {
    fn new(initial_remote: u16, capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity <= MAX_REASSEMBLY_CAPACITY,
            "ack window capacity out of range: {capacity}"
        );
        Self {
            next_floor: initial_remote,
            bits: vec![0; capacity.div_ceil(64)],
            capacity,
        }
    }

    fn bit(&self, sequence: u16) -> bool {
        let slot = sequence as usize % self.capacity;
        self.bits[slot / 64] & (1u64 << (slot % 64)) != 0
    }

    fn set_bit(&mut self, sequence: u16) {
        let slot = sequence as usize % self.capacity;
        self.bits[slot / 64] |= 1u64 << (slot % 64);
    }

    fn clear_bit(&mut self, sequence: u16) {
        let slot = sequence as usize % self.capacity;
        self.bits[slot / 64] &= !(1u64 << (slot % 64));
    }

    fn mark(&mut self, sequence: u16) -> Mark {
        if sequence_less_than(sequence, self.next_floor) {
            return Mark::AlreadySeen;
        }
        if forward_distance(self.next_floor, sequence) as usize >= self.capacity {
            return Mark::OutOfRange;
        }
        if self.bit(sequence) {
            return Mark::AlreadySeen;
        }

        self.set_bit(sequence);
        while self.bit(self.next_floor) {
            self.clear_bit(self.next_floor);
            self.next_floor = self.next_floor.wrapping_add(1);
        }
        Mark::Recorded
    }

    /// Next sequence expected from the peer (the cumulative ack field).
    fn ack(&self) -> u16 {
        self.next_floor
    }

    /// Selective bits above the floor: bit i covers `floor + 1 + i`.
    fn selective_bits(&self) -> u32 {
        let mut bits = 0u32;
        for i in 0..ACK_BITS_SPAN as u16 {
            let sequence = self.next_floor.wrapping_add(1 + i);
            if (forward_distance(self.next_floor, sequence) as usize) < self.capacity
                && self.bit(sequence)
            {
                bits |= 1 << i;
            }
        }
        bits
    }
}

/// A locally sent data sequence awaiting confirmation.
#[derive(Debug, Clone)]
struct SentRecord {
    sequence: u16,
    sent_at: Instant,
    retransmitted: bool,
}

/// Transport endpoint framing packets onto a [`Link`].
#[derive(Debug)]
pub struct PacketEndpoint<L> {
    link: L,
    now: Instant,
    local_sequence: u16,
    max_payload: usize,
    /// Remote data sequences seen, for ack generation.
    received: AckWindow,
    /// Local sequences sent and not yet confirmed, oldest first.
    outstanding: Vec<SentRecord>,
    /// Newly confirmed local sequences awaiting drain.
    pending_acks: Vec<u16>,
    /// Data arrived since the last outbound frame.
    ack_owed: bool,
    rtt: RttEstimator,
    counters: EndpointCounters,
}

impl<L: Link> PacketEndpoint<L> {
    /// Create an endpoint over `link` with the clock seeded at `start`.
    pub fn new(link: L, config: EndpointConfig, start: Instant) -> Self {
        assert!(
            config.max_payload <= sizes::MAX_PAYLOAD,
            "max_payload {} exceeds wire limit {}",
            config.max_payload,
            sizes::MAX_PAYLOAD
        );
        Self {
            link,
            now: start,
            local_sequence: config.initial_sequence,
            max_payload: config.max_payload,
            received: AckWindow::new(config.initial_remote_sequence, config.ack_window),
            outstanding: Vec::new(),
            pending_acks: Vec::new(),
            ack_owed: false,
            rtt: RttEstimator::new(),
            counters: EndpointCounters::default(),
        }
    }

    /// Round-trip telemetry gathered from first-transmission acks.
    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    /// Traffic counters.
    pub fn counters(&self) -> EndpointCounters {
        self.counters
    }

    /// Largest payload this endpoint will frame.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Access the underlying link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn transmit(&mut self, kind: PacketKind, sequence: u16, payload: &[u8]) {
        let header = match kind {
            PacketKind::Data => {
                PacketHeader::data(sequence, self.received.ack(), self.received.selective_bits())
            }
            PacketKind::AckOnly => {
                PacketHeader::ack_only(self.received.ack(), self.received.selective_bits())
            }
        };
        let datagram = header::encode_packet(&header, payload);
        self.link.transmit(&datagram);
        // Every outbound frame carries the current ack state.
        self.ack_owed = false;
    }

    /// Apply the ack fields of an inbound header to the outstanding set.
    fn process_ack_fields(&mut self, ack: u16, ack_bits: u32) {
        let now = self.now;
        let mut confirmed: Vec<(u16, Option<Duration>)> = Vec::new();

        self.outstanding.retain(|record| {
            let covered = sequence_less_than(record.sequence, ack) || {
                let distance = forward_distance(ack, record.sequence);
                distance >= 1
                    && (distance as usize) <= ACK_BITS_SPAN
                    && ack_bits & (1 << (distance - 1)) != 0
            };
            if covered {
                let sample =
                    (!record.retransmitted).then(|| now.saturating_duration_since(record.sent_at));
                confirmed.push((record.sequence, sample));
            }
            !covered
        });

        for (sequence, sample) in confirmed {
            if let Some(sample) = sample {
                self.rtt.update(sample);
            }
            self.counters.sequences_acked += 1;
            trace!("sequence {sequence} confirmed by peer");
            self.pending_acks.push(sequence);
        }
    }
}

impl<L: Link> Endpoint for PacketEndpoint<L> {
    fn next_sequence(&mut self) -> u16 {
        let sequence = self.local_sequence;
        self.local_sequence = self.local_sequence.wrapping_add(1);
        sequence
    }

    fn send(&mut self, sequence: u16, payload: &[u8]) {
        debug_assert!(
            payload.len() <= self.max_payload,
            "payload of {} bytes exceeds endpoint limit {}",
            payload.len(),
            self.max_payload
        );

        match self
            .outstanding
            .iter_mut()
            .find(|record| record.sequence == sequence)
        {
            Some(record) => {
                // Same sequence going out again: an ambiguous RTT source.
                record.retransmitted = true;
            }
            None => self.outstanding.push(SentRecord {
                sequence,
                sent_at: self.now,
                retransmitted: false,
            }),
        }

        self.transmit(PacketKind::Data, sequence, payload);
        self.counters.data_sent += 1;
    }

    fn deliver_raw(&mut self, datagram: &[u8]) -> Result<Option<Inbound>, HeaderError> {
        let (header, payload) = match header::decode_packet(datagram) {
            Ok(decoded) => decoded,
            Err(error) => {
                self.counters.malformed += 1;
                warn!("discarding malformed datagram: {error}");
                return Err(error);
            }
        };

        self.process_ack_fields(header.ack, header.ack_bits);

        match header.kind {
            PacketKind::AckOnly => {
                self.counters.ack_only_received += 1;
                Ok(None)
            }
            PacketKind::Data => {
                self.counters.data_received += 1;
                // Even a duplicate owes a fresh ack: the peer retransmits
                // precisely because the first ack never arrived.
                self.ack_owed = true;
                match self.received.mark(header.sequence) {
                    Mark::Recorded => {}
                    Mark::AlreadySeen => {
                        trace!("data sequence {} seen before", header.sequence);
                    }
                    Mark::OutOfRange => {
                        self.counters.out_of_range += 1;
                        warn!(
                            "data sequence {} outside the {}-wide ack window",
                            header.sequence, self.received.capacity
                        );
                    }
                }
                Ok(Some(Inbound {
                    sequence: header.sequence,
                    payload: payload.to_vec(),
                }))
            }
        }
    }

    fn advance_time(&mut self, now: Instant) {
        self.now = now;
        if self.ack_owed {
            self.transmit(PacketKind::AckOnly, 0, &[]);
            self.counters.ack_only_sent += 1;
        }
    }

    fn drain_acknowledgements(&mut self) -> Vec<u16> {
        mem::take(&mut self.pending_acks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::link::QueueLink;
    use std::sync::mpsc::Receiver;

    fn endpoint(
        initial_sequence: u16,
        initial_remote_sequence: u16,
    ) -> (PacketEndpoint<QueueLink>, Receiver<Vec<u8>>) {
        let (link, rx) = QueueLink::channel();
        let config = EndpointConfig {
            initial_sequence,
            initial_remote_sequence,
            ..Default::default()
        };
        (PacketEndpoint::new(link, config, Instant::now()), rx)
    }

    fn last_header(rx: &Receiver<Vec<u8>>) -> PacketHeader {
        let datagrams: Vec<_> = rx.try_iter().collect();
        let last = datagrams.last().expect("no datagram transmitted");
        header::decode_packet(last).unwrap().0
    }

    fn data_datagram(sequence: u16, payload: &[u8]) -> Vec<u8> {
        // Inbound ack fields that acknowledge nothing.
        header::encode_packet(&PacketHeader::data(sequence, 0, 0), payload)
    }

    fn ack_datagram(ack: u16, ack_bits: u32) -> Vec<u8> {
        header::encode_packet(&PacketHeader::ack_only(ack, ack_bits), &[])
    }

    #[test]
    fn sequence_allocation_wraps() {
        let (mut ep, _rx) = endpoint(65534, 0);
        assert_eq!(ep.next_sequence(), 65534);
        assert_eq!(ep.next_sequence(), 65535);
        assert_eq!(ep.next_sequence(), 0);
        assert_eq!(ep.next_sequence(), 1);
    }

    #[test]
    fn outbound_headers_carry_ack_state() {
        let (mut ep, rx) = endpoint(0, 5);

        ep.deliver_raw(&data_datagram(5, b"x")).unwrap();
        ep.send(0, b"reply");

        let header = last_header(&rx);
        assert_eq!(header.kind, PacketKind::Data);
        assert_eq!(header.ack, 6);
        assert_eq!(header.ack_bits, 0);
    }

    #[test]
    fn floor_advances_through_buffered_sequences() {
        let (mut ep, rx) = endpoint(0, 6);

        // 7 and 8 arrive ahead of 6.
        ep.deliver_raw(&data_datagram(7, b"b")).unwrap();
        ep.deliver_raw(&data_datagram(8, b"c")).unwrap();
        ep.send(0, b"r1");
        let header = last_header(&rx);
        assert_eq!(header.ack, 6);
        assert_eq!(header.ack_bits, 0b11);

        ep.deliver_raw(&data_datagram(6, b"a")).unwrap();
        ep.send(1, b"r2");
        let header = last_header(&rx);
        assert_eq!(header.ack, 9);
        assert_eq!(header.ack_bits, 0);
    }

    #[test]
    fn ack_only_flush_on_advance_time() {
        let (mut ep, rx) = endpoint(0, 5);
        let start = Instant::now();

        ep.deliver_raw(&data_datagram(5, b"x")).unwrap();
        ep.advance_time(start + Duration::from_millis(100));

        let header = last_header(&rx);
        assert_eq!(header.kind, PacketKind::AckOnly);
        assert_eq!(header.ack, 6);

        // Nothing further owed.
        ep.advance_time(start + Duration::from_millis(200));
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn duplicate_data_owes_another_ack() {
        let (mut ep, rx) = endpoint(0, 5);
        let start = Instant::now();

        ep.deliver_raw(&data_datagram(5, b"x")).unwrap();
        ep.advance_time(start + Duration::from_millis(100));
        assert_eq!(rx.try_iter().count(), 1);

        // Retransmission of 5 arrives because the first ack was lost.
        ep.deliver_raw(&data_datagram(5, b"x")).unwrap();
        ep.advance_time(start + Duration::from_millis(200));
        let header = last_header(&rx);
        assert_eq!(header.kind, PacketKind::AckOnly);
        assert_eq!(header.ack, 6);
    }

    #[test]
    fn drain_reports_each_sequence_once() {
        let (mut ep, _rx) = endpoint(10, 0);

        let seq = ep.next_sequence();
        ep.send(seq, b"payload");

        ep.deliver_raw(&ack_datagram(11, 0)).unwrap();
        assert_eq!(ep.drain_acknowledgements(), vec![10]);
        assert!(ep.drain_acknowledgements().is_empty());

        // The same ack repeated confirms nothing new.
        ep.deliver_raw(&ack_datagram(11, 0)).unwrap();
        assert!(ep.drain_acknowledgements().is_empty());
    }

    #[test]
    fn selective_bits_confirm_past_a_gap() {
        let (mut ep, _rx) = endpoint(0, 0);

        for _ in 0..3 {
            let seq = ep.next_sequence();
            ep.send(seq, b"m");
        }

        // Peer still expects 0 but has seen 2: bit 1 covers ack + 2.
        ep.deliver_raw(&ack_datagram(0, 0b10)).unwrap();
        assert_eq!(ep.drain_acknowledgements(), vec![2]);

        // Cumulative catch-up confirms the rest exactly once.
        ep.deliver_raw(&ack_datagram(3, 0)).unwrap();
        assert_eq!(ep.drain_acknowledgements(), vec![0, 1]);
    }

    #[test]
    fn retransmitted_sequences_never_sample_rtt() {
        let (mut ep, _rx) = endpoint(0, 0);
        let start = Instant::now();

        ep.advance_time(start);
        ep.send(0, b"first");
        ep.send(0, b"first");

        ep.advance_time(start + Duration::from_millis(50));
        ep.deliver_raw(&ack_datagram(1, 0)).unwrap();
        assert!(!ep.rtt().is_initialized());

        ep.send(1, b"second");
        ep.advance_time(start + Duration::from_millis(80));
        ep.deliver_raw(&ack_datagram(2, 0)).unwrap();
        assert!(ep.rtt().is_initialized());
        assert!((ep.rtt().srtt_ms() - 30.0).abs() < 1.0);
    }

    #[test]
    fn malformed_datagrams_are_counted() {
        let (mut ep, _rx) = endpoint(0, 0);

        assert!(ep.deliver_raw(&[0x01, 0x02]).is_err());
        assert!(ep.deliver_raw(&[0xEE; 16]).is_err());
        assert_eq!(ep.counters().malformed, 2);
    }

    #[test]
    fn counters_track_traffic() {
        let (mut ep, _rx) = endpoint(0, 5);
        let start = Instant::now();

        ep.send(0, b"out");
        ep.deliver_raw(&data_datagram(5, b"in")).unwrap();
        ep.advance_time(start + Duration::from_millis(10));

        let counters = ep.counters();
        assert_eq!(counters.data_sent, 1);
        assert_eq!(counters.data_received, 1);
        assert_eq!(counters.ack_only_sent, 1);
    }

    mod ack_window {
        use super::super::{AckWindow, Mark};

        #[test]
        fn in_order_marks_advance_floor() {
            let mut window = AckWindow::new(0, 64);
            assert_eq!(window.mark(0), Mark::Recorded);
            assert_eq!(window.mark(1), Mark::Recorded);
            assert_eq!(window.ack(), 2);
            assert_eq!(window.selective_bits(), 0);
        }

        #[test]
        fn gap_shows_in_selective_bits() {
            let mut window = AckWindow::new(0, 64);
            assert_eq!(window.mark(1), Mark::Recorded);
            assert_eq!(window.mark(3), Mark::Recorded);
            assert_eq!(window.ack(), 0);
            // Bit 0 covers 1, bit 2 covers 3.
            assert_eq!(window.selective_bits(), 0b101);

            assert_eq!(window.mark(0), Mark::Recorded);
            assert_eq!(window.ack(), 2);
            // The floor swept past 1; bit 0 now covers 3.
            assert_eq!(window.selective_bits(), 0b1);
        }

        #[test]
        fn rejects_behind_and_far_ahead() {
            let mut window = AckWindow::new(10, 64);
            assert_eq!(window.mark(9), Mark::AlreadySeen);
            assert_eq!(window.mark(10 + 64), Mark::OutOfRange);
            assert_eq!(window.mark(10), Mark::Recorded);
        }

        #[test]
        fn duplicate_above_floor_already_seen() {
            let mut window = AckWindow::new(0, 64);
            assert_eq!(window.mark(5), Mark::Recorded);
            assert_eq!(window.mark(5), Mark::AlreadySeen);
        }

        #[test]
        fn floor_wraps_across_u16_max() {
            let mut window = AckWindow::new(65534, 64);
            assert_eq!(window.mark(65534), Mark::Recorded);
            assert_eq!(window.mark(65535), Mark::Recorded);
            assert_eq!(window.mark(0), Mark::Recorded);
            assert_eq!(window.ack(), 1);
        }

        #[test]
        fn slots_reusable_after_floor_passes() {
            let mut window = AckWindow::new(0, 64);
            for seq in 0..64u16 {
                assert_eq!(window.mark(seq), Mark::Recorded);
            }
            // One full capacity later, the same slots serve new sequences.
            assert_eq!(window.mark(64), Mark::Recorded);
            assert_eq!(window.mark(100), Mark::Recorded);
            assert_eq!(window.ack(), 65);
        }
    }
}
