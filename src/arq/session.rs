//! One reliable peer: endpoint, send window, and reassembly buffer.
//!
//! `Session` is the driver-facing surface. A driver loop calls, in order:
//! [`Session::service`] to advance time and run recovery, [`Session::send`]
//! while the window has room, and [`Session::handle_packet`] for each raw
//! inbound datagram. All state lives inside the session; there are no
//! globals and no hidden clocks.

use std::time::{Duration, Instant};

use crate::arq::reassembly::{Arrival, Delivery, ReassemblyBuffer};
use crate::arq::window::{SendWindow, WindowError};
use crate::core::{
    ACK_BITS_SPAN, ConvoyError, DEFAULT_REASSEMBLY_CAPACITY, DEFAULT_RESEND_TIMEOUT,
    DEFAULT_WINDOW_SIZE, Endpoint,
};
use crate::transport::header_sizes;

/// Session construction parameters.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// In-flight window capacity.
    pub window_size: usize,
    /// Reassembly slot count; must be at least `window_size` plus the
    /// selective acknowledgement span (acknowledged sequences can run that
    /// far past the receiver's contiguous floor, and the sender allocates
    /// fresh sequences for every slot they free).
    pub reassembly_capacity: usize,
    /// Fixed retransmission timeout.
    pub resend_timeout: Duration,
    /// Largest accepted outbound payload.
    pub max_payload: usize,
    /// First sequence number expected from the peer.
    pub initial_remote_sequence: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            reassembly_capacity: DEFAULT_REASSEMBLY_CAPACITY,
            resend_timeout: DEFAULT_RESEND_TIMEOUT,
            max_payload: header_sizes::MAX_PAYLOAD,
            initial_remote_sequence: 0,
        }
    }
}

/// What one [`Session::service`] call accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Serviced {
    /// Records retired by newly drained acknowledgements.
    pub retired: usize,
    /// Records retransmitted after timeout expiry.
    pub resent: usize,
}

/// A reliable peer over one transport endpoint.
///
/// Symmetric: both sides of a conversation run the same type. The session
/// is single-threaded and non-blocking; time arrives as `now` parameters
/// and is never read from a wall clock internally.
#[derive(Debug)]
pub struct Session<E> {
    endpoint: E,
    window: SendWindow,
    reassembly: ReassemblyBuffer,
}

impl<E: Endpoint> Session<E> {
    /// Create a session over `endpoint`.
    ///
    /// # Panics
    ///
    /// Panics when the configuration violates its contracts: a zero-size
    /// window, a payload limit beyond what a datagram can carry, or a
    /// reassembly buffer shorter than `window_size + ACK_BITS_SPAN`.
    /// Selective bits retire sequences up to [`ACK_BITS_SPAN`] past the
    /// receiver's contiguous floor, so up to `window_size + ACK_BITS_SPAN`
    /// distinct sequences can be live past that floor at once; a shorter
    /// buffer would overflow-drop arrivals whose acknowledgements still
    /// retire them at the sender, losing those messages for good.
    pub fn new(endpoint: E, config: SessionConfig) -> Self {
        assert!(
            config.reassembly_capacity >= config.window_size + ACK_BITS_SPAN,
            "reassembly capacity {} cannot cover window size {} plus the {} bit ack span",
            config.reassembly_capacity,
            config.window_size,
            ACK_BITS_SPAN
        );
        assert!(
            config.max_payload <= header_sizes::MAX_PAYLOAD,
            "max_payload {} exceeds wire limit {}",
            config.max_payload,
            header_sizes::MAX_PAYLOAD
        );
        Self {
            endpoint,
            window: SendWindow::new(config.window_size, config.resend_timeout, config.max_payload),
            reassembly: ReassemblyBuffer::new(
                config.reassembly_capacity,
                config.initial_remote_sequence,
            ),
        }
    }

    /// Enqueue and transmit one outbound message.
    ///
    /// Fails with [`WindowError::WindowFull`] when the window is at
    /// capacity; retry after a later [`Session::service`] has retired
    /// records.
    pub fn send(&mut self, payload: &[u8], now: Instant) -> Result<u16, WindowError> {
        self.window.enqueue(&mut self.endpoint, payload, now)
    }

    /// Run one maintenance pass at time `now`.
    ///
    /// Advances the endpoint clock (flushing an owed acknowledgement
    /// frame, if any), applies newly drained acknowledgements to the
    /// window, and retransmits expired records.
    pub fn service(&mut self, now: Instant) -> Serviced {
        self.endpoint.advance_time(now);
        let acked = self.endpoint.drain_acknowledgements();
        let retired = self.window.apply_acks(&acked);
        let resent = self.window.resend_expired(&mut self.endpoint, now);
        Serviced { retired, resent }
    }

    /// Feed one raw inbound datagram through decoding and reassembly.
    ///
    /// Returns the messages released in order by this arrival. Ack-only
    /// traffic, duplicates, and out-of-range arrivals yield an empty list.
    /// The only error is a datagram the transport cannot decode.
    pub fn handle_packet(&mut self, datagram: &[u8]) -> Result<Vec<Delivery>, ConvoyError> {
        let Some(inbound) = self.endpoint.deliver_raw(datagram)? else {
            return Ok(Vec::new());
        };
        match self.reassembly.accept(inbound.sequence, &inbound.payload) {
            Arrival::Delivered(run) => Ok(run),
            Arrival::Buffered | Arrival::Duplicate | Arrival::Overflow => Ok(Vec::new()),
        }
    }

    /// The transport endpoint.
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// The transport endpoint, mutably.
    pub fn endpoint_mut(&mut self) -> &mut E {
        &mut self.endpoint
    }

    /// The send window.
    pub fn window(&self) -> &SendWindow {
        &self.window
    }

    /// The reassembly buffer.
    pub fn reassembly(&self) -> &ReassemblyBuffer {
        &self.reassembly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{EndpointConfig, PacketEndpoint, QueueLink};
    use std::sync::mpsc::Receiver;

    type TestSession = Session<PacketEndpoint<QueueLink>>;

    fn session(
        initial_sequence: u16,
        initial_remote_sequence: u16,
        start: Instant,
    ) -> (TestSession, Receiver<Vec<u8>>) {
        let (link, rx) = QueueLink::channel();
        let endpoint = PacketEndpoint::new(
            link,
            EndpointConfig {
                initial_sequence,
                initial_remote_sequence,
                ..Default::default()
            },
            start,
        );
        let config = SessionConfig {
            initial_remote_sequence,
            ..Default::default()
        };
        (Session::new(endpoint, config), rx)
    }

    fn pair(start: Instant) -> (TestSession, Receiver<Vec<u8>>, TestSession, Receiver<Vec<u8>>) {
        let (a, a_rx) = session(100, 900, start);
        let (b, b_rx) = session(900, 100, start);
        (a, a_rx, b, b_rx)
    }

    fn shuttle(rx: &Receiver<Vec<u8>>, to: &mut TestSession) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for datagram in rx.try_iter() {
            deliveries.extend(to.handle_packet(&datagram).unwrap());
        }
        deliveries
    }

    #[test]
    fn messages_flow_and_acks_retire() {
        let t0 = Instant::now();
        let (mut a, a_rx, mut b, b_rx) = pair(t0);

        a.send(b"one", t0).unwrap();
        a.send(b"two", t0).unwrap();
        a.send(b"three", t0).unwrap();
        assert_eq!(a.window().in_flight(), 3);

        let deliveries = shuttle(&a_rx, &mut b);
        let payloads: Vec<_> = deliveries.iter().map(|d| d.payload.clone()).collect();
        assert_eq!(payloads, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);

        // B owes an ack and flushes it on its next service pass.
        b.service(t0 + Duration::from_millis(10));
        assert!(shuttle(&b_rx, &mut a).is_empty());

        let serviced = a.service(t0 + Duration::from_millis(20));
        assert_eq!(serviced.retired, 3);
        assert_eq!(serviced.resent, 0);
        assert_eq!(a.window().in_flight(), 0);
    }

    #[test]
    fn lost_datagram_recovers_by_retransmission() {
        let t0 = Instant::now();
        let (mut a, a_rx, mut b, b_rx) = pair(t0);

        a.send(b"first", t0).unwrap();
        a.send(b"second", t0).unwrap();

        let mut datagrams: Vec<_> = a_rx.try_iter().collect();
        assert_eq!(datagrams.len(), 2);
        datagrams.remove(0);

        // Only the second message arrives; it waits on the gap.
        assert!(b.handle_packet(&datagrams[0]).unwrap().is_empty());
        assert_eq!(b.reassembly().buffered(), 1);

        let t1 = t0 + Duration::from_millis(10);
        b.service(t1);
        shuttle(&b_rx, &mut a);
        // The selective acknowledgement retires the message that made it.
        let serviced = a.service(t1);
        assert_eq!(serviced.retired, 1);
        assert_eq!(a.window().sequences(), vec![100]);

        // Past the timeout the survivor goes out again, unchanged.
        let t2 = t0 + Duration::from_millis(1100);
        let serviced = a.service(t2);
        assert_eq!(serviced.resent, 1);

        let deliveries = shuttle(&a_rx, &mut b);
        let payloads: Vec<_> = deliveries.iter().map(|d| d.payload.clone()).collect();
        assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);

        let t3 = t2 + Duration::from_millis(10);
        b.service(t3);
        shuttle(&b_rx, &mut a);
        let serviced = a.service(t3);
        assert_eq!(serviced.retired, 1);
        assert_eq!(a.window().in_flight(), 0);
    }

    #[test]
    fn window_full_clears_after_service() {
        let t0 = Instant::now();
        let (link, _a_rx) = QueueLink::channel();
        let endpoint = PacketEndpoint::new(link, EndpointConfig::default(), t0);
        let config = SessionConfig {
            window_size: 2,
            ..Default::default()
        };
        let mut a = Session::new(endpoint, config);

        a.send(b"m", t0).unwrap();
        a.send(b"m", t0).unwrap();
        assert!(matches!(
            a.send(b"m", t0),
            Err(WindowError::WindowFull { in_flight: 2, capacity: 2 })
        ));

        // An acknowledgement for the first message frees a slot.
        let ack = crate::transport::encode_packet(
            &crate::transport::PacketHeader::ack_only(1, 0),
            &[],
        );
        a.handle_packet(&ack).unwrap();
        let serviced = a.service(t0 + Duration::from_millis(5));
        assert_eq!(serviced.retired, 1);
        a.send(b"m", t0 + Duration::from_millis(5)).unwrap();
    }

    #[test]
    #[should_panic(expected = "reassembly capacity")]
    fn buffer_smaller_than_window_is_a_contract_violation() {
        let (link, _rx) = QueueLink::channel();
        let endpoint = PacketEndpoint::new(link, EndpointConfig::default(), Instant::now());
        Session::new(
            endpoint,
            SessionConfig {
                window_size: 64,
                reassembly_capacity: 32,
                ..Default::default()
            },
        );
    }

    #[test]
    #[should_panic(expected = "reassembly capacity")]
    fn buffer_short_of_the_ack_span_is_a_contract_violation() {
        let (link, _rx) = QueueLink::channel();
        let endpoint = PacketEndpoint::new(link, EndpointConfig::default(), Instant::now());
        // One slot short: the last selectively ackable sequence would be
        // recorded and retired at the sender yet dropped here as overflow.
        Session::new(
            endpoint,
            SessionConfig {
                window_size: 32,
                reassembly_capacity: 32 + ACK_BITS_SPAN - 1,
                ..Default::default()
            },
        );
    }

    #[test]
    fn minimal_buffer_covering_the_ack_span_is_accepted() {
        let t0 = Instant::now();
        let (link, _rx) = QueueLink::channel();
        let endpoint = PacketEndpoint::new(link, EndpointConfig::default(), t0);
        let mut a = Session::new(
            endpoint,
            SessionConfig {
                window_size: 32,
                reassembly_capacity: 32 + ACK_BITS_SPAN,
                ..Default::default()
            },
        );
        a.send(b"fits", t0).unwrap();
        assert_eq!(a.window().in_flight(), 1);
    }
}
