//! Core traits for the Convoy protocol.
//!
//! `Endpoint` is the seam between the reliability state machines and the
//! transport that actually moves bytes.

use std::time::Instant;

use crate::transport::HeaderError;

/// A data packet decoded by the transport, ready for reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Sequence number carried in the packet header.
    pub sequence: u16,
    /// Application payload.
    pub payload: Vec<u8>,
}

/// Transport endpoint collaborator.
///
/// The send window and session drive an `Endpoint` to allocate sequence
/// numbers, frame outbound packets, decode inbound datagrams, and surface
/// acknowledgements. The endpoint owns all wire-level concerns: header
/// layout, acknowledgement bookkeeping, and timing telemetry.
///
/// # Requirements
///
/// - `next_sequence` MUST be monotonic with wraparound and allocate a
///   fresh number per call.
/// - `send` MUST accept retransmissions: the same sequence may be sent
///   more than once, each time with an identical payload.
/// - `deliver_raw` MUST update acknowledgement bookkeeping for every
///   decodable datagram, data-bearing or not.
/// - `drain_acknowledgements` MUST yield each newly confirmed sequence
///   exactly once across all calls.
///
/// # Example
///
/// ```ignore
/// struct RecordingEndpoint {
///     next: u16,
///     sent: Vec<(u16, Vec<u8>)>,
/// }
///
/// impl Endpoint for RecordingEndpoint {
///     fn next_sequence(&mut self) -> u16 {
///         let seq = self.next;
///         self.next = self.next.wrapping_add(1);
///         seq
///     }
///
///     fn send(&mut self, sequence: u16, payload: &[u8]) {
///         self.sent.push((sequence, payload.to_vec()));
///     }
///
///     // ...
/// }
/// ```
pub trait Endpoint {
    /// Allocate the next outbound sequence number.
    fn next_sequence(&mut self) -> u16;

    /// Frame `payload` under `sequence` and hand it to the channel.
    fn send(&mut self, sequence: u16, payload: &[u8]);

    /// Feed a raw arriving datagram into transport-level decoding.
    ///
    /// Returns the decoded data packet for the caller to pass to the
    /// reassembly buffer, or `None` for traffic carrying no payload
    /// (ack-only frames).
    fn deliver_raw(&mut self, datagram: &[u8]) -> Result<Option<Inbound>, HeaderError>;

    /// Advance the endpoint's clock, updating timers and acknowledgement
    /// bookkeeping.
    fn advance_time(&mut self, now: Instant);

    /// Return and clear the sequence numbers newly confirmed received by
    /// the peer since the last call.
    fn drain_acknowledgements(&mut self) -> Vec<u16>;
}
