//! The sender's bounded in-flight window.
//!
//! `SendWindow` owns up to `capacity` outstanding message records. A record
//! enters the window when the application enqueues a payload, leaves it when
//! the peer acknowledges the sequence, and is retransmitted unchanged
//! whenever it sits unacknowledged past the resend timeout. Retirement is
//! the only way out: the window never gives up on a record.

use std::time::{Duration, Instant};

use log::{debug, trace};
use thiserror::Error;

use crate::core::Endpoint;

/// Errors surfaced by [`SendWindow::enqueue`].
///
/// Both variants are flow-control signals. Neither changes window state;
/// the caller backs off and retries on a later tick.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WindowError {
    /// The window already holds its full complement of in-flight records.
    #[error("send window full: {in_flight} of {capacity} records in flight")]
    WindowFull {
        /// Records currently outstanding.
        in_flight: usize,
        /// Configured window capacity.
        capacity: usize,
    },

    /// The payload does not fit in a single packet.
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge {
        /// Offered payload length.
        len: usize,
        /// Largest accepted payload length.
        max: usize,
    },
}

/// An in-flight message record.
#[derive(Debug, Clone)]
struct PendingMessage {
    /// Sequence number assigned at enqueue, fixed for the record's life.
    sequence: u16,
    /// Payload bytes, retained for retransmission until retirement.
    payload: Vec<u8>,
    /// Time of the most recent transmission.
    last_send: Instant,
    /// Marked by an acknowledgement just before the record is retired.
    acknowledged: bool,
    /// Transmissions so far, the first included.
    send_count: u32,
}

/// Bounded in-flight window with ack-driven retirement.
///
/// Records are kept dense and insertion-ordered (oldest first); retiring
/// one compacts the rest without disturbing their relative order.
#[derive(Debug)]
pub struct SendWindow {
    pending: Vec<PendingMessage>,
    capacity: usize,
    resend_timeout: Duration,
    max_payload: usize,
    stale_acks: u64,
}

impl SendWindow {
    /// Create a window holding at most `capacity` in-flight records.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, resend_timeout: Duration, max_payload: usize) -> Self {
        assert!(capacity > 0, "send window capacity must be at least 1");
        Self {
            pending: Vec::with_capacity(capacity),
            capacity,
            resend_timeout,
            max_payload,
            stale_acks: 0,
        }
    }

    /// Accept a payload into the window and transmit it.
    ///
    /// Allocates a sequence number from the endpoint, records the payload
    /// for possible retransmission, and hands the first transmission to the
    /// endpoint. Fails without side effect when the window is at capacity
    /// or the payload exceeds the configured limit.
    pub fn enqueue<E: Endpoint>(
        &mut self,
        endpoint: &mut E,
        payload: &[u8],
        now: Instant,
    ) -> Result<u16, WindowError> {
        if payload.len() > self.max_payload {
            return Err(WindowError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload,
            });
        }
        if self.pending.len() == self.capacity {
            return Err(WindowError::WindowFull {
                in_flight: self.pending.len(),
                capacity: self.capacity,
            });
        }

        let sequence = endpoint.next_sequence();
        self.pending.push(PendingMessage {
            sequence,
            payload: payload.to_vec(),
            last_send: now,
            acknowledged: false,
            send_count: 1,
        });
        endpoint.send(sequence, payload);
        trace!("enqueued sequence {sequence} ({} bytes)", payload.len());
        Ok(sequence)
    }

    /// Retire every record matched by `acked`.
    ///
    /// Sequences with no outstanding record are stale acknowledgements:
    /// ignored, counted, and logged. Returns the number of records retired.
    pub fn apply_acks(&mut self, acked: &[u16]) -> usize {
        let mut retired = 0;
        for &sequence in acked {
            match self
                .pending
                .iter_mut()
                .find(|record| record.sequence == sequence && !record.acknowledged)
            {
                Some(record) => {
                    record.acknowledged = true;
                    debug!(
                        "retiring sequence {sequence} after {} transmission(s)",
                        record.send_count
                    );
                    retired += 1;
                }
                None => {
                    self.stale_acks += 1;
                    trace!("stale acknowledgement for sequence {sequence}");
                }
            }
        }
        if retired > 0 {
            self.pending.retain(|record| !record.acknowledged);
        }
        retired
    }

    /// Retransmit every record unacknowledged past the resend timeout.
    ///
    /// Each expired record goes out again with its original sequence number
    /// and byte-identical payload, and its `last_send` resets to `now`. The
    /// timeout is fixed; an unlucky record is resent once per expiry until
    /// acknowledged. Returns the number of retransmissions performed.
    pub fn resend_expired<E: Endpoint>(&mut self, endpoint: &mut E, now: Instant) -> usize {
        let mut resent = 0;
        for record in &mut self.pending {
            if now.saturating_duration_since(record.last_send) > self.resend_timeout {
                endpoint.send(record.sequence, &record.payload);
                record.last_send = now;
                record.send_count += 1;
                resent += 1;
                debug!(
                    "resent sequence {} (transmission #{})",
                    record.sequence, record.send_count
                );
            }
        }
        resent
    }

    /// Number of records currently in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Whether the window is at capacity.
    pub fn is_full(&self) -> bool {
        self.pending.len() == self.capacity
    }

    /// Whether `sequence` is currently outstanding.
    pub fn contains(&self, sequence: u16) -> bool {
        self.pending.iter().any(|record| record.sequence == sequence)
    }

    /// Outstanding sequences, oldest first.
    pub fn sequences(&self) -> Vec<u16> {
        self.pending.iter().map(|record| record.sequence).collect()
    }

    /// Configured window capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured resend timeout.
    pub fn resend_timeout(&self) -> Duration {
        self.resend_timeout
    }

    /// Acknowledgements received for sequences no longer outstanding.
    pub fn stale_acks(&self) -> u64 {
        self.stale_acks
    }
}
