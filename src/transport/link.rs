//! Links: where framed datagrams go.
//!
//! A [`Link`] is the one-way seam between a [`PacketEndpoint`] and the
//! channel carrying its datagrams:
//! - [`QueueLink`]: in-process delivery over an mpsc queue, for tests,
//!   demos, and loopback wiring.
//! - [`ConditionedLink`]: a fault-injecting wrapper simulating loss,
//!   duplication, and reordering with a seeded RNG so failures reproduce.
//!
//! [`PacketEndpoint`]: crate::transport::endpoint::PacketEndpoint

use std::sync::mpsc;

use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One-way datagram sink.
///
/// Delivery is fire-and-forget: an implementation may drop, duplicate, or
/// reorder datagrams, and the reliability layer above is expected to cope.
pub trait Link {
    /// Hand one framed datagram to the channel.
    fn transmit(&mut self, datagram: &[u8]);
}

/// In-process link over a standard mpsc queue.
///
/// The receiving half is a plain [`mpsc::Receiver`]; a driver drains it
/// into the peer session. A dropped receiver behaves like a dead link:
/// datagrams are silently lost.
#[derive(Debug, Clone)]
pub struct QueueLink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl QueueLink {
    /// Create a link and the receiver for its far end.
    pub fn channel() -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl Link for QueueLink {
    fn transmit(&mut self, datagram: &[u8]) {
        let _ = self.tx.send(datagram.to_vec());
    }
}

/// Fault model for [`ConditionedLink`].
///
/// All probabilities are in `[0.0, 1.0]`. The default is a transparent
/// pass-through.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultConfig {
    /// Probability that a datagram is silently dropped.
    pub loss: f64,
    /// Probability that a datagram is delivered twice.
    pub duplicate: f64,
    /// Probability that a datagram is held back and overtaken by the next
    /// transmission.
    pub reorder: f64,
}

/// A fault-injecting wrapper around another link.
///
/// At most one datagram is held back at a time; it is released right after
/// the transmission that overtakes it, so a held datagram is never more
/// than one slot out of order and cannot be stranded while traffic flows.
#[derive(Debug)]
pub struct ConditionedLink<L> {
    inner: L,
    faults: FaultConfig,
    rng: StdRng,
    held: Option<Vec<u8>>,
}

impl<L: Link> ConditionedLink<L> {
    /// Wrap `inner` with the given fault model and RNG seed.
    pub fn new(inner: L, faults: FaultConfig, seed: u64) -> Self {
        Self {
            inner,
            faults,
            rng: StdRng::seed_from_u64(seed),
            held: None,
        }
    }

    /// Access the wrapped link.
    pub fn inner_mut(&mut self) -> &mut L {
        &mut self.inner
    }
}

impl<L: Link> Link for ConditionedLink<L> {
    fn transmit(&mut self, datagram: &[u8]) {
        if self.rng.gen_range(0.0..1.0) < self.faults.loss {
            trace!("conditioner dropped a {} byte datagram", datagram.len());
            return;
        }

        if self.held.is_none() && self.rng.gen_range(0.0..1.0) < self.faults.reorder {
            trace!("conditioner held back a {} byte datagram", datagram.len());
            self.held = Some(datagram.to_vec());
            return;
        }

        self.inner.transmit(datagram);

        if self.rng.gen_range(0.0..1.0) < self.faults.duplicate {
            trace!("conditioner duplicated a {} byte datagram", datagram.len());
            self.inner.transmit(datagram);
        }

        if let Some(held) = self.held.take() {
            self.inner.transmit(&held);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mpsc::Receiver<Vec<u8>>) -> Vec<Vec<u8>> {
        rx.try_iter().collect()
    }

    #[test]
    fn queue_link_preserves_order() {
        let (mut link, rx) = QueueLink::channel();
        link.transmit(b"one");
        link.transmit(b"two");

        assert_eq!(drain(&rx), vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn default_faults_pass_through() {
        let (link, rx) = QueueLink::channel();
        let mut conditioned = ConditionedLink::new(link, FaultConfig::default(), 1);

        conditioned.transmit(b"a");
        conditioned.transmit(b"b");

        assert_eq!(drain(&rx), vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn total_loss_drops_everything() {
        let (link, rx) = QueueLink::channel();
        let faults = FaultConfig {
            loss: 1.0,
            ..Default::default()
        };
        let mut conditioned = ConditionedLink::new(link, faults, 1);

        conditioned.transmit(b"a");
        conditioned.transmit(b"b");

        assert!(drain(&rx).is_empty());
    }

    #[test]
    fn certain_duplication_doubles() {
        let (link, rx) = QueueLink::channel();
        let faults = FaultConfig {
            duplicate: 1.0,
            ..Default::default()
        };
        let mut conditioned = ConditionedLink::new(link, faults, 1);

        conditioned.transmit(b"a");

        assert_eq!(drain(&rx), vec![b"a".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn certain_reorder_swaps_adjacent() {
        let (link, rx) = QueueLink::channel();
        let faults = FaultConfig {
            reorder: 1.0,
            ..Default::default()
        };
        let mut conditioned = ConditionedLink::new(link, faults, 1);

        conditioned.transmit(b"a");
        assert!(drain(&rx).is_empty());

        // The next datagram overtakes the held one.
        conditioned.transmit(b"b");
        assert_eq!(drain(&rx), vec![b"b".to_vec(), b"a".to_vec()]);
    }

    #[test]
    fn same_seed_same_faults() {
        let faults = FaultConfig {
            loss: 0.5,
            duplicate: 0.2,
            reorder: 0.2,
        };

        let mut runs = Vec::new();
        for _ in 0..2 {
            let (link, rx) = QueueLink::channel();
            let mut conditioned = ConditionedLink::new(link, faults, 0xC0FFEE);
            for i in 0..100u8 {
                conditioned.transmit(&[i]);
            }
            runs.push(drain(&rx));
        }

        assert_eq!(runs[0], runs[1]);
        assert!(!runs[0].is_empty());
    }
}
