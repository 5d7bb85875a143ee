//! The receiver's out-of-order reassembly buffer.
//!
//! Arrivals land in a fixed array of slots indexed `sequence mod capacity`
//! and drain to the application in strictly increasing sequence order. A
//! gap holds everything behind it in the buffer; the arrival that plugs the
//! gap releases the whole contiguous run in one call.
//!
//! Arrivals outside the buffer's live range are classified before they can
//! touch a slot: sequences behind `next_expected` already reached the
//! application and drop as duplicates, sequences a full capacity ahead drop
//! as overflow. A live occupant is therefore never overwritten.

use log::{debug, trace, warn};

use crate::core::{MAX_REASSEMBLY_CAPACITY, forward_distance, sequence_less_than};

/// A message released to the application in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Sequence number the message was carried under.
    pub sequence: u16,
    /// Application payload.
    pub payload: Vec<u8>,
}

/// Outcome of feeding one arrival into the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arrival {
    /// The arrival extended the contiguous run; these messages are now due,
    /// in increasing sequence order.
    Delivered(Vec<Delivery>),
    /// Stored out of order, waiting for an earlier sequence.
    Buffered,
    /// Already delivered or already buffered; dropped without state change.
    Duplicate,
    /// Outside the buffer's live range, or a slot collision; dropped
    /// without state change.
    Overflow,
}

/// An occupied reassembly slot.
#[derive(Debug, Clone)]
struct SlotEntry {
    sequence: u16,
    payload: Vec<u8>,
}

/// Fixed-capacity reassembly buffer with strictly ordered drain.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    /// Slot array indexed `sequence mod capacity`; `None` is unoccupied.
    slots: Vec<Option<SlotEntry>>,
    /// Next sequence eligible for in-order delivery.
    next_expected: u16,
    /// Occupied slot count.
    buffered: usize,
    duplicates: u64,
    overflows: u64,
}

impl ReassemblyBuffer {
    /// Create a buffer of `capacity` slots expecting `initial_sequence`
    /// first.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or exceeds
    /// [`MAX_REASSEMBLY_CAPACITY`]; larger buffers would make wraparound
    /// comparisons against `next_expected` ambiguous.
    pub fn new(capacity: usize, initial_sequence: u16) -> Self {
        assert!(
            capacity > 0 && capacity <= MAX_REASSEMBLY_CAPACITY,
            "reassembly capacity out of range: {capacity}"
        );
        Self {
            slots: vec![None; capacity],
            next_expected: initial_sequence,
            buffered: 0,
            duplicates: 0,
            overflows: 0,
        }
    }

    /// Feed one arrival into the buffer.
    ///
    /// Returns the messages released by this arrival, or the reason the
    /// arrival was dropped or held. Every drop is non-fatal and leaves the
    /// buffer unchanged.
    pub fn accept(&mut self, sequence: u16, payload: &[u8]) -> Arrival {
        if sequence_less_than(sequence, self.next_expected) {
            self.duplicates += 1;
            debug!(
                "sequence {sequence} already delivered (expecting {})",
                self.next_expected
            );
            return Arrival::Duplicate;
        }
        if forward_distance(self.next_expected, sequence) as usize >= self.slots.len() {
            self.overflows += 1;
            warn!(
                "sequence {sequence} beyond the {}-slot buffer (expecting {})",
                self.slots.len(),
                self.next_expected
            );
            return Arrival::Overflow;
        }

        let index = sequence as usize % self.slots.len();
        match &self.slots[index] {
            Some(entry) if entry.sequence == sequence => {
                self.duplicates += 1;
                debug!("sequence {sequence} already buffered");
                return Arrival::Duplicate;
            }
            Some(entry) => {
                // Unreachable while the range guard holds; kept as the
                // final defense against overwriting a live occupant.
                self.overflows += 1;
                warn!(
                    "slot {index} collision: holds {} against arriving {sequence}",
                    entry.sequence
                );
                return Arrival::Overflow;
            }
            None => {
                self.slots[index] = Some(SlotEntry {
                    sequence,
                    payload: payload.to_vec(),
                });
                self.buffered += 1;
                trace!("buffered sequence {sequence} in slot {index}");
            }
        }

        let run = self.drain_contiguous();
        if run.is_empty() {
            Arrival::Buffered
        } else {
            Arrival::Delivered(run)
        }
    }

    /// Release the contiguous run starting at `next_expected`, if any.
    fn drain_contiguous(&mut self) -> Vec<Delivery> {
        let mut run = Vec::new();
        loop {
            let index = self.next_expected as usize % self.slots.len();
            let due = matches!(
                &self.slots[index],
                Some(entry) if entry.sequence == self.next_expected
            );
            if !due {
                break;
            }
            if let Some(entry) = self.slots[index].take() {
                run.push(Delivery {
                    sequence: entry.sequence,
                    payload: entry.payload,
                });
            }
            self.buffered -= 1;
            self.next_expected = self.next_expected.wrapping_add(1);
        }
        run
    }

    /// Next sequence eligible for in-order delivery.
    pub fn next_expected(&self) -> u16 {
        self.next_expected
    }

    /// Number of out-of-order messages currently held.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    /// Whether no out-of-order messages are held.
    pub fn is_empty(&self) -> bool {
        self.buffered == 0
    }

    /// Slot capacity.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Arrivals dropped as already delivered or already buffered.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Arrivals dropped as outside the live range.
    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}
