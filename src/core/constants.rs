//! Protocol constants.
//!
//! Defaults are overridable through `SessionConfig` and `EndpointConfig`;
//! the hard limits are not.

use std::time::Duration;

// =============================================================================
// WINDOW & BUFFER CAPACITIES
// =============================================================================

/// Default bound on in-flight messages per send window.
pub const DEFAULT_WINDOW_SIZE: usize = 32;

/// Default reassembly buffer capacity (slots).
pub const DEFAULT_REASSEMBLY_CAPACITY: usize = 1024;

/// Default acknowledgement window capacity (tracked received sequences).
pub const DEFAULT_ACK_WINDOW: usize = 1024;

/// Hard upper bound on reassembly capacity.
///
/// Half the sequence space: beyond this, wraparound ordering between the
/// oldest and newest live sequence becomes ambiguous.
pub const MAX_REASSEMBLY_CAPACITY: usize = 32768;

// =============================================================================
// TIMING
// =============================================================================

/// Default retransmission timeout for unacknowledged messages.
///
/// Fixed interval, no backoff: the timer fires repeatedly until the
/// message is acknowledged.
pub const DEFAULT_RESEND_TIMEOUT: Duration = Duration::from_millis(1000);

// =============================================================================
// WIRE LIMITS
// =============================================================================

/// Largest datagram the endpoint will frame or accept.
///
/// Conservative single-MTU budget; there is no fragmentation layer.
pub const MAX_DATAGRAM_LEN: usize = 1200;

/// Width of the selective acknowledgement bitfield, in sequences.
pub const ACK_BITS_SPAN: usize = 32;
