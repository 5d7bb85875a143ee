//! Convoy transport layer.
//!
//! This module carries packets between two peers and keeps the wire-level
//! bookkeeping out of the reliability state machines. It provides:
//!
//! - **Packet encoding/decoding**: [`PacketHeader`] and wire format handling
//! - **Links**: the [`Link`] transmit seam, with [`QueueLink`] and
//!   [`ConditionedLink`] for in-process and fault-injected wiring
//! - **The endpoint**: [`PacketEndpoint`], which allocates sequences, frames
//!   packets, and tracks acknowledgements in both directions
//! - **RTT estimation**: [`RttEstimator`] implementing RFC 6298
//! - **Async sockets**: [`ConvoySocket`] wrapper for tokio UDP (feature
//!   `udp`)
//!
//! # Architecture
//!
//! The transport layer sits between the reliability layer and whatever
//! actually moves bytes. It handles framing, ack generation, and timing
//! while remaining agnostic to payload contents.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Reliability Layer (arq)          │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   headers, acks, RTT, endpoints         │
//! ├─────────────────────────────────────────┤
//! │         Link (UDP, queue, ...)          │
//! └─────────────────────────────────────────┘
//! ```

mod endpoint;
mod header;
mod link;
#[cfg(feature = "udp")]
mod socket;
mod timing;

pub use endpoint::{EndpointConfig, EndpointCounters, PacketEndpoint};
pub use header::{
    HeaderError, PacketHeader, PacketKind, decode_packet, encode_packet, sizes as header_sizes,
};
pub use link::{ConditionedLink, FaultConfig, Link, QueueLink};
#[cfg(feature = "udp")]
#[cfg_attr(docsrs, doc(cfg(feature = "udp")))]
pub use socket::{ConvoySocket, ConvoySocketBuilder, DEFAULT_RECV_BUFFER_SIZE, UdpLink};
pub use timing::{RttEstimator, constants as timing_constants};
