//! # Convoy Protocol
//!
//! Convoy is a selective-repeat reliability layer for unreliable,
//! packet-oriented transports. It delivers a stream of variable-length
//! messages exactly once and in order despite loss, duplication, and
//! reordering on the underlying channel. It provides:
//!
//! - **Reliability**: Acknowledgement-driven retirement with fixed-timeout
//!   retransmission of anything still outstanding
//! - **Ordering**: Out-of-order arrivals reassemble and drain strictly in
//!   sequence, with duplicates dropped
//! - **Bounded memory**: A fixed in-flight window on the sender and a fixed
//!   slot buffer on the receiver, no unbounded queues
//! - **Simplicity**: Fixed resend policy, no negotiation, no handshake
//! - **Symmetry**: Both peers run the same session type
//!
//! ## Feature Flags
//!
//! - `udp` (default): Async UDP socket layer built on tokio
//!
//! ## Modules
//!
//! - [`core`]: Core traits, constants, and error types
//! - [`transport`]: Packet framing, acknowledgements, links, and sockets
//! - [`arq`]: The reliability state machines and the session surface
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use convoy_protocol::prelude::*;
//!
//! let start = Instant::now();
//!
//! // Two peers wired back to back with in-process queue links.
//! let (a_link, a_out) = QueueLink::channel();
//! let (b_link, b_out) = QueueLink::channel();
//! let mut a = Session::new(
//!     PacketEndpoint::new(a_link, EndpointConfig::default(), start),
//!     SessionConfig::default(),
//! );
//! let mut b = Session::new(
//!     PacketEndpoint::new(b_link, EndpointConfig::default(), start),
//!     SessionConfig::default(),
//! );
//!
//! a.send(b"hello", start)?;
//!
//! // Deliver A's datagram to B.
//! let mut received = Vec::new();
//! for datagram in a_out.try_iter() {
//!     received.extend(b.handle_packet(&datagram)?);
//! }
//! assert_eq!(received[0].payload, b"hello");
//!
//! // B acknowledges on its next service pass; A retires the record.
//! b.service(start + Duration::from_millis(5));
//! for datagram in b_out.try_iter() {
//!     a.handle_packet(&datagram)?;
//! }
//! let serviced = a.service(start + Duration::from_millis(10));
//! assert_eq!(serviced.retired, 1);
//! # Ok::<(), convoy_protocol::ConvoyError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Transport layer
pub mod transport;

// Reliability layer
pub mod arq;

/// Prelude module for convenient imports.
pub mod prelude {
    // Reliability types
    pub use crate::arq::*;

    // Core traits and types
    pub use crate::core::*;

    // Transport types
    pub use crate::transport::{
        ConditionedLink, EndpointConfig, EndpointCounters, FaultConfig, HeaderError, Link,
        PacketEndpoint, PacketHeader, PacketKind, QueueLink, RttEstimator,
    };

    // Socket types (when enabled)
    #[cfg(feature = "udp")]
    pub use crate::transport::{ConvoySocket, ConvoySocketBuilder, UdpLink};
}

// Re-export commonly used items at crate root
pub use crate::arq::{
    Arrival, Delivery, ReassemblyBuffer, SendWindow, Serviced, Session, SessionConfig, WindowError,
};
pub use crate::core::{ConvoyError, Endpoint, Inbound};
pub use crate::transport::{EndpointConfig, PacketEndpoint, QueueLink, RttEstimator};

#[cfg(feature = "udp")]
pub use crate::transport::{ConvoySocket, ConvoySocketBuilder};
