//! Convoy reliability layer.
//!
//! Selective-repeat ARQ over an unreliable datagram transport: a bounded
//! in-flight window on the sending side, an out-of-order reassembly buffer
//! on the receiving side, and a session tying both to one transport
//! endpoint. It provides:
//!
//! - **Send window**: [`SendWindow`] with ack-driven retirement and
//!   fixed-timeout retransmission
//! - **Reassembly**: [`ReassemblyBuffer`] with strictly ordered delivery
//!   and duplicate/overflow classification
//! - **Sessions**: [`Session`], the symmetric per-peer driver surface
//!
//! Only the sender retransmits; the receiver's sole recovery duty is to
//! keep acknowledgement state flowing back through the endpoint.

mod reassembly;
mod session;
mod window;

pub use reassembly::{Arrival, Delivery, ReassemblyBuffer};
pub use session::{Serviced, Session, SessionConfig};
pub use window::{SendWindow, WindowError};
