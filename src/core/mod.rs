//! Convoy Protocol - Core Layer
//!
//! Shared foundations for the reliability state machines:
//! - Wraparound-aware sequence arithmetic
//! - Protocol constants and hard limits
//! - The `Endpoint` collaborator trait
//! - Error taxonomy

mod constants;
mod error;
mod sequence;
mod traits;

pub use constants::*;
pub use error::*;
pub use sequence::*;
pub use traits::*;
