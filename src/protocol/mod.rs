//! JSON event protocol
//!
//! Typed client/server events plus the wire codec. Unknown server frames
//! are dropped rather than failing the session.

mod codec;
mod events;

pub use codec::{EventEncoder, decode};
pub use events::{ClientEvent, ServerEvent, SessionDescription, TurnDetection};
