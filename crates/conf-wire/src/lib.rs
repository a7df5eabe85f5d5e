//! Media datagram codec and shared conference/client identifiers.
//!
//! The leaf crate of the relay: no state, no async, nothing above it in
//! the dependency order. Every other crate in the workspace builds on the
//! types defined here.

pub mod error;
pub mod header;
pub mod ids;

pub use error::{Result, WireError};
pub use header::{MediaPacket, PacketHeader, PayloadType, HEADER_LEN, MAX_DATAGRAM_SIZE, MAX_PAYLOAD_SIZE};
pub use ids::{ClientId, ConferenceId};
