//! Authoritative conference registry: membership, roles, topology storage.

pub mod error;
pub mod registry;
pub mod types;

pub use error::{AttachError, CancelError, JoinOutcome, TopologyWriteError};
pub use registry::{Registry, RegistryEvent};
pub use types::{topology_for, ConferenceSnapshot, Participant, Role, Topology};
