//! Conference/participant data model (§3 of the design).

use conf_wire::{ClientId, ConferenceId};
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Creator,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Idle,
    P2p,
    Relay,
}

/// Topology is a pure function of participant count and the server-wide
/// `forceComposite` flag (§3 invariant): 0-1 ⇒ idle, 2 ⇒ p2p (relay if
/// `force_composite`), ≥3 ⇒ relay.
pub fn topology_for(participant_count: usize, force_composite: bool) -> Topology {
    match participant_count {
        0 | 1 => Topology::Idle,
        2 => {
            if force_composite {
                Topology::Relay
            } else {
                Topology::P2p
            }
        }
        _ => Topology::Relay,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub client_id: ClientId,
    pub role: Role,
    pub endpoint: Option<SocketAddr>,
}

/// A read-only point-in-time view of a conference, returned by
/// `Registry::snapshot` / `Registry::list_conferences`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConferenceSnapshot {
    pub id: ConferenceId,
    pub creator: ClientId,
    pub participants: Vec<Participant>,
    pub topology: Topology,
}

impl ConferenceSnapshot {
    pub fn participant_ids(&self) -> Vec<ClientId> {
        self.participants.iter().map(|p| p.client_id).collect()
    }
}
