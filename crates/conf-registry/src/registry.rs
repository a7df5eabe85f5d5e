//! The conference registry: authoritative membership, roles, and the
//! exclusive store for `Conference.topology` (§4.3).

use crate::error::{AttachError, CancelError, JoinOutcome, TopologyWriteError};
use crate::types::{ConferenceSnapshot, Participant, Role, Topology};
use conf_wire::{ClientId, ConferenceId};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

/// Membership-change events the Topology Controller (and anything else
/// interested) subscribes to. Linearized per conference by the
/// broadcasting registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    ParticipantJoined { conference: ConferenceId, client: ClientId },
    ParticipantLeft { conference: ConferenceId, client: ClientId },
    ConferenceCancelled { conference: ConferenceId, participants: Vec<ClientId> },
    TopologyChanged { conference: ConferenceId, topology: Topology },
    EndpointAttached { conference: ConferenceId, client: ClientId },
}

struct ConferenceState {
    id: ConferenceId,
    creator: ClientId,
    participants: Vec<Participant>,
    topology: Topology,
}

impl ConferenceState {
    fn participant_ids(&self) -> Vec<ClientId> {
        self.participants.iter().map(|p| p.client_id).collect()
    }

    fn to_snapshot(&self) -> ConferenceSnapshot {
        ConferenceSnapshot {
            id: self.id.clone(),
            creator: self.creator,
            participants: self.participants.clone(),
            topology: self.topology,
        }
    }
}

/// Default broadcast channel capacity for registry events; generous
/// enough that a slow subscriber lagging a handful of ticks doesn't lose
/// events under normal conference churn.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct Registry {
    conferences: DashMap<ConferenceId, Arc<Mutex<ConferenceState>>>,
    user_meeting_map: DashMap<ClientId, ConferenceId>,
    /// Serializes conference creation (auto-numbering) and destruction,
    /// per §5's "global mutex for conference creation/destruction".
    creation_lock: Mutex<u64>,
    force_composite: AtomicBool,
    event_tx: broadcast::Sender<RegistryEvent>,
}

impl Registry {
    pub fn new(force_composite: bool) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Registry {
            conferences: DashMap::new(),
            user_meeting_map: DashMap::new(),
            creation_lock: Mutex::new(0),
            force_composite: AtomicBool::new(force_composite),
            event_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_tx.subscribe()
    }

    pub fn force_composite(&self) -> bool {
        self.force_composite.load(Ordering::Relaxed)
    }

    /// `CHANGE_CS_MODE_TO_SAME` sets this; does not by itself recompute
    /// any conference's topology — the Topology Controller reacts to the
    /// next membership event, or callers can force a recompute pass.
    pub fn set_force_composite(&self, value: bool) {
        self.force_composite.store(value, Ordering::Relaxed);
    }

    /// Allocates a short, auto-numbered conference id (`"m-<n>"`) and
    /// enrolls the creator as its sole participant.
    pub async fn create_conference(&self, creator: ClientId) -> ConferenceId {
        let mut counter = self.creation_lock.lock().await;
        *counter += 1;
        let id = ConferenceId::from(format!("m-{}", *counter));
        drop(counter);

        let state = ConferenceState {
            id: id.clone(),
            creator,
            participants: vec![Participant {
                client_id: creator,
                role: Role::Creator,
                endpoint: None,
            }],
            topology: Topology::Idle,
        };
        self.conferences.insert(id.clone(), Arc::new(Mutex::new(state)));
        self.user_meeting_map.insert(creator, id.clone());

        info!(conference = %id, creator = %creator, "conference created");
        let _ = self.event_tx.send(RegistryEvent::ParticipantJoined {
            conference: id.clone(),
            client: creator,
        });
        id
    }

    /// Joins `client` to `conference_id`.
    ///
    /// Does not auto-migrate a client already in a different conference —
    /// it reports `InAnother` and leaves membership untouched, so the
    /// control-channel handler can reply `ERROR` per §7's
    /// `AlreadyInOther` policy. A caller that wants to switch conferences
    /// performs the explicit `exit` then `join` sequence, which is how
    /// the §3 invariant ("joining a second conference first removes it
    /// from the prior") is actually satisfied.
    pub async fn join(&self, conference_id: &ConferenceId, client: ClientId) -> JoinOutcome {
        if let Some(current) = self.user_meeting_map.get(&client).map(|r| r.value().clone()) {
            if &current != conference_id {
                return JoinOutcome::InAnother(current);
            }
        }

        let Some(entry) = self.conferences.get(conference_id).map(|r| r.value().clone()) else {
            return JoinOutcome::NotFound;
        };

        let mut state = entry.lock().await;
        if state.participants.iter().any(|p| p.client_id == client) {
            return JoinOutcome::AlreadyIn;
        }
        state.participants.push(Participant {
            client_id: client,
            role: Role::Member,
            endpoint: None,
        });
        drop(state);

        self.user_meeting_map.insert(client, conference_id.clone());
        info!(conference = %conference_id, client = %client, "participant joined");
        let _ = self.event_tx.send(RegistryEvent::ParticipantJoined {
            conference: conference_id.clone(),
            client,
        });
        JoinOutcome::Joined
    }

    /// Idempotent: removing a client not present in the conference is a
    /// no-op. Destroys the conference once it becomes empty.
    pub async fn exit(&self, conference_id: &ConferenceId, client: ClientId) {
        let Some(entry) = self.conferences.get(conference_id).map(|r| r.value().clone()) else {
            return;
        };

        let (removed, now_empty) = {
            let mut state = entry.lock().await;
            let before = state.participants.len();
            state.participants.retain(|p| p.client_id != client);
            (before != state.participants.len(), state.participants.is_empty())
        };
        if !removed {
            return;
        }

        self.user_meeting_map.remove(&client);
        if now_empty {
            let _guard = self.creation_lock.lock().await;
            self.conferences.remove(conference_id);
            info!(conference = %conference_id, "conference destroyed (empty)");
        }
        info!(conference = %conference_id, client = %client, "participant left");
        let _ = self.event_tx.send(RegistryEvent::ParticipantLeft {
            conference: conference_id.clone(),
            client,
        });
    }

    /// Only the immutable `creator` identity may cancel (§4.3 tie-break).
    /// Removes every participant and returns their ids so the caller can
    /// broadcast `MEETING_CANCELED`.
    pub async fn cancel(&self, conference_id: &ConferenceId, by: ClientId) -> Result<Vec<ClientId>, CancelError> {
        let Some(entry) = self.conferences.get(conference_id).map(|r| r.value().clone()) else {
            return Err(CancelError::NotFound);
        };

        let participants = {
            let state = entry.lock().await;
            if state.creator != by {
                return Err(CancelError::NotCreator);
            }
            state.participant_ids()
        };

        for participant in &participants {
            self.user_meeting_map.remove(participant);
        }
        {
            let _guard = self.creation_lock.lock().await;
            self.conferences.remove(conference_id);
        }

        info!(conference = %conference_id, by = %by, "conference cancelled");
        let _ = self.event_tx.send(RegistryEvent::ConferenceCancelled {
            conference: conference_id.clone(),
            participants: participants.clone(),
        });
        Ok(participants)
    }

    /// Records a client's media-plane address. Required before that
    /// client may participate on the media plane (§4.3).
    pub async fn attach_endpoint(
        &self,
        conference_id: &ConferenceId,
        client: ClientId,
        addr: SocketAddr,
    ) -> Result<(), AttachError> {
        let entry = self
            .conferences
            .get(conference_id)
            .map(|r| r.value().clone())
            .ok_or(AttachError::NotFound)?;
        {
            let mut state = entry.lock().await;
            let participant = state
                .participants
                .iter_mut()
                .find(|p| p.client_id == client)
                .ok_or(AttachError::NotAParticipant)?;
            participant.endpoint = Some(addr);
        }

        let _ = self.event_tx.send(RegistryEvent::EndpointAttached {
            conference: conference_id.clone(),
            client,
        });
        Ok(())
    }

    /// The Topology Controller is the only caller expected to invoke
    /// this; the Registry is the exclusive *storage* for the field, but
    /// topology decisions live in `conf-topology`.
    pub async fn set_topology(&self, conference_id: &ConferenceId, topology: Topology) -> Result<(), TopologyWriteError> {
        let entry = self
            .conferences
            .get(conference_id)
            .map(|r| r.value().clone())
            .ok_or(TopologyWriteError::NotFound)?;

        {
            let mut state = entry.lock().await;
            if state.topology == topology {
                return Ok(());
            }
            state.topology = topology;
        }

        let _ = self.event_tx.send(RegistryEvent::TopologyChanged {
            conference: conference_id.clone(),
            topology,
        });
        Ok(())
    }

    pub async fn snapshot(&self, conference_id: &ConferenceId) -> Option<ConferenceSnapshot> {
        let entry = self.conferences.get(conference_id)?.value().clone();
        let state = entry.lock().await;
        Some(state.to_snapshot())
    }

    /// Backs `CHECK_MEETING_ALL`.
    pub async fn list_conferences(&self) -> Vec<ConferenceSnapshot> {
        let handles: Vec<_> = self.conferences.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let state = handle.lock().await;
            out.push(state.to_snapshot());
        }
        out
    }

    pub fn current_conference(&self, client: &ClientId) -> Option<ConferenceId> {
        self.user_meeting_map.get(client).map(|r| r.value().clone())
    }
}
