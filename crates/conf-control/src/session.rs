//! Per-connection control-channel state machine: `Unconnected` until
//! `INIT` is accepted, `Active` while dispatching requests, `Closed`
//! once torn down. One `ControlSession` per client connection.

use crate::directory::{SessionDirectory, SessionRegistry};
use crate::error::ControlError;
use crate::protocol::{ClientRequest, MeetingSummary, ServerMessage};
use conf_registry::{JoinOutcome, Registry};
use conf_wire::{ClientId, ConferenceId};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Unconnected,
    Active,
    Closed,
}

/// What the connection-handling loop should do after feeding one inbound
/// frame to the session.
pub enum SessionEvent {
    /// Not yet initialised: send this reply directly over the transport.
    DirectReply(ServerMessage),
    /// `INIT` accepted. The caller must forward everything read from
    /// `outbound` to the transport until the session closes.
    Initialised {
        client_id: ClientId,
        ack: ServerMessage,
        outbound: mpsc::Receiver<ServerMessage>,
    },
    /// The request (and any reply or broadcast it produced) was already
    /// dispatched through the session directory.
    Handled,
    /// The connection should be torn down.
    Close,
}

pub struct ControlSession {
    state: SessionState,
    client_id: Option<ClientId>,
    registry: Arc<Registry>,
    directory: Arc<SessionRegistry>,
}

impl ControlSession {
    pub fn new(registry: Arc<Registry>, directory: Arc<SessionRegistry>) -> Self {
        ControlSession {
            state: SessionState::Unconnected,
            client_id: None,
            registry,
            directory,
        }
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Feed one inbound text frame to the session.
    pub async fn handle_text(&mut self, raw: &str) -> SessionEvent {
        match self.state {
            SessionState::Closed => SessionEvent::Close,
            SessionState::Unconnected => self.handle_unconnected(raw).await,
            SessionState::Active => self.handle_active(raw).await,
        }
    }

    async fn handle_unconnected(&mut self, raw: &str) -> SessionEvent {
        let request: ClientRequest = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(e) => {
                return SessionEvent::DirectReply(ServerMessage::Error {
                    message: ControlError::MalformedControl(e.to_string()).reply_text(),
                })
            }
        };

        let ClientRequest::Init { client_id } = request else {
            return SessionEvent::DirectReply(ServerMessage::Error {
                message: "expected INIT as the first message".to_string(),
            });
        };

        let id = client_id.unwrap_or_default();
        let outbound = self.directory.register(id);
        self.client_id = Some(id);
        self.state = SessionState::Active;
        debug!(client = %id, "session initialised");
        SessionEvent::Initialised {
            client_id: id,
            ack: ServerMessage::InitAck { client_id: id },
            outbound,
        }
    }

    async fn handle_active(&mut self, raw: &str) -> SessionEvent {
        let client_id = self.client_id.expect("active session has a client id");

        let request: ClientRequest = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(e) => {
                return self
                    .reply(
                        client_id,
                        ServerMessage::Error {
                            message: ControlError::MalformedControl(e.to_string()).reply_text(),
                        },
                    )
                    .await
            }
        };

        let reply = match request {
            ClientRequest::Init { .. } => Some(ServerMessage::Error {
                message: "already initialised".to_string(),
            }),
            ClientRequest::Ping {} => Some(ServerMessage::Pong {}),
            ClientRequest::CreateMeeting { .. } => {
                let conference = self.registry.create_conference(client_id).await;
                Some(ServerMessage::CreateMeetingAck {
                    meeting_id: conference.to_string(),
                })
            }
            ClientRequest::JoinMeeting { meeting_id } => {
                Some(self.handle_join(client_id, meeting_id.into()).await)
            }
            ClientRequest::ExitMeeting { meeting_id } => {
                self.registry.exit(&meeting_id.clone().into(), client_id).await;
                Some(ServerMessage::ExitMeetingAck { meeting_id })
            }
            ClientRequest::CancelMeeting { meeting_id } => {
                Some(self.handle_cancel(client_id, meeting_id.into()).await)
            }
            ClientRequest::RegisterRtp {
                rtp_ip,
                rtp_port,
                meeting_id,
            } => Some(self.handle_register_rtp(client_id, rtp_ip, rtp_port, meeting_id.into()).await),
            ClientRequest::SendMessage { meeting_id, message } => {
                self.handle_send_message(client_id, meeting_id.into(), message).await;
                None
            }
            ClientRequest::ChangeCsModeToSame {} => {
                self.registry.set_force_composite(true);
                None
            }
            ClientRequest::CheckMeetingAll {} => Some(self.handle_check_meeting_all().await),
        };

        match reply {
            Some(message) => self.reply(client_id, message).await,
            None => SessionEvent::Handled,
        }
    }

    async fn handle_join(&self, client_id: ClientId, conference_id: ConferenceId) -> ServerMessage {
        match self.registry.join(&conference_id, client_id).await {
            JoinOutcome::Joined => {
                let snapshot = self.registry.snapshot(&conference_id).await.expect("just joined");
                ServerMessage::JoinMeetingAck {
                    meeting_id: conference_id.to_string(),
                    participants: snapshot.participant_ids(),
                }
            }
            JoinOutcome::AlreadyIn => ServerMessage::Error {
                message: ControlError::AlreadyInMeeting.reply_text(),
            },
            JoinOutcome::InAnother(other) => ServerMessage::Error {
                message: ControlError::AlreadyInOther(other.to_string()).reply_text(),
            },
            JoinOutcome::NotFound => ServerMessage::Error {
                message: ControlError::UnknownConference(conference_id.to_string()).reply_text(),
            },
        }
    }

    async fn handle_cancel(&self, client_id: ClientId, conference_id: ConferenceId) -> ServerMessage {
        match self.registry.cancel(&conference_id, client_id).await {
            Ok(participants) => {
                let message = ServerMessage::MeetingCanceled {
                    meeting_id: conference_id.to_string(),
                };
                for participant in participants {
                    if participant == client_id {
                        continue;
                    }
                    if let Err(e) = self.directory.send_to(participant, message.clone()).await {
                        warn!(client = %participant, error = %e, "failed to deliver MEETING_CANCELED");
                    }
                }
                message
            }
            Err(conf_registry::CancelError::NotCreator) => ServerMessage::Error {
                message: ControlError::NotCreator.reply_text(),
            },
            Err(conf_registry::CancelError::NotFound) => ServerMessage::Error {
                message: ControlError::UnknownConference(conference_id.to_string()).reply_text(),
            },
        }
    }

    async fn handle_register_rtp(
        &self,
        client_id: ClientId,
        rtp_ip: String,
        rtp_port: u16,
        conference_id: ConferenceId,
    ) -> ServerMessage {
        let Ok(ip) = rtp_ip.parse::<IpAddr>() else {
            return ServerMessage::Error {
                message: ControlError::MalformedControl(format!("invalid rtp_ip: {rtp_ip}")).reply_text(),
            };
        };
        let addr = SocketAddr::new(ip, rtp_port);
        match self.registry.attach_endpoint(&conference_id, client_id, addr).await {
            Ok(()) => ServerMessage::RegisterRtpAck {
                message: "registered".to_string(),
            },
            Err(conf_registry::AttachError::NotFound) => ServerMessage::Error {
                message: ControlError::UnknownConference(conference_id.to_string()).reply_text(),
            },
            Err(conf_registry::AttachError::NotAParticipant) => ServerMessage::Error {
                message: ControlError::NotAParticipant.reply_text(),
            },
        }
    }

    async fn handle_send_message(&self, client_id: ClientId, conference_id: ConferenceId, message: String) {
        let Some(snapshot) = self.registry.snapshot(&conference_id).await else {
            let _ = self
                .directory
                .send_to(
                    client_id,
                    ServerMessage::Error {
                        message: ControlError::UnknownConference(conference_id.to_string()).reply_text(),
                    },
                )
                .await;
            return;
        };
        if !snapshot.participant_ids().contains(&client_id) {
            let _ = self
                .directory
                .send_to(
                    client_id,
                    ServerMessage::Error {
                        message: ControlError::NotAParticipant.reply_text(),
                    },
                )
                .await;
            return;
        }

        let broadcast = ServerMessage::NewMessage {
            meeting_id: conference_id.to_string(),
            sender: client_id,
            message,
        };
        for participant in snapshot.participant_ids() {
            if participant == client_id {
                continue;
            }
            if let Err(e) = self.directory.send_to(participant, broadcast.clone()).await {
                warn!(client = %participant, error = %e, "failed to deliver NEW_MESSAGE");
            }
        }
    }

    async fn handle_check_meeting_all(&self) -> ServerMessage {
        let meetings = self
            .registry
            .list_conferences()
            .await
            .into_iter()
            .map(|snapshot| MeetingSummary {
                meeting_id: snapshot.id.to_string(),
                creator: snapshot.creator,
                participants: snapshot.participant_ids(),
            })
            .collect();
        ServerMessage::MeetingList { meetings }
    }

    async fn reply(&mut self, client_id: ClientId, message: ServerMessage) -> SessionEvent {
        match self.directory.send_to(client_id, message).await {
            Ok(()) => SessionEvent::Handled,
            Err(ControlError::ChannelOverflow | ControlError::SessionClosed) => {
                self.state = SessionState::Closed;
                SessionEvent::Close
            }
            Err(_) => SessionEvent::Handled,
        }
    }

    /// Cascades session teardown into the registry and the directory.
    /// Safe to call more than once; safe to call on a session that never
    /// completed `INIT`.
    pub async fn close(&mut self) {
        if let Some(client_id) = self.client_id.take() {
            if let Some(conference) = self.registry.current_conference(&client_id) {
                self.registry.exit(&conference, client_id).await;
            }
            self.directory.unregister(&client_id);
        }
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harness() -> (Arc<Registry>, Arc<SessionRegistry>) {
        (Arc::new(Registry::new(false)), Arc::new(SessionRegistry::new()))
    }

    #[tokio::test]
    async fn first_message_must_be_init() {
        let (registry, directory) = harness();
        let mut session = ControlSession::new(registry, directory);
        match session.handle_text(r#"{"action":"PING"}"#).await {
            SessionEvent::DirectReply(ServerMessage::Error { .. }) => {}
            _ => panic!("expected a direct error reply"),
        }
    }

    #[tokio::test]
    async fn init_registers_and_acks() {
        let (registry, directory) = harness();
        let mut session = ControlSession::new(registry, directory.clone());
        match session.handle_text(r#"{"action":"INIT"}"#).await {
            SessionEvent::Initialised { client_id, ack, .. } => {
                assert_eq!(ack, ServerMessage::InitAck { client_id });
                assert!(directory.is_active(&client_id));
            }
            _ => panic!("expected Initialised"),
        }
    }

    #[tokio::test]
    async fn create_then_join_then_send_message_routes_to_other_participant() {
        let (registry, directory) = harness();

        let mut alice = ControlSession::new(registry.clone(), directory.clone());
        let SessionEvent::Initialised {
            client_id: alice_id, ..
        } = alice.handle_text(r#"{"action":"INIT"}"#).await
        else {
            panic!("expected init");
        };

        let mut bob = ControlSession::new(registry.clone(), directory.clone());
        let SessionEvent::Initialised { client_id: bob_id, outbound: mut bob_outbound, .. } =
            bob.handle_text(r#"{"action":"INIT"}"#).await
        else {
            panic!("expected init");
        };

        let SessionEvent::Handled = alice.handle_text(r#"{"action":"CREATE_MEETING"}"#).await else {
            panic!("expected handled");
        };
        let meeting_id = registry.current_conference(&alice_id).unwrap().to_string();

        let join_request = serde_json::to_string(&ClientRequest::JoinMeeting {
            meeting_id: meeting_id.clone(),
        })
        .unwrap();
        let SessionEvent::Handled = bob.handle_text(&join_request).await else {
            panic!("expected handled");
        };
        assert_eq!(registry.current_conference(&bob_id), Some(meeting_id.clone().into()));

        let send_request = serde_json::to_string(&ClientRequest::SendMessage {
            meeting_id,
            message: "hello".to_string(),
        })
        .unwrap();
        let SessionEvent::Handled = alice.handle_text(&send_request).await else {
            panic!("expected handled");
        };

        let received = bob_outbound.recv().await.unwrap();
        assert_eq!(
            received,
            ServerMessage::NewMessage {
                meeting_id: registry.current_conference(&bob_id).unwrap().to_string(),
                sender: alice_id,
                message: "hello".to_string(),
            }
        );
    }

    /// A malformed frame mid-session gets an `ERROR` reply without
    /// closing the session; the next valid request is still handled
    /// normally (§7: control-plane errors don't close the session).
    #[tokio::test]
    async fn s_control_error_survives() {
        let (registry, directory) = harness();
        let mut session = ControlSession::new(registry.clone(), directory.clone());
        let SessionEvent::Initialised { client_id, .. } = session.handle_text(r#"{"action":"INIT"}"#).await else {
            panic!("expected init");
        };

        match session.handle_text("not json").await {
            SessionEvent::Handled => {}
            _ => panic!("expected the malformed frame to get an error reply without closing the session"),
        }
        assert!(!session.is_closed());
        assert!(directory.is_active(&client_id));

        match session.handle_text(r#"{"action":"CREATE_MEETING"}"#).await {
            SessionEvent::Handled => {}
            _ => panic!("expected the following valid request to still be handled"),
        }
        assert!(registry.current_conference(&client_id).is_some());
    }

    #[tokio::test]
    async fn close_removes_membership_and_directory_entry() {
        let (registry, directory) = harness();
        let mut session = ControlSession::new(registry.clone(), directory.clone());
        let SessionEvent::Initialised { client_id, .. } = session.handle_text(r#"{"action":"INIT"}"#).await else {
            panic!("expected init");
        };
        session.handle_text(r#"{"action":"CREATE_MEETING"}"#).await;
        assert!(registry.current_conference(&client_id).is_some());

        session.close().await;
        assert!(registry.current_conference(&client_id).is_none());
        assert!(!directory.is_active(&client_id));
        assert!(session.is_closed());
    }
}
