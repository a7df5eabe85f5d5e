//! JSON control-plane envelope (§6.1). Every message — request or
//! server-pushed — is a JSON object discriminated by `action`.

use conf_wire::ClientId;
use serde::{Deserialize, Serialize};

/// Client → Server requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ClientRequest {
    #[serde(rename = "INIT")]
    Init {
        #[serde(default)]
        client_id: Option<ClientId>,
    },
    /// `meeting_id` is accepted for wire compatibility but ignored — the
    /// server always mints the id.
    #[serde(rename = "CREATE_MEETING")]
    CreateMeeting {
        #[serde(default)]
        meeting_id: Option<String>,
    },
    #[serde(rename = "JOIN_MEETING")]
    JoinMeeting { meeting_id: String },
    #[serde(rename = "EXIT_MEETING")]
    ExitMeeting { meeting_id: String },
    #[serde(rename = "CANCEL_MEETING")]
    CancelMeeting { meeting_id: String },
    #[serde(rename = "REGISTER_RTP")]
    RegisterRtp {
        rtp_ip: String,
        rtp_port: u16,
        meeting_id: String,
    },
    #[serde(rename = "SEND_MESSAGE")]
    SendMessage { meeting_id: String, message: String },
    #[serde(rename = "CHANGE_CS_MODE_TO_SAME")]
    ChangeCsModeToSame {},
    #[serde(rename = "CHECK_MEETING_ALL")]
    CheckMeetingAll {},
    #[serde(rename = "PING")]
    Ping {},
}

/// One conference's membership, for `MEETING_LIST`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingSummary {
    pub meeting_id: String,
    pub creator: ClientId,
    pub participants: Vec<ClientId>,
}

/// Server → Client messages (responses and broadcasts share this type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ServerMessage {
    #[serde(rename = "INIT_ACK")]
    InitAck { client_id: ClientId },
    #[serde(rename = "CREATE_MEETING_ACK")]
    CreateMeetingAck { meeting_id: String },
    #[serde(rename = "JOIN_MEETING_ACK")]
    JoinMeetingAck {
        meeting_id: String,
        participants: Vec<ClientId>,
    },
    #[serde(rename = "EXIT_MEETING_ACK")]
    ExitMeetingAck { meeting_id: String },
    #[serde(rename = "MEETING_CANCELED")]
    MeetingCanceled { meeting_id: String },
    #[serde(rename = "NEW_MESSAGE")]
    NewMessage {
        meeting_id: String,
        sender: ClientId,
        message: String,
    },
    #[serde(rename = "REGISTER_RTP_ACK")]
    RegisterRtpAck { message: String },
    #[serde(rename = "P2P_ADDRESS")]
    P2pAddress { client_id: ClientId, ip: String, port: u16 },
    #[serde(rename = "STOP_P2P")]
    StopP2p {},
    #[serde(rename = "MEETING_LIST")]
    MeetingList { meetings: Vec<MeetingSummary> },
    #[serde(rename = "PONG")]
    Pong {},
    #[serde(rename = "ERROR")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_meeting_request_round_trips() {
        let request = ClientRequest::JoinMeeting {
            meeting_id: "m-1".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"action":"JOIN_MEETING","meeting_id":"m-1"}"#);
        let parsed: ClientRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn init_with_no_client_id_deserializes() {
        let parsed: ClientRequest = serde_json::from_str(r#"{"action":"INIT"}"#).unwrap();
        assert_eq!(parsed, ClientRequest::Init { client_id: None });
    }

    #[test]
    fn init_ack_serializes_with_client_id_field() {
        let client_id = ClientId::new();
        let msg = ServerMessage::InitAck { client_id };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["action"], "INIT_ACK");
        assert_eq!(json["client_id"], client_id.to_string());
    }

    #[test]
    fn unknown_action_fails_to_parse() {
        let result: Result<ClientRequest, _> = serde_json::from_str(r#"{"action":"DANCE"}"#);
        assert!(result.is_err());
    }
}
