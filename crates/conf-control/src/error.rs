use thiserror::Error;

/// Control-plane error kinds (§7). All of these surface as an `ERROR`
/// reply without closing the session, except `ChannelOverflow` and
/// `SessionClosed`, which cascade into session teardown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("malformed control message: {0}")]
    MalformedControl(String),
    #[error("unknown conference: {0}")]
    UnknownConference(String),
    #[error("not a participant of this conference")]
    NotAParticipant,
    #[error("already in this meeting")]
    AlreadyInMeeting,
    #[error("already in another meeting: {0}")]
    AlreadyInOther(String),
    #[error("not the conference creator")]
    NotCreator,
    #[error("control channel overflow")]
    ChannelOverflow,
    #[error("session closed")]
    SessionClosed,
}

impl ControlError {
    /// Human-readable text for the `ERROR` message's `message` field.
    pub fn reply_text(&self) -> String {
        self.to_string()
    }
}
