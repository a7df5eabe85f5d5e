use conf_wire::ConferenceId;
use thiserror::Error;

/// Outcome of `Registry::join` (§4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyIn,
    InAnother(ConferenceId),
    NotFound,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CancelError {
    #[error("requester is not the conference creator")]
    NotCreator,
    #[error("conference not found")]
    NotFound,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttachError {
    #[error("conference not found")]
    NotFound,
    #[error("client is not a participant of this conference")]
    NotAParticipant,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyWriteError {
    #[error("conference not found")]
    NotFound,
}
