//! Identifiers shared by every layer of the relay.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 128-bit client identifier (UUID semantics). Server-assigned when a
/// client does not supply one at `INIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        ClientId(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        *self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        ClientId(Uuid::from_bytes(bytes))
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ClientId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ClientId(Uuid::parse_str(s)?))
    }
}

/// Short printable conference id, ≤4 bytes on the wire (§6.1, §4.1).
///
/// On the wire this is stored 0-padded into 4 bytes; in memory it is kept
/// as the printable string so it can be round-tripped through JSON control
/// messages (`"m-1"`, `"m-42"`, ...) without allocation games.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConferenceId(pub String);

impl ConferenceId {
    /// Encode into the fixed 4-byte, 0-padded wire representation.
    ///
    /// Returns `None` if the id's ASCII encoding does not fit in 4 bytes.
    pub fn to_wire(&self) -> Option<[u8; 4]> {
        let bytes = self.0.as_bytes();
        if bytes.len() > 4 {
            return None;
        }
        let mut out = [0u8; 4];
        out[..bytes.len()].copy_from_slice(bytes);
        Some(out)
    }

    /// Decode from the fixed 4-byte wire representation, trimming
    /// trailing zero padding.
    pub fn from_wire(bytes: [u8; 4]) -> Self {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(4);
        ConferenceId(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

impl fmt::Display for ConferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ConferenceId {
    fn from(s: String) -> Self {
        ConferenceId(s)
    }
}

impl From<&str> for ConferenceId {
    fn from(s: &str) -> Self {
        ConferenceId(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conference_id_wire_round_trip() {
        let id = ConferenceId::from("m-1");
        let wire = id.to_wire().unwrap();
        assert_eq!(wire, *b"m-1\0");
        assert_eq!(ConferenceId::from_wire(wire), id);
    }

    #[test]
    fn conference_id_rejects_oversize() {
        let id = ConferenceId::from("m-1234");
        assert!(id.to_wire().is_none());
    }

    #[test]
    fn client_id_round_trips_through_bytes() {
        let id = ClientId::new();
        assert_eq!(ClientId::from_bytes(id.as_bytes()), id);
    }
}
