//! Fixed-layout media datagram header codec.
//!
//! 36 bytes, big-endian, no state:
//!
//! | Offset | Size | Field            |
//! |--------|------|------------------|
//! | 0      | 1    | `payload_type`   |
//! | 1      | 2    | `payload_length` |
//! | 3      | 16   | `client_id`      |
//! | 19     | 4    | `conference_id`  |
//! | 23     | 2    | `sequence_number`|
//! | 25     | 2    | `total_fragments`|
//! | 27     | 8    | `timestamp`      |
//! | 35     | 1    | reserved, must be `0x00` |
//!
//! One datagram carries one fragment. Fragments of the same logical frame
//! share `(client_id, conference_id, timestamp)` — the frame key. Audio
//! payloads always carry `total_fragments=1, sequence_number=0`.

use crate::error::{Result, WireError};
use crate::ids::{ClientId, ConferenceId};

/// Total header width on the wire, including the reserved trailer byte.
pub const HEADER_LEN: usize = 36;

/// Maximum on-wire datagram size (header + payload); callers must fragment.
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// Maximum payload carried by a single fragment.
pub const MAX_PAYLOAD_SIZE: usize = MAX_DATAGRAM_SIZE - HEADER_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadType {
    Video,
    Audio,
}

impl PayloadType {
    pub fn to_wire(self) -> u8 {
        match self {
            PayloadType::Video => 0x01,
            PayloadType::Audio => 0x02,
        }
    }

    pub fn from_wire(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(PayloadType::Video),
            0x02 => Ok(PayloadType::Audio),
            other => Err(WireError::UnknownPayloadType(other)),
        }
    }
}

/// The fixed media-packet header, parsed out of the first
/// [`HEADER_LEN`] bytes of a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub payload_type: PayloadType,
    pub payload_length: u16,
    pub client_id: ClientId,
    pub conference_id: ConferenceId,
    pub sequence_number: u16,
    pub total_fragments: u16,
    pub timestamp: u64,
}

impl PacketHeader {
    /// The frame key this fragment belongs to: `(client_id, conference_id, timestamp)`.
    pub fn frame_key(&self) -> (ClientId, ConferenceId, u64) {
        (self.client_id, self.conference_id.clone(), self.timestamp)
    }

    /// Encode the header into exactly [`HEADER_LEN`] bytes.
    ///
    /// Returns `None` if `conference_id` does not fit in the 4-byte wire
    /// slot — callers validate conference ids against this at creation
    /// time so this should not happen in practice.
    pub fn encode(&self) -> Option<[u8; HEADER_LEN]> {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.payload_type.to_wire();
        out[1..3].copy_from_slice(&self.payload_length.to_be_bytes());
        out[3..19].copy_from_slice(&self.client_id.as_bytes());
        out[19..23].copy_from_slice(&self.conference_id.to_wire()?);
        out[23..25].copy_from_slice(&self.sequence_number.to_be_bytes());
        out[25..27].copy_from_slice(&self.total_fragments.to_be_bytes());
        out[27..35].copy_from_slice(&self.timestamp.to_be_bytes());
        out[35] = 0;
        Some(out)
    }

    /// Parse a header from the front of `data`. Does not allocate beyond
    /// returning an owned [`PacketHeader`]; the caller retains `data` and
    /// slices off the payload itself (`&data[HEADER_LEN..]`).
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(WireError::TooShort(data.len(), HEADER_LEN));
        }
        if data.len() > MAX_DATAGRAM_SIZE {
            return Err(WireError::TooLarge(data.len(), MAX_DATAGRAM_SIZE));
        }
        if data[35] != 0 {
            return Err(WireError::ReservedFieldMisuse(data[35]));
        }

        let payload_type = PayloadType::from_wire(data[0])?;
        let payload_length = u16::from_be_bytes([data[1], data[2]]);

        let mut client_bytes = [0u8; 16];
        client_bytes.copy_from_slice(&data[3..19]);
        let client_id = ClientId::from_bytes(client_bytes);

        let mut conf_bytes = [0u8; 4];
        conf_bytes.copy_from_slice(&data[19..23]);
        let conference_id = ConferenceId::from_wire(conf_bytes);

        let sequence_number = u16::from_be_bytes([data[23], data[24]]);
        let total_fragments = u16::from_be_bytes([data[25], data[26]]);

        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&data[27..35]);
        let timestamp = u64::from_be_bytes(ts_bytes);

        Ok(PacketHeader {
            payload_type,
            payload_length,
            client_id,
            conference_id,
            sequence_number,
            total_fragments,
            timestamp,
        })
    }
}

/// A single datagram: header plus the fragment's payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPacket {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl MediaPacket {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = PacketHeader::decode(data)?;
        Ok(MediaPacket {
            header,
            payload: data[HEADER_LEN..].to_vec(),
        })
    }

    pub fn to_datagram(&self) -> Option<Vec<u8>> {
        let header = self.header.encode()?;
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.payload);
        Some(out)
    }
}
