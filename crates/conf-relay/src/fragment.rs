//! Splits a reassembled (or synthesized) frame payload back into
//! ≤1500-byte datagrams for re-emission (§4.6 fan-out policy).

use conf_wire::{ClientId, ConferenceId, MediaPacket, PacketHeader, PayloadType, MAX_PAYLOAD_SIZE};

pub fn fragment(
    payload_type: PayloadType,
    client_id: ClientId,
    conference_id: ConferenceId,
    timestamp: u64,
    bytes: &[u8],
) -> Vec<Vec<u8>> {
    let chunks: Vec<&[u8]> = if bytes.is_empty() {
        vec![&[]]
    } else {
        bytes.chunks(MAX_PAYLOAD_SIZE).collect()
    };
    let total_fragments = chunks.len() as u16;

    chunks
        .into_iter()
        .enumerate()
        .filter_map(|(index, chunk)| {
            // Audio always carries sequence_number=0, total_fragments=1
            // (§4.1); video fragments are numbered 1-based.
            let sequence_number = match payload_type {
                PayloadType::Audio => 0,
                PayloadType::Video => (index + 1) as u16,
            };
            let header = PacketHeader {
                payload_type,
                payload_length: chunk.len() as u16,
                client_id,
                conference_id: conference_id.clone(),
                sequence_number,
                total_fragments,
                timestamp,
            };
            MediaPacket {
                header,
                payload: chunk.to_vec(),
            }
            .to_datagram()
        })
        .collect()
}
