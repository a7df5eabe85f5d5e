use thiserror::Error;

pub type Result<T> = std::result::Result<T, WireError>;

/// Errors raised while encoding or decoding a [`crate::header::PacketHeader`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Datagram shorter than `HEADER_LEN`.
    #[error("datagram too short: {0} bytes, header needs {1}")]
    TooShort(usize, usize),

    /// `payloadType` was neither `0x01` (video) nor `0x02` (audio).
    #[error("unknown payload type: {0:#04x}")]
    UnknownPayloadType(u8),

    /// The reserved trailer byte was non-zero.
    #[error("reserved header byte is non-zero: {0:#04x}")]
    ReservedFieldMisuse(u8),

    /// Datagram exceeds the 1500-byte media-plane limit.
    #[error("datagram exceeds max size: {0} > {1}")]
    TooLarge(usize, usize),
}
