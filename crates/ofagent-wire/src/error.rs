/// Errors raised while encoding into a segment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// The write would cross the segment's declared payload length.
    #[error("segment out of space (need {needed} bytes, {available} available)")]
    OutOfSpace { needed: usize, available: usize },

    /// A text field does not fit its fixed wire width.
    #[error("{field} is {len} bytes, field holds at most {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A text field contains a NUL byte, which would end it early on the wire.
    #[error("{field} contains a NUL byte at offset {offset}")]
    InteriorNul { field: &'static str, offset: usize },

    /// A back-patch targeted bytes that were never written.
    #[error("patch of {width} bytes at offset {offset} overruns written length {written}")]
    PatchOutOfBounds {
        offset: usize,
        width: usize,
        written: usize,
    },

    /// The encoded message is longer than the 16-bit length field allows.
    #[error("encoded length {0} exceeds the 16-bit length field")]
    LengthOverflow(usize),
}

/// Errors raised while reading or decoding inbound messages.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The header declares a length shorter than the header itself.
    #[error("declared message length {0} is shorter than the header")]
    BadLength(u16),

    /// The declared length exceeds the configured maximum.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A structure was cut short.
    #[error("truncated {what}: need {needed} bytes, have {have}")]
    Truncated {
        what: &'static str,
        needed: usize,
        have: usize,
    },

    /// An I/O error occurred while reading messages.
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, WireError>;
