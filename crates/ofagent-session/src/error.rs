use ofagent_wire::EncodeError;

/// The device-state store could not produce a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// No descriptor is registered for the datapath.
    #[error("no descriptor for datapath {0:#018x}")]
    UnknownDevice(u64),
}

/// The session could not transmit a buffer list.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Socket write error.
    #[error("socket write error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer stopped accepting bytes.
    #[error("connection closed while sending")]
    ConnectionClosed,
}

/// Failure of one request/reply exchange.
///
/// Each variant names the stage that failed; none of them invalidate the
/// session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The request context is malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No buffer list or segment could be allocated.
    #[error("buffer allocation failed")]
    ResourceExhausted,

    /// An encoder could not serialize the reply.
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    /// The device-state store had no usable record.
    #[error("device lookup failed: {0}")]
    Lookup(#[from] LookupError),

    /// The session failed to transmit the reply.
    #[error("send failed: {0}")]
    Io(#[from] SendError),
}

impl ProtocolError {
    /// Short name of the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "validate",
            Self::ResourceExhausted => "allocate",
            Self::Encode(_) => "encode",
            Self::Lookup(_) => "lookup",
            Self::Io(_) => "send",
        }
    }
}

/// Errors that end a session or prevent one from being established.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ofagent_transport::TransportError),

    /// Message framing error.
    #[error("wire error: {0}")]
    Wire(#[from] ofagent_wire::WireError),

    /// An exchange failed where the caller needs the reply.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// HELLO negotiation failed.
    #[error("hello failed: {0}")]
    HandshakeFailed(String),

    /// The peer went away.
    #[error("peer disconnected: {0}")]
    Disconnected(String),

    /// A blocking operation exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The peer answered with something other than what was asked for.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_follow_variants() {
        assert_eq!(ProtocolError::ResourceExhausted.stage(), "allocate");
        assert_eq!(
            ProtocolError::from(LookupError::UnknownDevice(7)).stage(),
            "lookup"
        );
        assert_eq!(
            ProtocolError::from(EncodeError::LengthOverflow(70_000)).stage(),
            "encode"
        );
        assert_eq!(ProtocolError::from(SendError::ConnectionClosed).stage(), "send");
    }

    #[test]
    fn lookup_error_formats_datapath_as_hex() {
        let err = LookupError::UnknownDevice(0xabc);
        assert_eq!(err.to_string(), "no descriptor for datapath 0x0000000000000abc");
    }
}
