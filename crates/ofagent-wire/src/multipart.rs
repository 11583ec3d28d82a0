//! Multipart request/reply envelopes.
//!
//! ```text
//! ┌──────────────┬──────────────┬─────────────┬─────────────┬─────────────┐
//! │ Header (8B)  │ Kind (2B BE) │ Flags (2B)  │ Pad (4B, 0) │ Body        │
//! └──────────────┴──────────────┴─────────────┴─────────────┴─────────────┘
//! ```

use bytes::{Buf, Bytes};

use crate::buffer::Segment;
use crate::codec::{Message, MessageType, ProtocolHeader, HEADER_LEN};
use crate::error::{EncodeError, Result, WireError};

/// Header plus kind, flags and padding.
pub const MULTIPART_HEADER_LEN: usize = 16;

/// Flag set on every part of a multipart reply except the last.
pub const MULTIPART_REPLY_MORE: u16 = 1 << 0;

const PAD_LEN: usize = 4;

/// Body kind carried by a multipart message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartType {
    /// Switch description.
    Desc,
    Unknown(u16),
}

impl From<u16> for MultipartType {
    fn from(code: u16) -> Self {
        match code {
            0 => Self::Desc,
            other => Self::Unknown(other),
        }
    }
}

impl From<MultipartType> for u16 {
    fn from(kind: MultipartType) -> Self {
        match kind {
            MultipartType::Desc => 0,
            MultipartType::Unknown(code) => code,
        }
    }
}

/// Outer envelope of a multipart reply; the typed body follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartReplyEnvelope {
    pub header: ProtocolHeader,
    pub kind: MultipartType,
    pub flags: u16,
}

impl MultipartReplyEnvelope {
    /// Envelope for a single-part reply with a zero length placeholder.
    pub fn new(version: u8, xid: u32, kind: MultipartType) -> Self {
        Self {
            header: ProtocolHeader::new(version, MessageType::MultipartReply, xid),
            kind,
            flags: 0,
        }
    }

    /// Append the envelope at the segment's cursor.
    pub fn encode(&self, segment: &mut Segment) -> std::result::Result<(), EncodeError> {
        encode_envelope(segment, &self.header, self.kind, self.flags)
    }
}

/// A decoded multipart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartRequest {
    pub header: ProtocolHeader,
    pub kind: MultipartType,
    pub flags: u16,
}

impl MultipartRequest {
    pub fn new(version: u8, xid: u32, kind: MultipartType) -> Self {
        Self {
            header: ProtocolHeader::new(version, MessageType::MultipartRequest, xid),
            kind,
            flags: 0,
        }
    }

    /// Parse the request envelope from a whole message, header included.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (header, kind, flags) = decode_envelope(bytes, "multipart request")?;
        Ok(Self {
            header,
            kind,
            flags,
        })
    }

    pub fn encode(&self, segment: &mut Segment) -> std::result::Result<(), EncodeError> {
        encode_envelope(segment, &self.header, self.kind, self.flags)
    }
}

/// A decoded multipart reply with its raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartReply {
    pub header: ProtocolHeader,
    pub kind: MultipartType,
    pub flags: u16,
    pub body: Bytes,
}

impl MultipartReply {
    pub fn decode(message: &Message) -> Result<Self> {
        let (header, kind, flags) = decode_envelope(&message.bytes, "multipart reply")?;
        Ok(Self {
            header,
            kind,
            flags,
            body: message.bytes.slice(MULTIPART_HEADER_LEN..),
        })
    }

    /// Whether more parts of this reply follow.
    pub fn has_more(&self) -> bool {
        self.flags & MULTIPART_REPLY_MORE != 0
    }
}

fn encode_envelope(
    segment: &mut Segment,
    header: &ProtocolHeader,
    kind: MultipartType,
    flags: u16,
) -> std::result::Result<(), EncodeError> {
    header.encode(segment)?;
    segment.put_u16(kind.into())?;
    segment.put_u16(flags)?;
    segment.put_zeros(PAD_LEN)
}

fn decode_envelope(
    bytes: &[u8],
    what: &'static str,
) -> Result<(ProtocolHeader, MultipartType, u16)> {
    if bytes.len() < MULTIPART_HEADER_LEN {
        return Err(WireError::Truncated {
            what,
            needed: MULTIPART_HEADER_LEN,
            have: bytes.len(),
        });
    }
    let header = ProtocolHeader::decode(bytes)?;
    let mut rest = &bytes[HEADER_LEN..];
    let kind = MultipartType::from(rest.get_u16());
    let flags = rest.get_u16();
    Ok((header, kind, flags))
}
