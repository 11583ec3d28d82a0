use bytes::{Buf, Bytes, BytesMut};

use crate::buffer::Segment;
use crate::error::{EncodeError, Result, WireError};

/// Header: version (1) + type (1) + length (2) + xid (4) = 8 bytes.
pub const HEADER_LEN: usize = 8;

/// Offset of the 16-bit length field within the header.
pub const LENGTH_OFFSET: usize = 2;

/// Wire version byte of OpenFlow 1.0.
pub const OFP_VERSION_1_0: u8 = 0x01;

/// Wire version byte of OpenFlow 1.3.
pub const OFP_VERSION_1_3: u8 = 0x04;

/// Message types the agent understands. Anything else is kept as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Hello,
    Error,
    EchoRequest,
    EchoReply,
    MultipartRequest,
    MultipartReply,
    Unknown(u8),
}

impl From<u8> for MessageType {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Hello,
            1 => Self::Error,
            2 => Self::EchoRequest,
            3 => Self::EchoReply,
            18 => Self::MultipartRequest,
            19 => Self::MultipartReply,
            other => Self::Unknown(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Hello => 0,
            MessageType::Error => 1,
            MessageType::EchoRequest => 2,
            MessageType::EchoReply => 3,
            MessageType::MultipartRequest => 18,
            MessageType::MultipartReply => 19,
            MessageType::Unknown(code) => code,
        }
    }
}

/// The common header prefixing every message.
///
/// `length` is the total size of the message including this header. When
/// encoding, it is written as a placeholder and fixed up with
/// [`patch_length`] once the body has been serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolHeader {
    pub version: u8,
    pub message_type: MessageType,
    pub length: u16,
    pub xid: u32,
}

impl ProtocolHeader {
    /// Header with a zero length placeholder.
    pub fn new(version: u8, message_type: MessageType, xid: u32) -> Self {
        Self {
            version,
            message_type,
            length: 0,
            xid,
        }
    }

    /// Append the header at the segment's cursor.
    pub fn encode(&self, segment: &mut Segment) -> std::result::Result<(), EncodeError> {
        segment.put_u8(self.version)?;
        segment.put_u8(self.message_type.into())?;
        segment.put_u16(self.length)?;
        segment.put_u32(self.xid)
    }

    /// Parse a header from the first [`HEADER_LEN`] bytes of `src`.
    pub fn decode(mut src: &[u8]) -> Result<Self> {
        if src.len() < HEADER_LEN {
            return Err(WireError::Truncated {
                what: "header",
                needed: HEADER_LEN,
                have: src.len(),
            });
        }
        Ok(Self {
            version: src.get_u8(),
            message_type: MessageType::from(src.get_u8()),
            length: src.get_u16(),
            xid: src.get_u32(),
        })
    }
}

/// Back-patch the header length of the message starting at offset 0.
pub fn patch_length(segment: &mut Segment, length: u16) -> std::result::Result<(), EncodeError> {
    segment.patch_u16(LENGTH_OFFSET, length)
}

/// One complete inbound message.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: ProtocolHeader,
    /// The whole message, header included.
    pub bytes: Bytes,
}

impl Message {
    /// Everything after the header.
    pub fn body(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }
}

/// Decode one message from the front of `src`.
///
/// Returns `Ok(None)` until the buffer holds a complete message. On success
/// the message bytes are consumed from the buffer.
pub fn decode_message(src: &mut BytesMut, max_message: usize) -> Result<Option<Message>> {
    if src.len() < HEADER_LEN {
        return Ok(None);
    }

    let header = ProtocolHeader::decode(&src[..HEADER_LEN])?;
    let length = usize::from(header.length);
    if length < HEADER_LEN {
        return Err(WireError::BadLength(header.length));
    }
    if length > max_message {
        return Err(WireError::MessageTooLarge {
            size: length,
            max: max_message,
        });
    }
    if src.len() < length {
        return Ok(None);
    }

    let bytes = src.split_to(length).freeze();
    Ok(Some(Message { header, bytes }))
}
