//! OpenFlow message framing for the agent control path.
//!
//! Outgoing messages are encoded into fixed-capacity [`Segment`]s chained
//! in a [`BufferList`]. Every message starts with an 8-byte header:
//! - 1-byte protocol version
//! - 1-byte message type
//! - 2-byte big-endian total length, back-patched once the body is written
//! - 4-byte big-endian transaction id
//!
//! Inbound messages are read whole by [`MessageReader`].

pub mod buffer;
pub mod codec;
pub mod desc;
pub mod error;
pub mod multipart;
pub mod reader;

pub use buffer::{
    BufferAllocator, BufferList, PoolConfig, PoolStats, Segment, SegmentPool, DEFAULT_SEGMENT_SIZE,
};
pub use codec::{
    decode_message, patch_length, Message, MessageType, ProtocolHeader, HEADER_LEN,
    LENGTH_OFFSET, OFP_VERSION_1_0, OFP_VERSION_1_3,
};
pub use desc::{DescriptorRecord, DESC_BODY_LEN, DESC_STR_LEN, SERIAL_NUM_LEN};
pub use error::{EncodeError, Result, WireError};
pub use multipart::{
    MultipartReply, MultipartReplyEnvelope, MultipartRequest, MultipartType,
    MULTIPART_HEADER_LEN, MULTIPART_REPLY_MORE,
};
pub use reader::{MessageReader, ReaderConfig, DEFAULT_MAX_MESSAGE};
