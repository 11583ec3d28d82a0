//! Reply construction.
//!
//! Every message is encoded the same way: allocate a list, open its tail
//! segment to full capacity, write the header with a zero length, write the
//! body, then back-patch the length with the number of bytes written and
//! shrink the segment's declared payload to match. The header precedes the
//! body on the wire, so its length can only be fixed up afterwards.

use ofagent_wire::{
    patch_length, BufferAllocator, BufferList, DescriptorRecord, EncodeError, MessageType,
    MultipartReplyEnvelope, MultipartRequest, MultipartType, ProtocolHeader, Segment,
};
use tracing::debug;

use crate::error::ProtocolError;
use crate::session::Session;

/// Encodes replies into buffer lists drawn from an allocator.
#[derive(Debug, Clone)]
pub struct ReplyBuilder<A> {
    allocator: A,
}

impl<A: BufferAllocator> ReplyBuilder<A> {
    pub fn new(allocator: A) -> Self {
        Self { allocator }
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// Build a description reply echoing `xid`.
    ///
    /// On any error the partially written list is dropped here, which
    /// returns it to the allocator; nothing is ever handed back half-built.
    pub fn build<S>(
        &self,
        session: &S,
        record: &DescriptorRecord,
        xid: u32,
    ) -> Result<BufferList, ProtocolError>
    where
        S: Session + ?Sized,
    {
        let mut list = self
            .allocator
            .alloc_list()
            .ok_or(ProtocolError::ResourceExhausted)?;
        let segment = list
            .tail_segment(&self.allocator)
            .ok_or(ProtocolError::ResourceExhausted)?;

        let envelope =
            MultipartReplyEnvelope::new(session.negotiated_version(), xid, MultipartType::Desc);

        segment.set_plen(segment.capacity());
        envelope.encode(segment)?;
        record.encode(segment)?;

        let length = segment.encoded_length()?;
        patch_length(segment, length)?;
        segment.reset_plen();

        debug!(xid, length, "built desc reply");
        Ok(list)
    }

    /// Build a plain message: header followed by an opaque body.
    pub fn build_message(
        &self,
        version: u8,
        message_type: MessageType,
        xid: u32,
        body: &[u8],
    ) -> Result<BufferList, ProtocolError> {
        let header = ProtocolHeader::new(version, message_type, xid);
        self.build_with(|segment| {
            header.encode(segment)?;
            segment.put_slice(body)
        })
    }

    /// Build a description request, as a controller would send it.
    pub fn build_desc_request(&self, version: u8, xid: u32) -> Result<BufferList, ProtocolError> {
        let request = MultipartRequest::new(version, xid, MultipartType::Desc);
        self.build_with(|segment| request.encode(segment))
    }

    fn build_with<F>(&self, encode: F) -> Result<BufferList, ProtocolError>
    where
        F: FnOnce(&mut Segment) -> Result<(), EncodeError>,
    {
        let mut list = self
            .allocator
            .alloc_list()
            .ok_or(ProtocolError::ResourceExhausted)?;
        let segment = list
            .tail_segment(&self.allocator)
            .ok_or(ProtocolError::ResourceExhausted)?;

        segment.set_plen(segment.capacity());
        encode(segment)?;

        let length = segment.encoded_length()?;
        patch_length(segment, length)?;
        segment.reset_plen();
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use ofagent_wire::{
        PoolConfig, SegmentPool, DESC_BODY_LEN, MULTIPART_HEADER_LEN, OFP_VERSION_1_3,
    };

    use super::*;
    use crate::error::SendError;

    struct FixedSession {
        version: u8,
    }

    impl Session for FixedSession {
        fn negotiated_version(&self) -> u8 {
            self.version
        }

        fn bound_device_id(&self) -> u64 {
            1
        }

        fn send_packet_list(&mut self, _list: &BufferList) -> Result<(), SendError> {
            Ok(())
        }
    }

    struct NoLists;

    impl BufferAllocator for NoLists {
        fn alloc_list(&self) -> Option<BufferList> {
            None
        }

        fn alloc_segment(&self) -> Option<Segment> {
            None
        }
    }

    fn acme() -> DescriptorRecord {
        DescriptorRecord {
            manufacturer: "ACME".to_string(),
            hardware_version: "v1".to_string(),
            software_version: "v2".to_string(),
            serial_number: "SN1".to_string(),
            datapath_description: "sw0".to_string(),
        }
    }

    fn pool(segment_size: usize) -> SegmentPool {
        SegmentPool::new(PoolConfig {
            segment_size,
            max_outstanding_segments: None,
        })
    }

    const SESSION: FixedSession = FixedSession {
        version: OFP_VERSION_1_3,
    };

    #[test]
    fn desc_reply_frame_layout() {
        let builder = ReplyBuilder::new(pool(4096));
        let list = builder.build(&SESSION, &acme(), 0x1234).unwrap();
        let bytes = list.to_vec();

        let expected_len = MULTIPART_HEADER_LEN + DESC_BODY_LEN;
        assert_eq!(bytes.len(), expected_len);
        assert_eq!(bytes[0], OFP_VERSION_1_3);
        assert_eq!(bytes[1], 19);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]) as usize, expected_len);
        assert_eq!(&bytes[4..8], &0x1234u32.to_be_bytes());
        assert_eq!(&bytes[8..16], &[0; 8]);
        assert_eq!(&bytes[16..21], b"ACME\0");
        assert_eq!(&bytes[16 + 768..16 + 772], b"SN1\0");
    }

    #[test]
    fn declared_payload_matches_written_length() {
        let builder = ReplyBuilder::new(pool(4096));
        let list = builder.build(&SESSION, &acme(), 1).unwrap();
        let segment = &list.segments()[0];
        assert_eq!(segment.plen(), segment.len());
        assert_eq!(list.payload_len(), 1072);
    }

    #[test]
    fn version_comes_from_session() {
        let builder = ReplyBuilder::new(pool(4096));
        let session = FixedSession { version: 0x05 };
        let list = builder.build(&session, &acme(), 1).unwrap();
        assert_eq!(list.to_vec()[0], 0x05);
    }

    #[test]
    fn re_encoding_differs_only_in_xid() {
        let builder = ReplyBuilder::new(pool(4096));
        let mut first = builder.build(&SESSION, &acme(), 1).unwrap().to_vec();
        let mut second = builder.build(&SESSION, &acme(), 2).unwrap().to_vec();
        assert_ne!(first, second);

        first[4..8].fill(0);
        second[4..8].fill(0);
        assert_eq!(first, second);
    }

    #[test]
    fn missing_list_is_resource_exhausted() {
        let builder = ReplyBuilder::new(NoLists);
        let err = builder.build(&SESSION, &acme(), 1).unwrap_err();
        assert!(matches!(err, ProtocolError::ResourceExhausted));
    }

    #[test]
    fn missing_segment_releases_the_list() {
        let pool = SegmentPool::new(PoolConfig {
            segment_size: 4096,
            max_outstanding_segments: Some(0),
        });
        let builder = ReplyBuilder::new(pool.clone());

        let err = builder.build(&SESSION, &acme(), 1).unwrap_err();
        assert!(matches!(err, ProtocolError::ResourceExhausted));
        assert_eq!(pool.stats().lists_allocated(), 1);
        assert_eq!(pool.stats().lists_freed(), 1);
    }

    #[test]
    fn unallocatable_segment_size_is_resource_exhausted() {
        let pool = pool(usize::MAX);
        let builder = ReplyBuilder::new(pool.clone());

        let err = builder.build(&SESSION, &acme(), 1).unwrap_err();
        assert!(matches!(err, ProtocolError::ResourceExhausted));
        assert_eq!(pool.stats().outstanding_lists(), 0);
        assert_eq!(pool.stats().outstanding_segments(), 0);
    }

    #[test]
    fn envelope_overflow_is_an_encode_error() {
        let pool = pool(12);
        let builder = ReplyBuilder::new(pool.clone());

        let err = builder.build(&SESSION, &acme(), 1).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Encode(EncodeError::OutOfSpace { .. })
        ));
        assert_eq!(pool.stats().outstanding_lists(), 0);
        assert_eq!(pool.stats().outstanding_segments(), 0);
    }

    #[test]
    fn body_overflow_is_an_encode_error() {
        let pool = pool(MULTIPART_HEADER_LEN + 100);
        let builder = ReplyBuilder::new(pool.clone());

        let err = builder.build(&SESSION, &acme(), 1).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Encode(EncodeError::OutOfSpace {
                needed: DESC_BODY_LEN,
                available: 100
            })
        ));
        assert_eq!(pool.stats().lists_freed(), 1);
        assert_eq!(pool.stats().segments_freed(), 1);
    }

    #[test]
    fn plain_message_length_is_patched() {
        let builder = ReplyBuilder::new(pool(128));
        let bytes = builder
            .build_message(OFP_VERSION_1_3, MessageType::EchoReply, 9, b"payload")
            .unwrap()
            .to_vec();
        assert_eq!(bytes.len(), 15);
        assert_eq!(bytes[1], 3);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 15);
        assert_eq!(&bytes[8..], b"payload");
    }

    #[test]
    fn desc_request_is_a_bare_envelope() {
        let builder = ReplyBuilder::new(pool(128));
        let bytes = builder.build_desc_request(OFP_VERSION_1_3, 3).unwrap().to_vec();
        let request = MultipartRequest::decode(&bytes).unwrap();
        assert_eq!(request.kind, MultipartType::Desc);
        assert_eq!(request.header.length as usize, MULTIPART_HEADER_LEN);
        assert_eq!(request.header.message_type, MessageType::MultipartRequest);
    }
}
