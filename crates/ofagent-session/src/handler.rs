use ofagent_wire::{
    BufferAllocator, MessageType, MultipartRequest, MultipartType, ProtocolHeader,
    MULTIPART_HEADER_LEN,
};
use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::reply::ReplyBuilder;
use crate::session::Session;
use crate::sink;
use crate::store::DeviceStore;

/// Answers description requests for the datapath bound to a session.
#[derive(Debug, Clone)]
pub struct DescHandler<D, A> {
    store: D,
    builder: ReplyBuilder<A>,
}

impl<D: DeviceStore, A: BufferAllocator> DescHandler<D, A> {
    pub fn new(store: D, allocator: A) -> Self {
        Self {
            store,
            builder: ReplyBuilder::new(allocator),
        }
    }

    pub fn builder(&self) -> &ReplyBuilder<A> {
        &self.builder
    }

    /// Handle one description request.
    ///
    /// `request` is the whole inbound message and `header` its decoded
    /// header. The reply echoes the request's xid. Failures are logged here,
    /// once, with the stage that failed; the session stays usable either way.
    pub fn handle<S>(
        &self,
        session: &mut S,
        request: &[u8],
        header: &ProtocolHeader,
    ) -> Result<(), ProtocolError>
    where
        S: Session + ?Sized,
    {
        self.exchange(session, request, header).inspect_err(|err| {
            warn!(
                xid = header.xid,
                stage = err.stage(),
                error = %err,
                "desc reply failed"
            );
        })
    }

    fn exchange<S>(
        &self,
        session: &mut S,
        request: &[u8],
        header: &ProtocolHeader,
    ) -> Result<(), ProtocolError>
    where
        S: Session + ?Sized,
    {
        validate_request(request, header)?;

        let device_id = session.bound_device_id();
        let record = self.store.get_descriptor(device_id)?;

        let list = self.builder.build(session, &record, header.xid)?;
        let sent = sink::send(session, &list);
        list.release();
        sent?;

        debug!(xid = header.xid, device_id, "desc reply sent");
        Ok(())
    }
}

fn validate_request(request: &[u8], header: &ProtocolHeader) -> Result<(), ProtocolError> {
    if request.is_empty() {
        return Err(ProtocolError::InvalidArgument("empty request".to_string()));
    }
    if header.message_type != MessageType::MultipartRequest {
        return Err(ProtocolError::InvalidArgument(format!(
            "expected multipart request, got {:?}",
            header.message_type
        )));
    }

    let declared = usize::from(header.length);
    if declared < MULTIPART_HEADER_LEN || declared > request.len() {
        return Err(ProtocolError::InvalidArgument(format!(
            "declared length {declared} does not fit request of {} bytes",
            request.len()
        )));
    }

    let decoded = MultipartRequest::decode(request)
        .map_err(|err| ProtocolError::InvalidArgument(err.to_string()))?;
    if decoded.header.xid != header.xid {
        return Err(ProtocolError::InvalidArgument(format!(
            "header xid {:#x} does not match request xid {:#x}",
            header.xid, decoded.header.xid
        )));
    }
    if decoded.kind != MultipartType::Desc {
        return Err(ProtocolError::InvalidArgument(format!(
            "expected desc request, got {:?}",
            decoded.kind
        )));
    }
    Ok(())
}
