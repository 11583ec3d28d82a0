use ofagent_wire::{BufferAllocator, Message, MessageType, MultipartRequest, MultipartType};
use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::handler::DescHandler;
use crate::session::Session;
use crate::sink;
use crate::store::DeviceStore;

/// What the dispatcher did with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A description reply was sent.
    Described,
    /// An echo reply was sent.
    Echoed,
    /// The message needs no answer from this agent.
    Ignored(MessageType),
}

/// Routes inbound messages on an established session.
#[derive(Debug, Clone)]
pub struct Dispatcher<D, A> {
    handler: DescHandler<D, A>,
}

impl<D: DeviceStore, A: BufferAllocator> Dispatcher<D, A> {
    pub fn new(store: D, allocator: A) -> Self {
        Self {
            handler: DescHandler::new(store, allocator),
        }
    }

    pub fn handler(&self) -> &DescHandler<D, A> {
        &self.handler
    }

    pub fn allocator(&self) -> &A {
        self.handler.builder().allocator()
    }

    pub fn dispatch<S>(&self, session: &mut S, message: &Message) -> Result<Dispatch, ProtocolError>
    where
        S: Session + ?Sized,
    {
        let header = &message.header;
        match header.message_type {
            MessageType::MultipartRequest => {
                // Malformed envelopes still go to the handler, which rejects them.
                if let Ok(request) = MultipartRequest::decode(&message.bytes) {
                    if request.kind != MultipartType::Desc {
                        debug!(xid = header.xid, kind = ?request.kind, "ignoring multipart request");
                        return Ok(Dispatch::Ignored(header.message_type));
                    }
                }
                self.handler.handle(session, &message.bytes, header)?;
                Ok(Dispatch::Described)
            }
            MessageType::EchoRequest => {
                self.echo(session, message).inspect_err(|err| {
                    warn!(
                        xid = header.xid,
                        stage = err.stage(),
                        error = %err,
                        "echo reply failed"
                    );
                })?;
                Ok(Dispatch::Echoed)
            }
            other => {
                debug!(xid = header.xid, message_type = ?other, "ignoring message");
                Ok(Dispatch::Ignored(other))
            }
        }
    }

    fn echo<S>(&self, session: &mut S, message: &Message) -> Result<(), ProtocolError>
    where
        S: Session + ?Sized,
    {
        let list = self.handler.builder().build_message(
            session.negotiated_version(),
            MessageType::EchoReply,
            message.header.xid,
            message.body(),
        )?;
        let sent = sink::send(session, &list);
        list.release();
        sent?;
        Ok(())
    }
}
