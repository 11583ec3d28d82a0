//! Agent-side session handling.
//!
//! Answers controller description requests: look up the datapath's
//! descriptor, encode a multipart reply into pooled buffers, and hand it to
//! the session for transmission. Around that sit HELLO negotiation, a
//! message dispatcher, and a Unix socket listener/connector pair.

#[cfg(unix)]
pub mod connector;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod hello;
#[cfg(unix)]
pub mod listener;
pub mod reply;
pub mod session;
pub mod sink;
pub mod store;

#[cfg(unix)]
pub use connector::{connect, ConnectConfig, ControllerConnection};
pub use dispatch::{Dispatch, Dispatcher};
pub use error::{LookupError, ProtocolError, Result, SendError, SessionError};
pub use handler::DescHandler;
pub use hello::{exchange_hello, negotiate, HelloConfig, HelloOutcome, MIN_SUPPORTED_VERSION};
#[cfg(unix)]
pub use listener::{serve_connection, AgentConfig, AgentListener, ConnectionSummary};
pub use reply::ReplyBuilder;
pub use session::{Session, StreamSession};
pub use sink::send;
pub use store::{DeviceStore, MemoryDeviceStore};
