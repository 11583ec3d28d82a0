//! Local stream transport for the ofagent control channel.
//!
//! The controller side of a session talks to the agent over a connected
//! byte stream. This crate provides that stream ([`AgentStream`]) and the
//! Unix domain socket listener/connector used to establish it. Everything
//! above (message framing, sessions) builds on [`AgentStream`].

pub mod error;

#[cfg(unix)]
pub mod stream;
#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
#[cfg(unix)]
pub use stream::AgentStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
