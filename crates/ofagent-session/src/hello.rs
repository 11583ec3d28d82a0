//! HELLO version negotiation.
//!
//! Both ends open with a HELLO carrying the highest version they speak and
//! settle on the lower of the two. Nothing else may arrive before the peer's
//! HELLO.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use ofagent_wire::{
    BufferAllocator, MessageReader, MessageType, WireError, OFP_VERSION_1_0, OFP_VERSION_1_3,
};
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::reply::ReplyBuilder;
use crate::session::Session;
use crate::sink;

/// Lowest version this agent will negotiate down to.
pub const MIN_SUPPORTED_VERSION: u8 = OFP_VERSION_1_0;

/// Configuration for HELLO negotiation.
#[derive(Debug, Clone)]
pub struct HelloConfig {
    /// Highest version offered to the peer.
    pub version: u8,
    /// Deadline for receiving the peer's HELLO.
    pub timeout: Duration,
}

impl Default for HelloConfig {
    fn default() -> Self {
        Self {
            version: OFP_VERSION_1_3,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Versions seen during a completed HELLO exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelloOutcome {
    pub local_version: u8,
    pub remote_version: u8,
    pub negotiated_version: u8,
}

/// Send our HELLO on `session`, then wait for the peer's on `reader`.
///
/// The caller applies [`HelloOutcome::negotiated_version`] to the session.
/// A socket-backed reader needs a read timeout for `config.timeout` to be
/// enforced while blocked.
pub fn exchange_hello<R, S, A>(
    reader: &mut MessageReader<R>,
    session: &mut S,
    builder: &ReplyBuilder<A>,
    config: &HelloConfig,
) -> Result<HelloOutcome>
where
    R: Read,
    S: Session + ?Sized,
    A: BufferAllocator,
{
    if config.version < MIN_SUPPORTED_VERSION {
        return Err(SessionError::HandshakeFailed(format!(
            "local version {:#04x} below minimum {:#04x}",
            config.version, MIN_SUPPORTED_VERSION
        )));
    }

    let hello = builder.build_message(config.version, MessageType::Hello, 0, &[])?;
    let sent = sink::send(session, &hello);
    hello.release();
    sent.map_err(|err| SessionError::Disconnected(format!("sending hello: {err}")))?;

    let deadline = Instant::now() + config.timeout;
    let remote_version = recv_hello(reader, deadline, config.timeout)?;
    if remote_version < MIN_SUPPORTED_VERSION {
        return Err(SessionError::HandshakeFailed(format!(
            "peer version {:#04x} below minimum {:#04x}",
            remote_version, MIN_SUPPORTED_VERSION
        )));
    }

    let outcome = HelloOutcome {
        local_version: config.version,
        remote_version,
        negotiated_version: negotiate(config.version, remote_version),
    };
    debug!(
        local = outcome.local_version,
        remote = outcome.remote_version,
        negotiated = outcome.negotiated_version,
        "hello complete"
    );
    Ok(outcome)
}

/// The version both ends can speak.
pub fn negotiate(local: u8, remote: u8) -> u8 {
    local.min(remote)
}

fn recv_hello<R: Read>(
    reader: &mut MessageReader<R>,
    deadline: Instant,
    timeout: Duration,
) -> Result<u8> {
    loop {
        if Instant::now() >= deadline {
            return Err(SessionError::Timeout(timeout));
        }

        match reader.read_message() {
            Ok(message) => {
                if message.header.message_type != MessageType::Hello {
                    return Err(SessionError::HandshakeFailed(format!(
                        "expected HELLO, got {:?}",
                        message.header.message_type
                    )));
                }
                return Ok(message.header.version);
            }
            Err(WireError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(WireError::ConnectionClosed) => {
                return Err(SessionError::Disconnected(
                    "connection closed during hello".to_string(),
                ));
            }
            Err(err) => return Err(SessionError::Wire(err)),
        }
    }
}
