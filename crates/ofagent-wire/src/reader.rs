use std::io::{ErrorKind, Read};
use std::time::Duration;

use bytes::BytesMut;

use crate::codec::{decode_message, Message};
use crate::error::{Result, WireError};

/// Default upper bound on an inbound message: what a 16-bit length can say.
pub const DEFAULT_MAX_MESSAGE: usize = u16::MAX as usize;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Configuration for [`MessageReader`].
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Largest accepted declared message length. Default: 65535.
    pub max_message_size: usize,
    /// Read timeout applied to socket-backed readers.
    pub read_timeout: Option<Duration>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
            read_timeout: None,
        }
    }
}

/// Reads complete messages from any `Read` stream.
///
/// Partial reads are buffered internally; callers only ever see whole
/// messages.
pub struct MessageReader<T> {
    inner: T,
    buf: BytesMut,
    config: ReaderConfig,
}

impl<T: Read> MessageReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ReaderConfig::default())
    }

    pub fn with_config(inner: T, config: ReaderConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(WireError::ConnectionClosed)` at end of stream.
    pub fn read_message(&mut self) -> Result<Message> {
        loop {
            if let Some(message) = decode_message(&mut self.buf, self.config.max_message_size)? {
                return Ok(message);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WireError::Io(err)),
            };

            if read == 0 {
                return Err(WireError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
}

#[cfg(unix)]
impl MessageReader<ofagent_transport::AgentStream> {
    /// Reader over a control stream with the configured read timeout applied.
    pub fn with_config_stream(
        inner: ofagent_transport::AgentStream,
        config: ReaderConfig,
    ) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_wire_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(unix)]
fn transport_to_wire_error(err: ofagent_transport::TransportError) -> WireError {
    match err {
        ofagent_transport::TransportError::Io(io) => WireError::Io(io),
        other => WireError::Io(std::io::Error::other(other.to_string())),
    }
}
