use std::path::Path;
use std::time::Duration;

use ofagent_transport::{AgentStream, UnixDomainSocket};
use ofagent_wire::{
    BufferAllocator, MessageReader, PoolConfig, ReaderConfig, SegmentPool, WireError,
    DEFAULT_MAX_MESSAGE, OFP_VERSION_1_3,
};
use tracing::{debug, info};

use crate::dispatch::{Dispatch, Dispatcher};
use crate::error::{Result, SessionError};
use crate::hello::{exchange_hello, HelloConfig};
use crate::session::{Session, StreamSession};
use crate::store::DeviceStore;

/// Agent-side settings for serving controller connections.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Datapath every accepted session is bound to.
    pub datapath_id: u64,
    /// Highest protocol version offered in HELLO.
    pub version: u8,
    pub pool: PoolConfig,
    /// Deadline for the controller's HELLO.
    pub hello_timeout: Duration,
    pub max_message_size: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            datapath_id: 1,
            version: OFP_VERSION_1_3,
            pool: PoolConfig::default(),
            hello_timeout: Duration::from_secs(5),
            max_message_size: DEFAULT_MAX_MESSAGE,
        }
    }
}

impl AgentConfig {
    fn hello(&self) -> HelloConfig {
        HelloConfig {
            version: self.version,
            timeout: self.hello_timeout,
        }
    }
}

/// Counters for one served connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub negotiated_version: u8,
    pub messages: usize,
    pub described: usize,
    pub echoed: usize,
    pub ignored: usize,
    pub failed: usize,
}

/// Listens for controller connections on a Unix domain socket.
pub struct AgentListener<D> {
    socket: UnixDomainSocket,
    dispatcher: Dispatcher<D, SegmentPool>,
    config: AgentConfig,
}

impl<D: DeviceStore> AgentListener<D> {
    /// Bind to a Unix domain socket path.
    pub fn bind(path: impl AsRef<Path>, store: D, config: AgentConfig) -> Result<Self> {
        let socket = UnixDomainSocket::bind(path)?;
        let pool = SegmentPool::new(config.pool.clone());
        info!(
            path = %socket.path().display(),
            datapath_id = config.datapath_id,
            "agent listening"
        );
        Ok(Self {
            socket,
            dispatcher: Dispatcher::new(store, pool),
            config,
        })
    }

    /// Accept the next controller connection without serving it.
    pub fn accept(&self) -> Result<AgentStream> {
        let stream = self.socket.accept()?;
        match stream.peer_credentials() {
            Some((uid, gid, pid)) => info!(uid, gid, pid, "controller connected"),
            None => info!("controller connected"),
        }
        Ok(stream)
    }

    /// Accept one connection and serve it until the controller disconnects.
    pub fn serve_one(&self) -> Result<ConnectionSummary> {
        let stream = self.accept()?;
        serve_connection(stream, &self.dispatcher, &self.config)
    }

    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn pool(&self) -> &SegmentPool {
        self.dispatcher.allocator()
    }
}

/// Run HELLO on `stream`, then dispatch inbound messages until EOF.
///
/// Failed exchanges are counted and the connection keeps going; only
/// transport and framing errors end it early.
pub fn serve_connection<D, A>(
    stream: AgentStream,
    dispatcher: &Dispatcher<D, A>,
    config: &AgentConfig,
) -> Result<ConnectionSummary>
where
    D: DeviceStore,
    A: BufferAllocator,
{
    let reader_config = ReaderConfig {
        max_message_size: config.max_message_size,
        read_timeout: Some(config.hello_timeout),
    };
    let mut reader = MessageReader::with_config_stream(stream.try_clone()?, reader_config)?;
    let mut session = StreamSession::new(stream, config.version, config.datapath_id);

    let outcome = exchange_hello(
        &mut reader,
        &mut session,
        dispatcher.handler().builder(),
        &config.hello(),
    )?;
    session.set_negotiated_version(outcome.negotiated_version);
    reader.get_ref().set_read_timeout(None)?;

    let mut summary = ConnectionSummary {
        negotiated_version: session.negotiated_version(),
        ..ConnectionSummary::default()
    };

    loop {
        let message = match reader.read_message() {
            Ok(message) => message,
            Err(WireError::ConnectionClosed) => break,
            Err(err) => return Err(SessionError::Wire(err)),
        };
        summary.messages += 1;

        match dispatcher.dispatch(&mut session, &message) {
            Ok(Dispatch::Described) => summary.described += 1,
            Ok(Dispatch::Echoed) => summary.echoed += 1,
            Ok(Dispatch::Ignored(_)) => summary.ignored += 1,
            Err(_) => summary.failed += 1,
        }
    }

    debug!(?summary, "controller disconnected");
    Ok(summary)
}
