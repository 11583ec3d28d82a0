use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use ofagent_transport::{AgentStream, UnixDomainSocket};
use ofagent_wire::{
    DescriptorRecord, Message, MessageReader, MessageType, MultipartReply, MultipartType,
    ReaderConfig, SegmentPool, WireError, DEFAULT_MAX_MESSAGE, HEADER_LEN, OFP_VERSION_1_3,
};
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::hello::{exchange_hello, HelloConfig, HelloOutcome};
use crate::reply::ReplyBuilder;
use crate::session::{Session, StreamSession};
use crate::sink;

/// Controller-side connection settings.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Highest protocol version offered in HELLO.
    pub version: u8,
    /// Deadline for HELLO and for each reply.
    pub timeout: Duration,
    pub max_message_size: usize,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            version: OFP_VERSION_1_3,
            timeout: Duration::from_secs(5),
            max_message_size: DEFAULT_MAX_MESSAGE,
        }
    }
}

/// A controller's end of a session, used to query an agent.
pub struct ControllerConnection {
    reader: MessageReader<AgentStream>,
    session: StreamSession<AgentStream>,
    builder: ReplyBuilder<SegmentPool>,
    hello: HelloOutcome,
    timeout: Duration,
    next_xid: u32,
}

/// Connect to a listening agent and complete HELLO.
pub fn connect(path: impl AsRef<Path>, config: &ConnectConfig) -> Result<ControllerConnection> {
    let stream = UnixDomainSocket::connect(path)?;
    stream.set_write_timeout(Some(config.timeout))?;

    let reader_config = ReaderConfig {
        max_message_size: config.max_message_size,
        read_timeout: Some(config.timeout),
    };
    let mut reader = MessageReader::with_config_stream(stream.try_clone()?, reader_config)?;
    let mut session = StreamSession::new(stream, config.version, 0);
    let builder = ReplyBuilder::new(SegmentPool::default());

    let hello_config = HelloConfig {
        version: config.version,
        timeout: config.timeout,
    };
    let hello = exchange_hello(&mut reader, &mut session, &builder, &hello_config)?;
    session.set_negotiated_version(hello.negotiated_version);

    Ok(ControllerConnection {
        reader,
        session,
        builder,
        hello,
        timeout: config.timeout,
        next_xid: 1,
    })
}

impl ControllerConnection {
    pub fn negotiated_version(&self) -> u8 {
        self.session.negotiated_version()
    }

    pub fn hello_outcome(&self) -> &HelloOutcome {
        &self.hello
    }

    /// Send a description request without waiting; returns its xid.
    pub fn send_desc_request(&mut self) -> Result<u32> {
        let xid = self.take_xid();
        let list = self
            .builder
            .build_desc_request(self.session.negotiated_version(), xid)?;
        let sent = sink::send(&mut self.session, &list);
        list.release();
        sent.map_err(|err| SessionError::Disconnected(err.to_string()))?;
        Ok(xid)
    }

    /// Request the agent's description and return the raw reply.
    pub fn request_desc_raw(&mut self) -> Result<MultipartReply> {
        let xid = self.send_desc_request()?;
        let message = self.recv_reply(xid, MessageType::MultipartReply)?;
        let reply = MultipartReply::decode(&message)?;
        if reply.kind != MultipartType::Desc {
            return Err(SessionError::UnexpectedReply(format!(
                "expected desc reply, got {:?}",
                reply.kind
            )));
        }
        // A description always fits one part.
        if reply.has_more() {
            return Err(SessionError::UnexpectedReply(format!(
                "desc reply for xid {} has more parts pending",
                reply.header.xid
            )));
        }
        Ok(reply)
    }

    /// Request and decode the agent's description.
    pub fn request_desc(&mut self) -> Result<DescriptorRecord> {
        let reply = self.request_desc_raw()?;
        Ok(DescriptorRecord::decode(&reply.body)?)
    }

    /// Round-trip an echo request; returns the echoed body.
    pub fn echo(&mut self, payload: &[u8]) -> Result<Bytes> {
        let xid = self.take_xid();
        let list = self.builder.build_message(
            self.session.negotiated_version(),
            MessageType::EchoRequest,
            xid,
            payload,
        )?;
        let sent = sink::send(&mut self.session, &list);
        list.release();
        sent.map_err(|err| SessionError::Disconnected(err.to_string()))?;

        let message = self.recv_reply(xid, MessageType::EchoReply)?;
        Ok(message.bytes.slice(HEADER_LEN..))
    }

    fn take_xid(&mut self) -> u32 {
        let xid = self.next_xid;
        self.next_xid = self.next_xid.wrapping_add(1);
        xid
    }

    fn recv_reply(&mut self, xid: u32, expected: MessageType) -> Result<Message> {
        loop {
            let message = match self.reader.read_message() {
                Ok(message) => message,
                Err(WireError::Io(err))
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(SessionError::Timeout(self.timeout));
                }
                Err(WireError::ConnectionClosed) => {
                    return Err(SessionError::Disconnected(
                        "agent closed the connection".to_string(),
                    ));
                }
                Err(err) => return Err(SessionError::Wire(err)),
            };

            let header = message.header;
            if header.xid != xid {
                debug!(xid = header.xid, expected = xid, "skipping stale message");
                continue;
            }
            if header.message_type != expected {
                return Err(SessionError::UnexpectedReply(format!(
                    "expected {:?} for xid {xid}, got {:?}",
                    expected, header.message_type
                )));
            }
            return Ok(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn sock_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ofac-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    #[test]
    fn connect_to_missing_socket_is_transport_error() {
        let dir = sock_dir("missing");
        let result = connect(dir.join("absent.sock"), &ConnectConfig::default());
        assert!(matches!(result, Err(SessionError::Transport(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn silent_agent_times_out_during_hello() {
        let dir = sock_dir("silent");
        let sock_path = dir.join("agent.sock");
        let socket = UnixDomainSocket::bind(&sock_path).expect("socket should bind");

        let server = thread::spawn(move || {
            let stream = socket.accept().expect("accept should succeed");
            thread::sleep(Duration::from_millis(200));
            drop(stream);
        });

        let config = ConnectConfig {
            timeout: Duration::from_millis(50),
            ..ConnectConfig::default()
        };
        let result = connect(&sock_path, &config);
        assert!(matches!(result, Err(SessionError::Timeout(_))));

        server.join().expect("server thread should finish");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn stale_replies_are_skipped() {
        let dir = sock_dir("stale");
        let sock_path = dir.join("agent.sock");
        let socket = UnixDomainSocket::bind(&sock_path).expect("socket should bind");

        let server = thread::spawn(move || {
            use std::io::Write;

            let mut stream = socket.accept().expect("accept should succeed");
            let mut reader = MessageReader::new(stream.try_clone().expect("clone"));
            stream
                .write_all(&[OFP_VERSION_1_3, 0, 0, 8, 0, 0, 0, 0])
                .expect("hello should be written");
            reader.read_message().expect("client hello");
            let request = reader.read_message().expect("echo request");

            let mut out = vec![OFP_VERSION_1_3, 3, 0, 8, 0, 0, 0, 99];
            let mut reply = vec![OFP_VERSION_1_3, 3, 0, 10];
            reply.extend_from_slice(&request.header.xid.to_be_bytes());
            reply.extend_from_slice(b"ok");
            out.extend_from_slice(&reply);
            stream.write_all(&out).expect("replies should be written");
        });

        let mut client = connect(&sock_path, &ConnectConfig::default()).expect("connect");
        let body = client.echo(b"ok").expect("echo should succeed");
        assert_eq!(body.as_ref(), b"ok");

        server.join().expect("server thread should finish");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn multi_part_desc_reply_is_rejected() {
        let dir = sock_dir("more");
        let sock_path = dir.join("agent.sock");
        let socket = UnixDomainSocket::bind(&sock_path).expect("socket should bind");

        let server = thread::spawn(move || {
            use std::io::Write;

            let mut stream = socket.accept().expect("accept should succeed");
            let mut reader = MessageReader::new(stream.try_clone().expect("clone"));
            stream
                .write_all(&[OFP_VERSION_1_3, 0, 0, 8, 0, 0, 0, 0])
                .expect("hello should be written");
            reader.read_message().expect("client hello");
            let request = reader.read_message().expect("desc request");

            let mut reply = vec![OFP_VERSION_1_3, 19, 0, 16];
            reply.extend_from_slice(&request.header.xid.to_be_bytes());
            reply.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0]);
            stream.write_all(&reply).expect("reply should be written");
        });

        let mut client = connect(&sock_path, &ConnectConfig::default()).expect("connect");
        let err = client.request_desc_raw().unwrap_err();
        assert!(matches!(err, SessionError::UnexpectedReply(ref msg) if msg.contains("more parts")));

        server.join().expect("server thread should finish");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
