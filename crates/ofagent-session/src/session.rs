use std::io::{ErrorKind, Write};

use ofagent_wire::BufferList;
use tracing::trace;

use crate::error::SendError;

/// An established control session with a controller.
///
/// The reply pipeline reads the negotiated version and the bound datapath
/// from it and hands finished buffer lists to
/// [`Session::send_packet_list`].
pub trait Session {
    /// Protocol version agreed during HELLO.
    fn negotiated_version(&self) -> u8;

    /// Datapath id of the device this session speaks for.
    fn bound_device_id(&self) -> u64;

    /// Transmit every segment of `list`, in order.
    fn send_packet_list(&mut self, list: &BufferList) -> Result<(), SendError>;
}

/// A session that writes buffer lists to any `Write` stream.
pub struct StreamSession<W> {
    writer: W,
    version: u8,
    datapath_id: u64,
}

impl<W: Write> StreamSession<W> {
    pub fn new(writer: W, version: u8, datapath_id: u64) -> Self {
        Self {
            writer,
            version,
            datapath_id,
        }
    }

    /// Record the version agreed during HELLO.
    pub fn set_negotiated_version(&mut self, version: u8) {
        self.version = version;
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_all_retrying(&mut self, mut bytes: &[u8]) -> Result<(), SendError> {
        while !bytes.is_empty() {
            match self.writer.write(bytes) {
                Ok(0) => return Err(SendError::ConnectionClosed),
                Ok(n) => bytes = &bytes[n..],
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(SendError::Io(err)),
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SendError> {
        loop {
            match self.writer.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(SendError::Io(err)),
            }
        }
    }
}

impl<W: Write> Session for StreamSession<W> {
    fn negotiated_version(&self) -> u8 {
        self.version
    }

    fn bound_device_id(&self) -> u64 {
        self.datapath_id
    }

    fn send_packet_list(&mut self, list: &BufferList) -> Result<(), SendError> {
        for segment in list.segments() {
            trace!(bytes = segment.plen(), "writing segment");
            self.write_all_retrying(segment.payload())?;
        }
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use ofagent_wire::Segment;

    use super::*;

    fn list_of(chunks: &[&[u8]]) -> BufferList {
        let mut list = BufferList::new();
        for chunk in chunks {
            let mut segment = Segment::with_capacity(chunk.len());
            segment.set_plen(chunk.len());
            segment.put_slice(chunk).unwrap();
            list.push(segment);
        }
        list
    }

    #[test]
    fn writes_segments_in_order() {
        let mut session = StreamSession::new(Vec::new(), 0x04, 1);
        session
            .send_packet_list(&list_of(&[&b"abc"[..], &[][..], &b"de"[..]]))
            .unwrap();
        assert_eq!(session.into_inner(), b"abcde");
    }

    #[test]
    fn sends_only_declared_payload() {
        let mut segment = Segment::with_capacity(32);
        segment.set_plen(32);
        segment.put_slice(b"xy").unwrap();
        segment.reset_plen();
        let mut list = BufferList::new();
        list.push(segment);

        let mut session = StreamSession::new(Vec::new(), 0x04, 1);
        session.send_packet_list(&list).unwrap();
        assert_eq!(session.get_ref().as_slice(), b"xy");
    }

    #[test]
    fn interrupted_writes_are_retried() {
        let mut session = StreamSession::new(
            InterruptedOnce {
                tripped: false,
                data: Vec::new(),
            },
            0x04,
            1,
        );
        session.send_packet_list(&list_of(&[&b"retry"[..]])).unwrap();
        assert_eq!(session.get_ref().data, b"retry");
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let mut session = StreamSession::new(ZeroWriter, 0x04, 1);
        let err = session.send_packet_list(&list_of(&[&b"x"[..]])).unwrap_err();
        assert!(matches!(err, SendError::ConnectionClosed));
    }

    #[test]
    fn broken_pipe_surfaces_as_io() {
        let mut session = StreamSession::new(BrokenPipe, 0x04, 1);
        let err = session.send_packet_list(&list_of(&[&b"x"[..]])).unwrap_err();
        assert!(matches!(err, SendError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn exposes_version_and_datapath() {
        let mut session = StreamSession::new(Vec::new(), 0x04, 0xfeed);
        assert_eq!(session.negotiated_version(), 0x04);
        assert_eq!(session.bound_device_id(), 0xfeed);
        session.set_negotiated_version(0x01);
        assert_eq!(session.negotiated_version(), 0x01);
    }

    struct InterruptedOnce {
        tripped: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.tripped {
                self.tripped = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
