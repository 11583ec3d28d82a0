use ofagent_wire::BufferList;
use tracing::trace;

use crate::error::SendError;
use crate::session::Session;

/// Hand a finished buffer list to the session for transmission.
///
/// The session's result is returned unmodified. The list stays owned by the
/// caller, who releases it whatever the outcome.
pub fn send<S>(session: &mut S, list: &BufferList) -> Result<(), SendError>
where
    S: Session + ?Sized,
{
    trace!(bytes = list.payload_len(), "sending packet list");
    session.send_packet_list(list)
}

#[cfg(test)]
mod tests {
    use ofagent_wire::{BufferAllocator, SegmentPool};

    use super::*;

    struct Refusing;

    impl Session for Refusing {
        fn negotiated_version(&self) -> u8 {
            0x04
        }

        fn bound_device_id(&self) -> u64 {
            0
        }

        fn send_packet_list(&mut self, _list: &BufferList) -> Result<(), SendError> {
            Err(SendError::ConnectionClosed)
        }
    }

    #[test]
    fn error_passes_through_and_list_stays_with_caller() {
        let pool = SegmentPool::default();
        let list = pool.alloc_list().unwrap();

        let err = send(&mut Refusing, &list).unwrap_err();
        assert!(matches!(err, SendError::ConnectionClosed));
        assert_eq!(pool.stats().outstanding_lists(), 1);

        list.release();
        assert_eq!(pool.stats().outstanding_lists(), 0);
    }
}
