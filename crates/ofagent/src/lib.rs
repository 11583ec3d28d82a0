//! OpenFlow agent description replies.
//!
//! ofagent answers a controller's switch-description request: it looks up the
//! datapath's descriptor, encodes a multipart DESC reply into pooled
//! segments with a back-patched length, and writes it to the session.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket listener and stream
//! - [`wire`]: segment buffers, message header, multipart and DESC codecs
//! - [`session`]: reply builder, request handler, HELLO, listener/connector
//!   (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use ofagent_transport::*;
}

/// Re-export wire types.
pub mod wire {
    pub use ofagent_wire::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use ofagent_session::*;
}
