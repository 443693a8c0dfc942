//! TCP hub and peer messaging with file attachments.
//!
//! A hub accepts any number of peers and can message one of them or all of
//! them; a peer holds one connection to a hub. Frames carry either a text
//! message or a named file.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP endpoints and connection ids
//! - [`frame`]: the 128-byte-header wire format and stream reassembly
//! - [`peer`]: hub, session, registry and routing (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use hubline_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use hubline_frame::*;
}

/// Re-export hub and session types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use hubline_peer::*;
}
