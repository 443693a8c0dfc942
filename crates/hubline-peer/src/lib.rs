//! Hub and peer roles for hubline.
//!
//! A [`Hub`] accepts many connections, keeps them in a [`ConnectionRegistry`]
//! and routes hub-authored frames to one connection or all of them. A
//! [`PeerSession`] holds a single connection to a hub. Both report what
//! happens as [`Event`]s on a channel; [`dispatch`] hands those to a
//! [`Presentation`] and, for accepted attachments, an [`AttachmentStore`].

pub mod attachment;
pub mod connection;
pub mod error;
pub mod event;
pub mod hub;
pub mod registry;
pub mod router;
pub mod session;

pub use attachment::{AttachmentDecision, AttachmentOffer, AttachmentStore, PendingAttachment};
pub use connection::ConnectionHandle;
pub use error::{PeerError, Result};
pub use event::{dispatch, ConnectionErrorKind, Event, Presentation};
pub use hub::{Hub, HubConfig, HubHandle, DEFAULT_EVENT_CAPACITY};
pub use registry::ConnectionRegistry;
pub use router::{route, RouteReport, Selector};
pub use session::{PeerSession, SessionConfig};

pub use hubline_frame::{Frame, FrameKind};
pub use hubline_transport::ConnectionId;
