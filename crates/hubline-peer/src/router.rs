use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use hubline_transport::ConnectionId;
use tracing::{debug, warn};

use crate::error::{PeerError, Result};
use crate::registry::ConnectionRegistry;

/// Which connections an outbound frame goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Every registered connection.
    Broadcast,
    /// One connection.
    Id(ConnectionId),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Broadcast => f.write_str("Broadcast"),
            Selector::Id(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("broadcast") || s.eq_ignore_ascii_case("all") || s == "*" {
            return Ok(Selector::Broadcast);
        }
        s.parse::<ConnectionId>().map(Selector::Id).map_err(|_| {
            format!("invalid selector '{s}': expected 'Broadcast' or a connection id")
        })
    }
}

impl From<ConnectionId> for Selector {
    fn from(id: ConnectionId) -> Self {
        Selector::Id(id)
    }
}

/// Where a routed frame went.
#[derive(Debug, Default)]
pub struct RouteReport {
    /// Connections the frame was queued on.
    pub delivered: Vec<ConnectionId>,
    /// Connections that could not take the frame, with the reason.
    pub failed: Vec<(ConnectionId, PeerError)>,
}

impl RouteReport {
    /// Number of connections a write was attempted on.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    /// Whether every attempted write succeeded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Queue `frame` on the connections `selector` names.
///
/// A broadcast walks a snapshot of the registry and records per-connection
/// failures without stopping. A single-id route fails with `RouteNotFound`
/// when the id is not registered and with `SocketNotOpen` when it is closed.
pub fn route(
    registry: &ConnectionRegistry,
    selector: Selector,
    frame: Bytes,
) -> Result<RouteReport> {
    let mut report = RouteReport::default();

    match selector {
        Selector::Broadcast => {
            for handle in registry.all() {
                let id = handle.id();
                match handle.send_bytes(frame.clone()) {
                    Ok(()) => report.delivered.push(id),
                    Err(err) => {
                        warn!(connection_id = %id, error = %err, "broadcast write failed");
                        report.failed.push((id, err));
                    }
                }
            }
        }
        Selector::Id(id) => {
            let handle = registry
                .lookup(id)
                .map_err(|_| PeerError::RouteNotFound(id))?;
            handle.send_bytes(frame.clone())?;
            report.delivered.push(id);
        }
    }

    debug!(
        %selector,
        size = frame.len(),
        delivered = report.delivered.len(),
        failed = report.failed.len(),
        "frame routed"
    );
    Ok(report)
}
