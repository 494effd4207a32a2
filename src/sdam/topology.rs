use super::description::server::{ServerAddress, ServerDescription};
use crate::{
    client::session::ClientSession,
    error::Result,
    selection_criteria::SelectionCriteria,
    BoxFuture,
};

/// Whether the deployment is known to support sessions.
///
/// Support cannot be determined until at least one server has completed a handshake, so the first
/// operation against a freshly created client may observe `Undetermined`; a server selection
/// forces the determination to be made.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum SessionSupportStatus {
    /// No data-bearing server has been contacted yet.
    Undetermined,

    /// The deployment does not support sessions.
    Unsupported,

    /// The deployment supports sessions.
    Supported,
}

/// A server chosen by the topology's selection engine, borrowed by the executor for the duration
/// of a single attempt.
#[derive(Clone, Debug)]
pub struct SelectedServer {
    description: ServerDescription,
    load_balanced: bool,
}

impl SelectedServer {
    /// Wraps the description of a chosen server.
    pub fn new(description: ServerDescription, load_balanced: bool) -> Self {
        Self {
            description,
            load_balanced,
        }
    }

    /// The monitoring description of this server.
    pub fn description(&self) -> &ServerDescription {
        &self.description
    }

    /// The address of this server.
    pub fn address(&self) -> &ServerAddress {
        &self.description.address
    }

    /// The maximum wire version this server speaks, or 0 if no handshake has completed.
    pub fn max_wire_version(&self) -> i32 {
        self.description.max_wire_version.unwrap_or(0)
    }

    /// Whether this server was reached through a load balancer.
    pub fn load_balanced(&self) -> bool {
        self.load_balanced
    }
}

/// The view of the deployment that operation execution consumes.
///
/// Implemented by the server discovery and monitoring layer. The executor treats the topology as
/// read-mostly: [`select_server`](Topology::select_server) is the only call that may suspend, and
/// it is also the call that drives discovery forward when the deployment is still being mapped
/// out.
pub trait Topology: Send + Sync {
    /// Whether the deployment supports sessions. May be `Undetermined` before any server has been
    /// contacted.
    fn session_support_status(&self) -> SessionSupportStatus;

    /// Whether every data-bearing server in the deployment supports snapshot reads.
    fn supports_snapshot_reads(&self) -> bool;

    /// Whether the deployment supports retryable writes.
    fn supports_retryable_writes(&self) -> bool;

    /// The lowest maximum wire version reported across the deployment, or 0 if unknown.
    fn common_wire_version(&self) -> i32;

    /// Whether reads should be retried. Reflects the `retryReads` client option.
    fn retry_reads(&self) -> bool {
        true
    }

    /// Whether writes should be retried. Reflects the `retryWrites` client option.
    fn retry_writes(&self) -> bool {
        false
    }

    /// Selects a server matching `criteria`, waiting for discovery if no suitable server is
    /// currently known. The session, when provided, allows the selection engine to honor
    /// deployment-specific pinning rules.
    fn select_server<'a>(
        &'a self,
        criteria: &'a SelectionCriteria,
        session: Option<&'a ClientSession>,
    ) -> BoxFuture<'a, Result<SelectedServer>>;

    /// Starts an implicit session for an operation that was not given one. Implementations
    /// backed by a server session pool should return a pooled session here.
    fn start_implicit_session(&self) -> ClientSession {
        ClientSession::implicit()
    }
}
