mod executor;
pub mod session;

use std::{fmt, sync::Arc};

use crate::sdam::Topology;

/// The entry point for dispatching operations against a deployment. A `Client` sequences server
/// selection, session handling, transaction rules, and retries for each operation handed to it.
///
/// `Client` uses [`std::sync::Arc`](https://doc.rust-lang.org/std/sync/struct.Arc.html)
/// internally, so it can safely be shared across threads or async tasks.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[allow(dead_code, unreachable_code, clippy::diverging_sub_expression)]
const _: fn() = || {
    fn assert_send<T: Send>(_t: T) {}
    fn assert_sync<T: Sync>(_t: T) {}

    let _c: Client = todo!();
    assert_send(_c);
    assert_sync(_c);
};

struct ClientInner {
    topology: Arc<dyn Topology>,
}

impl Client {
    /// Creates a new `Client` executing operations against the deployment observed by `topology`.
    pub fn new(topology: impl Topology + 'static) -> Self {
        Self::with_topology(Arc::new(topology))
    }

    /// Creates a new `Client` from a shared topology handle.
    pub fn with_topology(topology: Arc<dyn Topology>) -> Self {
        Self {
            inner: Arc::new(ClientInner { topology }),
        }
    }

    pub(crate) fn topology(&self) -> &dyn Topology {
        self.inner.topology.as_ref()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Client").finish_non_exhaustive()
    }
}
