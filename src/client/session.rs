use bson::{doc, Document, Uuid};
use typed_builder::TypedBuilder;

use crate::sdam::ServerAddress;

#[cfg(test)]
use std::sync::{atomic::AtomicUsize, Arc, Mutex};

/// A logical session for ordering sequential operations.
///
/// Sessions are either explicit, created by the caller and reusable across operations, or
/// implicit, created by the executor for a single operation that was not given one. An implicit
/// session is ended by the executor once its operation completes; an explicit session outlives
/// the operations run under it and is ended by whoever created it.
#[derive(Debug)]
pub struct ClientSession {
    id: Document,
    kind: SessionKind,
    ended: bool,
    dirty: bool,
    options: Option<SessionOptions>,
    txn_number: i64,
    pub(crate) transaction: Transaction,
    pinned: Option<ServerAddress>,
    #[cfg(test)]
    pub(crate) events: Option<Arc<SessionEvents>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SessionKind {
    Implicit,
    Explicit,
}

impl ClientSession {
    fn new(options: Option<SessionOptions>, kind: SessionKind) -> Self {
        Self {
            id: doc! { "id": Uuid::new() },
            kind,
            ended: false,
            dirty: false,
            options,
            txn_number: 0,
            transaction: Transaction::default(),
            pinned: None,
            #[cfg(test)]
            events: None,
        }
    }

    /// Creates an implicit session for use with a single operation.
    pub fn implicit() -> Self {
        Self::new(None, SessionKind::Implicit)
    }

    /// Creates an explicit session with the given options.
    pub fn explicit(options: impl Into<Option<SessionOptions>>) -> Self {
        Self::new(options.into(), SessionKind::Explicit)
    }

    /// The id of this session.
    pub fn id(&self) -> &Document {
        &self.id
    }

    /// Whether this session was created by the executor rather than the caller.
    pub fn is_implicit(&self) -> bool {
        self.kind == SessionKind::Implicit
    }

    /// Whether this session has been ended.
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Whether this session was configured for snapshot reads.
    pub fn snapshot_enabled(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|options| options.snapshot)
            .unwrap_or(false)
    }

    /// Whether a transaction is currently active on this session.
    pub fn in_transaction(&self) -> bool {
        matches!(
            self.transaction.state,
            TransactionState::Starting | TransactionState::InProgress
        )
    }

    /// The transaction state of this session.
    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    /// The session's current transaction number. Retried writes share a transaction number across
    /// both attempts; the server uses it to deduplicate the retry.
    pub fn txn_number(&self) -> i64 {
        self.txn_number
    }

    /// Increments the session's transaction number and returns the new value.
    pub(crate) fn increment_txn_number(&mut self) -> i64 {
        self.txn_number += 1;
        self.txn_number
    }

    /// Whether this session is pinned to a server.
    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }

    /// The server this session is pinned to, if any.
    pub fn pinned_server(&self) -> Option<&ServerAddress> {
        self.pinned.as_ref()
    }

    /// Pins this session to the given server. On load-balanced and sharded deployments, a
    /// transaction or server-side cursor must keep using the server that opened it.
    pub fn pin_to(&mut self, address: ServerAddress) {
        self.pinned = Some(address);
    }

    /// Releases this session's pin.
    pub fn unpin(&mut self, mode: UnpinMode) {
        self.pinned = None;
        #[cfg(test)]
        if let Some(ref events) = self.events {
            events.unpins.lock().unwrap().push(mode);
        }
        #[cfg(not(test))]
        let _ = mode;
    }

    /// Whether this session has seen a network error and should not be reused.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Ends this session. A session that has ended cannot be used for further operations.
    pub fn end(&mut self) {
        self.ended = true;
        #[cfg(test)]
        if let Some(ref events) = self.events {
            events.ends.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[cfg(test)]
    pub(crate) fn observe(&mut self, events: Arc<SessionEvents>) {
        self.events = Some(events);
    }
}

/// How a session's pin should be released.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum UnpinMode {
    /// Release the pin at a transaction boundary.
    Normal,

    /// Release the pin outside of a transaction boundary, optionally evicting the pinned
    /// service's connections. Used when the pinned server can no longer be trusted to hold the
    /// pinned state, e.g. after a network error on a cursor that was never opened.
    #[non_exhaustive]
    Force {
        /// Whether the connections for the pinned service should also be cleared.
        clear_connections: bool,
    },
}

/// Contains the options that can be used to create a new [`ClientSession`].
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct SessionOptions {
    /// If true, all read operations performed using this client session will share the same
    /// snapshot.
    pub snapshot: Option<bool>,
}

/// A transaction state containing the transaction's current [`TransactionState`].
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct Transaction {
    pub(crate) state: TransactionState,
}

impl Transaction {
    /// The current state of the transaction.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Whether the transaction has been committed.
    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }
}

/// The states in a transaction's lifecycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum TransactionState {
    /// There is no transaction in progress.
    #[default]
    None,

    /// A transaction has been started but no operation has run under it yet.
    Starting,

    /// A transaction is in progress.
    InProgress,

    /// The most recent transaction was committed.
    Committed,

    /// The most recent transaction was aborted.
    Aborted,
}

/// Counters recording session lifecycle events, for assertions in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct SessionEvents {
    pub(crate) ends: AtomicUsize,
    pub(crate) unpins: Mutex<Vec<UnpinMode>>,
}
