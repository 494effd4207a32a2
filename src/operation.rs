use crate::{
    client::session::ClientSession,
    error::{Error, Result},
    sdam::{SelectedServer, ServerDescription},
    selection_criteria::ReadPreference,
    BoxFuture,
};

/// A cross-cutting property of an operation that the executor keys its behavior on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Aspect {
    /// The operation reads data.
    Read,

    /// The operation writes data.
    Write,

    /// The operation may be attempted a second time after a recoverable failure.
    Retryable,

    /// The operation opens a server-side cursor.
    CursorCreating,

    /// The operation continues iterating a previously opened server-side cursor.
    CursorIterating,
}

/// The set of [`Aspect`]s an operation declares.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AspectSet(u8);

impl AspectSet {
    /// The empty aspect set.
    pub const EMPTY: Self = Self(0);

    const fn bit(aspect: Aspect) -> u8 {
        1 << aspect as u8
    }

    /// Builds an aspect set from a list of aspects.
    pub const fn of(aspects: &[Aspect]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < aspects.len() {
            bits |= Self::bit(aspects[i]);
            i += 1;
        }
        Self(bits)
    }

    /// This set with `aspect` added.
    pub const fn with(self, aspect: Aspect) -> Self {
        Self(self.0 | Self::bit(aspect))
    }

    /// Whether `aspect` is a member of this set.
    pub const fn contains(self, aspect: Aspect) -> bool {
        self.0 & Self::bit(aspect) != 0
    }

    /// Whether this set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Context about the execution of one attempt of an operation.
#[derive(Debug)]
#[non_exhaustive]
pub struct ExecutionContext<'a> {
    /// The server this attempt should be dispatched to.
    pub server: &'a SelectedServer,

    /// The session to run the attempt under, if any.
    pub session: Option<&'a mut ClientSession>,

    /// Whether the executor may retry this attempt if it fails with a retryable write error. When
    /// set, the command must carry the session's transaction number so the server can deduplicate
    /// the retry.
    pub will_retry_write: bool,
}

/// The level of retry support an execution has, determined before the first attempt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Retryability {
    Write,
    Read,
    None,
}

impl Retryability {
    /// Whether this level of retryability can retry the given error.
    pub(crate) fn can_retry_error(&self, error: &Error) -> bool {
        match self {
            Self::Write => error.is_write_retryable(),
            Self::Read => error.is_read_retryable(),
            Self::None => false,
        }
    }
}

/// A trait modeling the behavior of a server side operation.
///
/// No methods in this trait should have default behaviors to ensure that wrapper operations
/// replicate all behavior. Default behavior is provided by the `OperationWithDefaults` trait.
pub trait Operation: Send + Sync {
    /// The output type of this operation.
    type O;

    /// The name of the server side command associated with this operation.
    const NAME: &'static str;

    /// The aspects this operation bears.
    fn aspects(&self) -> AspectSet;

    /// The read preference to select a server by. `None` is equivalent to primary.
    fn read_preference(&self) -> Option<&ReadPreference>;

    /// For cursor continuations, the description of the server holding the cursor.
    fn cursor_server(&self) -> Option<&ServerDescription>;

    /// Whether selection should consider secondaries writable for this operation.
    fn try_secondary_write(&self) -> bool;

    /// Whether the executor should leave a pinned session with a committed transaction pinned.
    fn bypass_pinning_check(&self) -> bool;

    /// Whether this particular operation instance can be retried as a read.
    fn can_retry_read(&self) -> bool;

    /// Whether this particular operation instance can be retried as a write.
    fn can_retry_write(&self) -> bool;

    /// Dispatches one attempt of this operation against the server in `context`, resolving with
    /// the operation's result or a classified error. May be invoked a second time, with a freshly
    /// selected server, if the first attempt fails retryably.
    fn execute<'a>(&'a mut self, context: ExecutionContext<'a>) -> BoxFuture<'a, Result<Self::O>>;

    /// The name of the server side command associated with this operation.
    fn name(&self) -> &str;
}

/// A mirror of the `Operation` trait, with default behavior where appropriate. Should only be
/// implemented by operation types that do not delegate to other operations.
pub trait OperationWithDefaults: Send + Sync {
    /// The output type of this operation.
    type O;

    /// The name of the server side command associated with this operation.
    const NAME: &'static str;

    /// The aspects this operation bears.
    fn aspects(&self) -> AspectSet;

    /// The read preference to select a server by. `None` is equivalent to primary.
    fn read_preference(&self) -> Option<&ReadPreference> {
        None
    }

    /// For cursor continuations, the description of the server holding the cursor.
    fn cursor_server(&self) -> Option<&ServerDescription> {
        None
    }

    /// Whether selection should consider secondaries writable for this operation.
    fn try_secondary_write(&self) -> bool {
        false
    }

    /// Whether the executor should leave a pinned session with a committed transaction pinned.
    fn bypass_pinning_check(&self) -> bool {
        false
    }

    /// Whether this particular operation instance can be retried as a read.
    fn can_retry_read(&self) -> bool {
        true
    }

    /// Whether this particular operation instance can be retried as a write.
    fn can_retry_write(&self) -> bool {
        true
    }

    /// Dispatches one attempt of this operation against the server in `context`.
    fn execute<'a>(&'a mut self, context: ExecutionContext<'a>) -> BoxFuture<'a, Result<Self::O>>;

    /// The name of the server side command associated with this operation.
    fn name(&self) -> &str {
        Self::NAME
    }
}

impl<T: OperationWithDefaults> Operation for T
where
    T: Send + Sync,
{
    type O = T::O;
    const NAME: &'static str = T::NAME;
    fn aspects(&self) -> AspectSet {
        self.aspects()
    }
    fn read_preference(&self) -> Option<&ReadPreference> {
        self.read_preference()
    }
    fn cursor_server(&self) -> Option<&ServerDescription> {
        self.cursor_server()
    }
    fn try_secondary_write(&self) -> bool {
        self.try_secondary_write()
    }
    fn bypass_pinning_check(&self) -> bool {
        self.bypass_pinning_check()
    }
    fn can_retry_read(&self) -> bool {
        self.can_retry_read()
    }
    fn can_retry_write(&self) -> bool {
        self.can_retry_write()
    }
    fn execute<'a>(&'a mut self, context: ExecutionContext<'a>) -> BoxFuture<'a, Result<Self::O>> {
        self.execute(context)
    }
    fn name(&self) -> &str {
        self.name()
    }
}
