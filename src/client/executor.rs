use std::borrow::BorrowMut;

use super::{
    session::{ClientSession, UnpinMode},
    Client,
};
use crate::{
    error::{CommandError, Error, ErrorKind, Result},
    operation::{Aspect, ExecutionContext, Operation, Retryability},
    sdam::{SelectedServer, SessionSupportStatus, RETRYABLE_READS_MIN_WIRE_VERSION},
    selection_criteria::{ReadPreference, SelectionCriteria},
};

/// The server-side error code for an illegal operation.
const ILLEGAL_OPERATION: i32 = 20;

/// Replacement message for the error a storage engine without document-level locking returns when
/// a write carries a transaction number.
const RETRYABLE_WRITES_UNSUPPORTED_MESSAGE: &str = "This deployment does not support retryable \
                                                    writes. Please add retryWrites=false to your \
                                                    connection string.";

impl Client {
    /// Execute the given operation.
    ///
    /// Server selection will be performed using the criteria derived from the operation, and an
    /// implicit session will be created if the deployment supports sessions and an explicit
    /// session is not provided.
    pub async fn execute_operation<T: Operation>(
        &self,
        mut op: impl BorrowMut<T>,
        session: impl Into<Option<&mut ClientSession>>,
    ) -> Result<T::O> {
        self.execute_operation_inner(op.borrow_mut(), session.into())
            .await
    }

    async fn execute_operation_inner<T: Operation>(
        &self,
        op: &mut T,
        session: Option<&mut ClientSession>,
    ) -> Result<T::O> {
        // Validate inputs that can be checked before server selection.
        if op.aspects().contains(Aspect::CursorIterating) && op.cursor_server().is_none() {
            return Err(Error::invalid_argument(
                "cursor continuation requires the server that created the cursor",
            ));
        }

        // The first operation on a fresh client races initial discovery; force a selection so
        // session support is known before deciding whether to create an implicit session.
        let session_support = match self.topology().session_support_status() {
            SessionSupportStatus::Undetermined => {
                let discovery_criteria =
                    SelectionCriteria::by_read_preference(ReadPreference::primary_preferred());
                let _ = self
                    .topology()
                    .select_server(&discovery_criteria, None)
                    .await?;
                self.topology().session_support_status()
            }
            status => status,
        };

        let mut implicit_session: Option<ClientSession> = None;
        let session: Option<&mut ClientSession> = match (session_support, session) {
            (SessionSupportStatus::Supported, Some(session)) => {
                if session.has_ended() {
                    return Err(ErrorKind::SessionExpired.into());
                }
                if session.snapshot_enabled() && !self.topology().supports_snapshot_reads() {
                    return Err(ErrorKind::IncompatibleServer {
                        message: "Snapshot reads are not supported by this deployment".to_string(),
                    }
                    .into());
                }
                Some(session)
            }
            (SessionSupportStatus::Supported, None) => {
                implicit_session = Some(self.topology().start_implicit_session());
                implicit_session.as_mut()
            }
            (_, Some(_)) => return Err(ErrorKind::SessionsNotSupported.into()),
            (_, None) => None,
        };

        let result = self.execute_with_checks(op, session).await;

        // This invocation owns the implicit session; end it on every path out.
        if let Some(ref mut session) = implicit_session {
            session.end();
        }

        result
    }

    /// Computes the criteria the operation's servers will be selected by, for both attempts.
    fn selection_criteria_for<T: Operation>(&self, op: &T) -> Result<SelectionCriteria> {
        if op.aspects().contains(Aspect::CursorIterating) {
            // Subsequent iterations of a cursor must reach the server holding its state.
            let description = op.cursor_server().ok_or_else(|| {
                Error::invalid_argument(
                    "cursor continuation requires the server that created the cursor",
                )
            })?;
            return Ok(SelectionCriteria::same_server(description.clone()));
        }
        let read_preference = op
            .read_preference()
            .cloned()
            .unwrap_or(ReadPreference::Primary);
        if op.try_secondary_write() {
            return Ok(SelectionCriteria::secondary_writable(
                self.topology().common_wire_version(),
                read_preference,
            ));
        }
        Ok(SelectionCriteria::by_read_preference(read_preference))
    }

    async fn execute_with_checks<T: Operation>(
        &self,
        op: &mut T,
        mut session: Option<&mut ClientSession>,
    ) -> Result<T::O> {
        let read_preference = op
            .read_preference()
            .cloned()
            .unwrap_or(ReadPreference::Primary);
        self.check_transaction_read_preference(&read_preference, &session)?;

        if let Some(ref mut session) = session {
            if session.is_pinned()
                && session.transaction().is_committed()
                && !op.bypass_pinning_check()
            {
                session.unpin(UnpinMode::Normal);
            }
        }

        // Computed once; the retry must reuse the exact criteria of the first attempt.
        let criteria = self.selection_criteria_for(op)?;

        // The session may have entered a transaction between validation and selection; check
        // again so a non-primary read preference cannot slip into one.
        self.check_transaction_read_preference(&read_preference, &session)?;

        self.execute_with_retry(op, &criteria, session).await
    }

    fn check_transaction_read_preference(
        &self,
        read_preference: &ReadPreference,
        session: &Option<&mut ClientSession>,
    ) -> Result<()> {
        if !read_preference.is_primary()
            && session
                .as_ref()
                .map_or(false, |session| session.in_transaction())
        {
            return Err(ErrorKind::Transaction {
                message: "read preference in a transaction must be primary".into(),
            }
            .into());
        }
        Ok(())
    }

    /// Selects a server and executes the given operation on it, optionally using a provided
    /// session. Retries the operation once upon failure if retryability is supported.
    async fn execute_with_retry<T: Operation>(
        &self,
        op: &mut T,
        criteria: &SelectionCriteria,
        mut session: Option<&mut ClientSession>,
    ) -> Result<T::O> {
        let aspects = op.aspects();
        let mut retry: Option<ExecutionRetry> = None;
        let mut retryability = Retryability::None;
        let mut will_retry_write = false;

        loop {
            // Selection failures surface as-is: on the first attempt there is nothing to retry,
            // and on the retry the reselection failure wins over the original error.
            let server = self
                .topology()
                .select_server(criteria, session.as_deref())
                .await?;

            match retry {
                None => {
                    retryability = self.retryability(op, &session, &server);
                    will_retry_write = retryability == Retryability::Write;
                    if will_retry_write {
                        if let Some(ref mut session) = session {
                            // Both attempts share this transaction number; it is what lets the
                            // server deduplicate an unacknowledged first attempt.
                            session.increment_txn_number();
                        }
                    }
                }
                Some(ref retry) => {
                    if !server_supports_retry(&server, retryability) {
                        let class = match retryability {
                            Retryability::Write => "retryable writes",
                            _ => "retryable reads",
                        };
                        return Err(ErrorKind::ServerSelection {
                            message: format!("selected server does not support {class}"),
                        }
                        .into());
                    }
                    if retry.unpin_before_retry {
                        if let Some(ref mut session) = session {
                            // The cursor was never opened on the pinned connection, so the pin
                            // must be released and the service's connections evicted before the
                            // fresh attempt.
                            session.unpin(UnpinMode::Force {
                                clear_connections: true,
                            });
                        }
                    }
                }
            }

            let context = ExecutionContext {
                server: &server,
                session: session.as_deref_mut(),
                will_retry_write,
            };
            let err = match op.execute(context).await {
                Ok(output) => return Ok(output),
                Err(err) => err,
            };

            if retry.is_some() {
                // The outcome of the second attempt is final.
                return Err(err);
            }

            if err.is_network_error() {
                if let Some(ref mut session) = session {
                    session.mark_dirty();
                }
            }

            if retryability == Retryability::Write {
                if let ErrorKind::Command(ref command_error) = *err.kind {
                    // Retryable writes are only supported by storage engines with document-level
                    // locking, so users need to disable retryable writes on legacy engines.
                    if command_error.code == ILLEGAL_OPERATION
                        && command_error.message.contains("Transaction numbers")
                    {
                        let diagnostic = CommandError {
                            code: command_error.code,
                            code_name: command_error.code_name.clone(),
                            message: RETRYABLE_WRITES_UNSUPPORTED_MESSAGE.to_string(),
                        };
                        return Err(Error::new(
                            ErrorKind::Command(diagnostic),
                            None::<Vec<String>>,
                        )
                        .with_source(err));
                    }
                }
            }

            if !retryability.can_retry_error(&err) {
                return Err(err);
            }

            let unpin_before_retry = err.is_network_error()
                && server.load_balanced()
                && aspects.contains(Aspect::CursorCreating)
                && session
                    .as_ref()
                    .map_or(false, |session| session.is_pinned() && !session.in_transaction());
            retry = Some(ExecutionRetry { unpin_before_retry });
        }
    }

    /// Returns the retryability level for the execution of this operation with the given session
    /// and first selected server.
    fn retryability<T: Operation>(
        &self,
        op: &T,
        session: &Option<&mut ClientSession>,
        server: &SelectedServer,
    ) -> Retryability {
        let aspects = op.aspects();
        if !aspects.contains(Aspect::Retryable) {
            return Retryability::None;
        }
        if session
            .as_ref()
            .map_or(false, |session| session.in_transaction())
        {
            return Retryability::None;
        }
        if aspects.contains(Aspect::Write) {
            // Retrying a write requires a session to carry the transaction number.
            if op.can_retry_write()
                && session.is_some()
                && self.topology().retry_writes()
                && self.topology().supports_retryable_writes()
            {
                return Retryability::Write;
            }
        } else if aspects.contains(Aspect::Read)
            && op.can_retry_read()
            && self.topology().retry_reads()
            && server.max_wire_version() >= RETRYABLE_READS_MIN_WIRE_VERSION
        {
            return Retryability::Read;
        }
        Retryability::None
    }
}

/// Whether the server selected for the retry still supports the retryable class the first
/// attempt was eligible for.
fn server_supports_retry(server: &SelectedServer, retryability: Retryability) -> bool {
    match retryability {
        Retryability::Write => server.description().supports_retryable_writes(),
        Retryability::Read => server.description().supports_retryable_reads(),
        Retryability::None => true,
    }
}

#[derive(Debug)]
struct ExecutionRetry {
    unpin_before_retry: bool,
}
