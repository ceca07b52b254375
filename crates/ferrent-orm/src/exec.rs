//! Statement execution.
//!
//! Every terminal call of a builder goes through a [`Session`]: it picks
//! the bound transaction or a fresh connection, races the call against the
//! cancellation token, routes failures through the driver's classifier and
//! logs the outcome.

use std::time::{Duration, Instant};

use ferrent_core::{FieldValue, Query, SqlValue};
use tokio_util::sync::CancellationToken;

use crate::database::Shared;
use crate::driver::{Connection, DriverResult, Row};
use crate::error::{Error, ProgrammerError, Result};
use crate::transaction::Transaction;

#[derive(Debug, Clone, Copy)]
enum Call {
    Execute,
    Fetch,
    Insert,
}

enum Outcome {
    Affected(u64),
    Rows(Vec<Row>),
    Ids(Vec<SqlValue>),
}

async fn invoke<C: Connection + ?Sized>(
    conn: &mut C,
    call: Call,
    query: &Query,
) -> DriverResult<Outcome> {
    match call {
        Call::Execute => conn.execute(query).await.map(Outcome::Affected),
        Call::Fetch => conn.fetch(query).await.map(Outcome::Rows),
        Call::Insert => conn.insert(query).await.map(Outcome::Ids),
    }
}

/// Where and how a statement runs.
#[derive(Clone)]
pub(crate) struct Session<'a> {
    pub(crate) shared: &'a Shared,
    tx: Option<Transaction>,
    cancel: Option<CancellationToken>,
}

impl<'a> Session<'a> {
    pub(crate) const fn new(shared: &'a Shared) -> Self {
        Self {
            shared,
            tx: None,
            cancel: None,
        }
    }

    pub(crate) fn bind_transaction(&mut self, tx: &Transaction) {
        self.tx = Some(tx.clone());
    }

    pub(crate) fn bind_cancel(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    pub(crate) async fn execute(&self, query: &Query) -> Result<u64> {
        match self.run(Call::Execute, query).await? {
            Outcome::Affected(n) => Ok(n),
            Outcome::Rows(rows) => Ok(rows.len() as u64),
            Outcome::Ids(ids) => Ok(ids.len() as u64),
        }
    }

    pub(crate) async fn fetch(&self, query: &Query) -> Result<Vec<Row>> {
        match self.run(Call::Fetch, query).await? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) | Outcome::Ids(_) => Ok(Vec::new()),
        }
    }

    pub(crate) async fn insert(&self, query: &Query) -> Result<Vec<SqlValue>> {
        match self.run(Call::Insert, query).await? {
            Outcome::Ids(ids) => Ok(ids),
            Outcome::Affected(_) | Outcome::Rows(_) => Ok(Vec::new()),
        }
    }

    async fn run(&self, call: Call, query: &Query) -> Result<Outcome> {
        self.shared.ensure_open()?;
        let started = Instant::now();
        let result = match &self.cancel {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(Error::Cancelled),
                    result = self.dispatch(call, query) => result,
                }
            }
            None => self.dispatch(call, query).await,
        };
        self.log(query, started.elapsed(), &result);
        result
    }

    async fn dispatch(&self, call: Call, query: &Query) -> Result<Outcome> {
        let result = match &self.tx {
            Some(tx) => {
                let mut guard = tx.lock().await;
                let conn = guard
                    .as_mut()
                    .ok_or(Error::Programmer(ProgrammerError::TransactionFinished))?;
                invoke(conn.as_mut(), call, query).await
            }
            None => match self.shared.driver.connection().await {
                Ok(mut conn) => invoke(conn.as_mut(), call, query).await,
                Err(error) => Err(error),
            },
        };
        result.map_err(|e| self.shared.translate(e))
    }

    fn log(&self, query: &Query, elapsed: Duration, result: &Result<Outcome>) {
        let config = self.shared.driver.config();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        match result {
            Ok(outcome) => {
                let rows = match outcome {
                    Outcome::Affected(n) => *n,
                    Outcome::Rows(rows) => rows.len() as u64,
                    Outcome::Ids(ids) => ids.len() as u64,
                };
                if config.slow_query_threshold.is_some_and(|t| elapsed >= t) {
                    tracing::warn!(
                        kind = %query.kind,
                        table = query.table_name(),
                        rows,
                        elapsed_ms,
                        "slow statement"
                    );
                } else if config.log_queries {
                    tracing::debug!(
                        kind = %query.kind,
                        table = query.table_name(),
                        rows,
                        elapsed_ms,
                        "executed statement"
                    );
                }
            }
            Err(Error::Cancelled) => {
                tracing::debug!(kind = %query.kind, table = query.table_name(), "statement cancelled");
            }
            Err(error) => {
                tracing::debug!(
                    kind = %query.kind,
                    table = query.table_name(),
                    elapsed_ms,
                    error = %error,
                    "statement failed"
                );
            }
        }
    }
}

/// Implements `on_transaction` and `with_cancel` for builders holding a
/// `session` field.
macro_rules! impl_session_options {
    ($([$($generics:tt)*] $builder:ty),+ $(,)?) => {
        $(
            impl $($generics)* $builder {
                /// Runs the statement inside `tx`.
                #[must_use]
                pub fn on_transaction(mut self, tx: &$crate::transaction::Transaction) -> Self {
                    self.session.bind_transaction(tx);
                    self
                }

                /// Aborts the statement with [`Error::Cancelled`](crate::Error::Cancelled)
                /// once `token` is cancelled.
                #[must_use]
                pub fn with_cancel(mut self, token: ::tokio_util::sync::CancellationToken) -> Self {
                    self.session.bind_cancel(token);
                    self
                }
            }
        )+
    };
}

pub(crate) use impl_session_options;

/// A raw SQL statement.
pub struct Raw<'a> {
    session: Session<'a>,
    sql: String,
    arguments: Vec<SqlValue>,
}

impl<'a> Raw<'a> {
    pub(crate) fn new(shared: &'a Shared, sql: String) -> Self {
        Self {
            session: Session::new(shared),
            sql,
            arguments: Vec::new(),
        }
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn bind<V: FieldValue>(mut self, value: V) -> Self {
        self.arguments.push(value.to_value());
        self
    }

    /// Runs the statement and returns the affected row count.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error.
    pub async fn execute(self) -> Result<u64> {
        let query = Query::raw(self.sql, self.arguments);
        self.session.execute(&query).await
    }

    /// Runs the query and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns the translated driver error.
    pub async fn fetch(self) -> Result<Vec<Row>> {
        let query = Query::raw(self.sql, self.arguments);
        self.session.fetch(&query).await
    }
}

impl_session_options!([<'a>] Raw<'a>);
