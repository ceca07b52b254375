//! Transactions.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ferrent_core::{HandleId, Query};
use futures::FutureExt;
use tokio::sync::{Mutex, MutexGuard};

use crate::database::Shared;
use crate::driver::{DriverTransaction, IsolationLevel};
use crate::error::{Error, ProgrammerError, Result};
use crate::exec::{Raw, Session};

type Slot = Option<Box<dyn DriverTransaction>>;

struct Inner {
    shared: Arc<Shared>,
    slot: Mutex<Slot>,
    isolation: IsolationLevel,
    savepoints: AtomicU64,
}

/// An open transaction. Clones share the same backend transaction.
///
/// Statements join it through `on_transaction(&tx)`; they run one at a
/// time.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<Inner>,
}

impl Transaction {
    pub(crate) async fn begin(shared: Arc<Shared>, isolation: IsolationLevel) -> Result<Self> {
        shared.ensure_open()?;
        let tx = shared
            .driver
            .begin(isolation)
            .await
            .map_err(|e| shared.translate(e))?;
        tracing::debug!(handle = %shared.handle, %isolation, "began transaction");
        Ok(Self {
            inner: Arc::new(Inner {
                shared,
                slot: Mutex::new(Some(tx)),
                isolation,
                savepoints: AtomicU64::new(0),
            }),
        })
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, Slot> {
        self.inner.slot.lock().await
    }

    /// Handle the transaction runs on.
    #[must_use]
    pub fn handle(&self) -> HandleId {
        self.inner.shared.handle
    }

    /// Isolation level the transaction was started with.
    #[must_use]
    pub fn isolation(&self) -> IsolationLevel {
        self.inner.isolation
    }

    /// Whether commit or rollback already ran.
    pub async fn is_finished(&self) -> bool {
        self.lock().await.is_none()
    }

    /// Commits.
    ///
    /// # Errors
    ///
    /// Returns [`ProgrammerError::TransactionFinished`] when the transaction
    /// already ended, or the translated driver error.
    pub async fn commit(&self) -> Result<()> {
        let tx = self.take().await?;
        tx.commit().await.map_err(|e| self.inner.shared.translate(e))?;
        tracing::debug!(handle = %self.inner.shared.handle, "committed transaction");
        Ok(())
    }

    /// Rolls back.
    ///
    /// # Errors
    ///
    /// Returns [`ProgrammerError::TransactionFinished`] when the transaction
    /// already ended, or the translated driver error.
    pub async fn rollback(&self) -> Result<()> {
        let tx = self.take().await?;
        tx.rollback()
            .await
            .map_err(|e| self.inner.shared.translate(e))?;
        tracing::warn!(handle = %self.inner.shared.handle, "rolled back transaction");
        Ok(())
    }

    async fn take(&self) -> Result<Box<dyn DriverTransaction>> {
        self.lock()
            .await
            .take()
            .ok_or_else(|| ProgrammerError::TransactionFinished.into())
    }

    /// Runs raw SQL inside the transaction.
    pub fn raw(&self, sql: impl Into<String>) -> Raw<'_> {
        Raw::new(&self.inner.shared, sql.into()).on_transaction(self)
    }

    /// Runs `body` and commits, or rolls back when it fails or panics.
    pub(crate) async fn run<T, F, Fut>(self, body: F) -> Result<T>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match guarded(body(self.clone())).await {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback) = self.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(error)
            }
        }
    }

    /// Runs `body` inside a savepoint of this transaction. The savepoint is
    /// released when `body` succeeds and rolled back when it fails or
    /// panics; the outer transaction stays open either way.
    ///
    /// # Errors
    ///
    /// Returns the body's error, [`Error::TransactionPanicked`], or the
    /// error of the savepoint statements.
    pub async fn nested<T, F, Fut>(&self, body: F) -> Result<T>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let n = self.inner.savepoints.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("ferrent_sp_{n}");
        self.savepoint_statement(format!("SAVEPOINT {name}")).await?;
        match guarded(body(self.clone())).await {
            Ok(value) => {
                self.savepoint_statement(format!("RELEASE SAVEPOINT {name}"))
                    .await?;
                Ok(value)
            }
            Err(error) => {
                self.savepoint_statement(format!("ROLLBACK TO SAVEPOINT {name}"))
                    .await?;
                self.savepoint_statement(format!("RELEASE SAVEPOINT {name}"))
                    .await?;
                tracing::warn!(savepoint = %name, "rolled back savepoint");
                Err(error)
            }
        }
    }

    async fn savepoint_statement(&self, sql: String) -> Result<()> {
        let mut session = Session::new(&self.inner.shared);
        session.bind_transaction(self);
        session.execute(&Query::raw(sql, Vec::new())).await.map(|_| ())
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("handle", &self.inner.shared.handle)
            .field("isolation", &self.inner.isolation)
            .finish_non_exhaustive()
    }
}

/// Awaits `body`, turning a panic into [`Error::TransactionPanicked`].
async fn guarded<T>(body: impl Future<Output = Result<T>>) -> Result<T> {
    match AssertUnwindSafe(body).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::warn!(panic = %message, "transaction body panicked");
            Err(Error::TransactionPanicked(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_guarded_catches_panics() {
        let result: Result<()> = guarded(async { panic!("inside") }).await;
        assert!(matches!(result, Err(Error::TransactionPanicked(m)) if m == "inside"));
        let ok = guarded(async { Ok::<_, Error>(3) }).await;
        assert_eq!(ok.unwrap(), 3);
    }
}
