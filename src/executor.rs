use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared handle over the transaction of a unit-of-work session.
///
/// Every repository participating in the same session clones this handle and
/// runs its statements on the one underlying transaction, so an order insert,
/// its line items and the stock decrements all commit or roll back together.
#[derive(Clone, Debug)]
pub struct Executor {
    pub tx: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl Executor {
    pub fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Takes the transaction out of the handle, leaving `None` behind.
    /// Only the session calls this, when committing or rolling back; any
    /// repository statement issued afterwards fails instead of silently
    /// running outside the transaction.
    pub(crate) async fn take_transaction(
        &self,
    ) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.tx.lock().await.take().ok_or(sqlx::Error::PoolClosed)
    }
}
