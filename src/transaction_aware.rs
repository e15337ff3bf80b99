use async_trait::async_trait;

/// Error type for the transaction layer.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Transaction commit failed: {0}")]
    CommitFailed(String),

    #[error("Transaction rollback failed: {0}")]
    RollbackFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Result type for the transaction layer.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Callback interface for work that must wait for the transaction outcome.
///
/// Observers registered on a session are invoked once the transaction has
/// actually committed or rolled back. The checkout flow uses this to empty
/// the buyer's cart only after the order and its stock decrements are
/// durable; a rolled-back checkout leaves the cart untouched.
#[async_trait]
pub trait TransactionAware: Send + Sync {
    /// Called after a successful commit.
    async fn on_commit(&self) -> TransactionResult<()>;

    /// Called after a rollback.
    async fn on_rollback(&self) -> TransactionResult<()>;
}
