//! Data access: transaction-bound repositories for the order workflow and
//! pool-based queries for everything read-only.

pub mod carts;
pub mod orders;
pub mod products;
pub mod users;

/// Wraps a data-integrity problem (e.g. an unknown status string stored in a
/// row) as a decode error so it surfaces through the storage taxonomy.
pub(crate) fn decode_err(message: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Decode(message.into().into())
}
