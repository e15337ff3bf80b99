//! Storefront backend with manual payment verification.
//!
//! A thin axum surface over a transactional order workflow on PostgreSQL:
//! checkout drains the buyer's server-side cart into an order plus stock
//! decrements in a single transaction, and status changes follow an explicit
//! state machine (cancellation restores stock). Transaction handling is
//! built on the unit-of-work pattern so every repository involved in an
//! operation shares one transaction and post-commit observers run only once
//! the data is durable.

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod models;
pub mod order_number;
pub mod orders;
pub mod repositories;
pub mod transaction_aware;
pub mod unit_of_work;

pub use error::AppError;
pub use executor::Executor;
pub use transaction_aware::{TransactionAware, TransactionError, TransactionResult};
pub use unit_of_work::{
    PostgresUnitOfWork, PostgresUnitOfWorkSession, UnitOfWork, UnitOfWorkSession,
};
