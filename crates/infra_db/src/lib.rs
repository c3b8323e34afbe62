//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the credit ledger and the recurring obligation
//! engine, built on SQLx.
//!
//! # Architecture
//!
//! - `repositories` own the SQL and return plain row structs
//! - `adapters` implement the domain ports (`CreditStore`,
//!   `CustomerDirectory`, `ObligationStore`) on top of the repositories
//! - `pool` creates the connection pool and applies the embedded migrations
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresCreditStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/ledger")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresCreditStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use adapters::{PostgresCreditStore, PostgresCustomerDirectory, PostgresObligationStore};
