//! Domain Adapters
//!
//! PostgreSQL implementations of the domain ports. Each adapter translates
//! between domain models and repository rows and turns `DatabaseError` into
//! `PortError`.
//!
//! ```rust,ignore
//! use infra_db::adapters::{PostgresCreditStore, PostgresObligationStore};
//! use std::sync::Arc;
//!
//! let credit: Arc<dyn CreditStore> = Arc::new(PostgresCreditStore::new(pool.clone()));
//! let obligations: Arc<dyn ObligationStore> = Arc::new(PostgresObligationStore::new(pool));
//! ```

pub mod credit;
pub mod obligation;

pub use credit::{PostgresCreditStore, PostgresCustomerDirectory};
pub use obligation::PostgresObligationStore;

use rust_decimal::Decimal;
use sqlx::PgPool;
use std::fmt::Display;
use std::str::FromStr;

use core_kernel::{Currency, HealthCheckResult, Money};

use crate::error::DatabaseError;

/// Parses a stored enum column back into its domain type
pub(crate) fn decode<T>(column: &str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| DatabaseError::CorruptRow(format!("{column}: {e}")))
}

pub(crate) fn money(amount: Decimal, currency: &str) -> Result<Money, DatabaseError> {
    let currency: Currency = decode("currency", currency.trim())?;
    Ok(Money::new(amount, currency))
}

/// `SELECT 1` round trip, timed
pub(crate) async fn ping(pool: &PgPool, adapter_id: &str) -> HealthCheckResult {
    let start = std::time::Instant::now();
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await;
    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(_) => HealthCheckResult::healthy(adapter_id, latency_ms),
        Err(e) => HealthCheckResult::unhealthy(adapter_id, latency_ms, format!("Database error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_from_columns() {
        let amount = money(dec!(1500), "BDT").unwrap();
        assert_eq!(amount, Money::new(dec!(1500), Currency::BDT));
    }

    #[test]
    fn test_unknown_currency_is_corrupt() {
        assert!(matches!(money(dec!(1), "XXX"), Err(DatabaseError::CorruptRow(_))));
    }
}
