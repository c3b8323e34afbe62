//! Service configuration

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use core_kernel::{Currency, Timezone};
use domain_recurrence::{EngineSettings, SchedulerConfig};
use infra_db::DatabaseConfig;

use crate::error::ServiceError;

/// Prefix of every environment variable read by [`ServiceConfig::from_env`]
pub const ENV_PREFIX: &str = "LEDGER";

/// Worker and facade configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Fallback filter when `RUST_LOG` is unset
    pub log_level: String,
    /// ISO 4217 code of the ledger currency
    pub currency: String,
    /// IANA zone of the shops' calendar
    pub timezone: String,
    pub scheduler_period_secs: u64,
    pub run_on_start: bool,
    pub grace_days: u32,
    pub notification_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/ledger".to_string(),
            max_connections: 10,
            log_level: "info".to_string(),
            currency: "BDT".to_string(),
            timezone: "Asia/Dhaka".to_string(),
            scheduler_period_secs: 3600,
            run_on_start: false,
            grace_days: 7,
            notification_timeout_ms: 5000,
        }
    }
}

impl ServiceConfig {
    /// Loads `LEDGER_*` variables from the process environment
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::load(None)
    }

    /// Loads from an explicit variable map instead of the process environment
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ServiceError> {
        Self::load(Some(vars))
    }

    fn load(vars: Option<HashMap<String, String>>) -> Result<Self, ServiceError> {
        let defaults = Self::default();
        let config = config::Config::builder()
            .set_default("database_url", defaults.database_url)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("log_level", defaults.log_level)?
            .set_default("currency", defaults.currency)?
            .set_default("timezone", defaults.timezone)?
            .set_default("scheduler_period_secs", defaults.scheduler_period_secs)?
            .set_default("run_on_start", defaults.run_on_start)?
            .set_default("grace_days", i64::from(defaults.grace_days))?
            .set_default("notification_timeout_ms", defaults.notification_timeout_ms)?
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?;

        let loaded: Self = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects values the services cannot run with
    pub fn validate(&self) -> Result<(), ServiceError> {
        self.currency()?;
        self.timezone()?;
        if self.scheduler_period_secs == 0 {
            return Err(ServiceError::Config("scheduler_period_secs must be positive".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ServiceError::Config("max_connections must be positive".to_string()));
        }
        Ok(())
    }

    pub fn currency(&self) -> Result<Currency, ServiceError> {
        self.currency
            .parse()
            .map_err(|e| ServiceError::Config(format!("currency: {e}")))
    }

    pub fn timezone(&self) -> Result<Timezone, ServiceError> {
        self.timezone
            .parse()
            .map_err(|e| ServiceError::Config(format!("timezone: {e}")))
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.notification_timeout_ms)
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone()).max_connections(self.max_connections)
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ServiceError> {
        Ok(EngineSettings {
            grace_days: self.grace_days,
            timezone: self.timezone()?,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            period: Duration::from_secs(self.scheduler_period_secs),
            run_on_start: self.run_on_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = ServiceConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(config.currency().unwrap(), Currency::BDT);
        assert_eq!(config.timezone().unwrap().0, chrono_tz::Asia::Dhaka);
        assert_eq!(config.scheduler_config(), SchedulerConfig::default());
        assert_eq!(config.notification_timeout(), Duration::from_secs(5));
        assert_eq!(config.engine_settings().unwrap().grace_days, 7);
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = ServiceConfig::from_vars(vars(&[
            ("LEDGER_CURRENCY", "usd"),
            ("LEDGER_SCHEDULER_PERIOD_SECS", "60"),
            ("LEDGER_RUN_ON_START", "true"),
            ("LEDGER_GRACE_DAYS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.currency().unwrap(), Currency::USD);
        assert_eq!(config.scheduler_config().period, Duration::from_secs(60));
        assert!(config.scheduler_config().run_on_start);
        assert_eq!(config.grace_days, 3);
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let result = ServiceConfig::from_vars(vars(&[("LEDGER_TIMEZONE", "Mars/Olympus")]));
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_zero_period_rejected() {
        let config = ServiceConfig {
            scheduler_period_secs: 0,
            ..ServiceConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_config_carries_pool_size() {
        let config = ServiceConfig {
            max_connections: 4,
            ..ServiceConfig::default()
        };
        assert_eq!(config.database_config().max_connections, 4);
    }
}
