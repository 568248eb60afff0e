//! API configuration
//!
//! Values come from `API_`-prefixed environment variables layered over the
//! defaults below. `DATABASE_URL` is accepted when `API_DATABASE_URL` is unset.

use std::time::Duration;

use serde::Deserialize;

use infra_db::DatabaseConfig;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Deployment environment; `production` switches logs to JSON
    pub app_env: String,
    /// Initial log filter
    pub log_level: String,
    /// Page size used when a request omits the limit or exceeds the maximum
    pub paging_limit_default: u32,
    /// Largest page size honored as given
    pub paging_limit_max: u32,
    /// Whole-request budget for posting a payment
    pub payment_timeout_ms: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_idle_timeout_secs: u64,
    pub db_max_lifetime_secs: u64,
    pub db_acquire_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            database_url: "postgres://localhost/billing".to_string(),
            app_env: "development".to_string(),
            log_level: "info".to_string(),
            paging_limit_default: 10,
            paging_limit_max: 100,
            payment_timeout_ms: 3000,
            db_max_connections: 20,
            db_min_connections: 5,
            db_idle_timeout_secs: 300,
            db_max_lifetime_secs: 1800,
            db_acquire_timeout_secs: 5,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true));

        if std::env::var_os("API_DATABASE_URL").is_none() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                builder = builder.set_override("database_url", url)?;
            }
        }

        builder.build()?.try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }

    /// Applies the paging policy to a requested limit
    ///
    /// A missing, zero or oversized limit falls back to the default.
    pub fn clamp_limit(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(limit) if limit > 0 && limit <= self.paging_limit_max => limit,
            _ => self.paging_limit_default,
        }
    }

    /// Pool settings for the storage adapter
    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database_url)
            .max_connections(self.db_max_connections)
            .min_connections(self.db_min_connections)
            .acquire_timeout(Duration::from_secs(self.db_acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(self.db_idle_timeout_secs))
            .max_lifetime(Duration::from_secs(self.db_max_lifetime_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.server_addr(), "0.0.0.0:8081");
        assert_eq!(config.payment_timeout(), Duration::from_secs(3));
        assert!(!config.is_production());
    }

    #[test]
    fn test_limit_clamping() {
        let config = ApiConfig::default();
        assert_eq!(config.clamp_limit(None), 10);
        assert_eq!(config.clamp_limit(Some(0)), 10);
        assert_eq!(config.clamp_limit(Some(1)), 1);
        assert_eq!(config.clamp_limit(Some(100)), 100);
        assert_eq!(config.clamp_limit(Some(101)), 10);
    }
}
