use std::str::FromStr;

use config::ConfigError;
use serde::Deserialize;

use crate::error::SyncResult;

const ENV_PREFIX: &str = "CATALOG_SYNC_";

pub const SANDBOX_URL: &str = "https://sandbox-rest.avatax.com";
pub const PRODUCTION_URL: &str = "https://rest.avatax.com";

/// Largest page the catalog service will return
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Credentials and company of one catalog environment
#[derive(Debug, Deserialize, Clone)]
pub struct EnvironmentConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub company_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    pub source: EnvironmentConfig,
    pub target: EnvironmentConfig,
    pub page_size: u32,
    pub nexus_tax_type_group: String,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
    pub sync_nexus: bool,
    pub sync_items: bool,
    /// Compute and log the plan without issuing create/update calls
    pub dry_run: bool,
}

impl SyncConfig {
    pub fn from_env() -> SyncResult<Self> {
        let config = Self {
            source: EnvironmentConfig {
                base_url: var_or("SOURCE_URL", SANDBOX_URL),
                username: required("SOURCE_USERNAME")?,
                password: required("SOURCE_PASSWORD")?,
                company_id: parsed("SOURCE_COMPANY_ID", None)?,
            },
            target: EnvironmentConfig {
                base_url: var_or("TARGET_URL", PRODUCTION_URL),
                username: required("TARGET_USERNAME")?,
                password: required("TARGET_PASSWORD")?,
                company_id: parsed("TARGET_COMPANY_ID", None)?,
            },
            page_size: parsed("PAGE_SIZE", Some(MAX_PAGE_SIZE))?,
            nexus_tax_type_group: var_or("NEXUS_TAX_TYPE_GROUP", "LandedCost"),
            requests_per_second: parsed("REQUESTS_PER_SECOND", Some(10))?,
            timeout_secs: parsed("TIMEOUT_SECS", Some(30))?,
            sync_nexus: parsed("SYNC_NEXUS", Some(true))?,
            sync_items: parsed("SYNC_ITEMS", Some(true))?,
            dry_run: parsed("DRY_RUN", Some(false))?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, env) in [("source", &self.source), ("target", &self.target)] {
            if env.company_id <= 0 {
                return Err(ConfigError::Message(format!(
                    "{} company id must be positive, got {}",
                    name, env.company_id
                )));
            }
            if env.base_url.is_empty() {
                return Err(ConfigError::Message(format!("{} url is empty", name)));
            }
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Message(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.requests_per_second == 0 {
            return Err(ConfigError::Message(
                "requests per second must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Filter selecting the nexus group that is synchronized
    pub fn nexus_filter(&self) -> String {
        format!("nexusTaxTypeGroup EQ {}", self.nexus_tax_type_group)
    }
}

fn key(name: &str) -> String {
    format!("{}{}", ENV_PREFIX, name)
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(key(name)).unwrap_or_else(|_| default.to_string())
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(key(name)).map_err(|_| ConfigError::NotFound(key(name)))
}

fn parsed<T: FromStr>(name: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key(name)) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| {
            ConfigError::Message(format!("invalid value for {}: {} ({})", key(name), raw, e))
        }),
        Err(_) => default.ok_or_else(|| ConfigError::NotFound(key(name))),
    }
}
