use std::fmt;

use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Figment(#[from] rocket::figment::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Service settings, read from `CoachFit.toml` and `COACHFIT_*` variables.
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default = "default_working_day_start")]
    pub working_day_start: u32,
    #[serde(default = "default_working_day_end")]
    pub working_day_end: u32,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    #[serde(default)]
    pub otlp_api_key: Option<String>,
    #[serde(default = "default_otlp_api_key_header")]
    pub otlp_api_key_header: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_database_url() -> String {
    "sqlite://coachfit.db?mode=rwc".to_string()
}

fn default_token_ttl_hours() -> i64 {
    24 * 7
}

fn default_max_connections() -> u32 {
    5
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_working_day_start() -> u32 {
    8
}

fn default_working_day_end() -> u32 {
    18
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_otlp_api_key_header() -> String {
    "x-honeycomb-team".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

impl AppConfig {
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("CoachFit.toml"))
            .merge(Env::prefixed("COACHFIT_"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "jwt_secret must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            )));
        }
        if self.token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid(
                "token_ttl_hours must be positive".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid(
                "bcrypt_cost must be between 4 and 31".to_string(),
            ));
        }
        if self.working_day_start >= self.working_day_end || self.working_day_end > 24 {
            return Err(ConfigError::Invalid(format!(
                "working day {}..{} is not a valid range of hours",
                self.working_day_start, self.working_day_end
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("max_connections", &self.max_connections)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("working_day_start", &self.working_day_start)
            .field("working_day_end", &self.working_day_end)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("otlp_endpoint", &self.otlp_endpoint)
            .field("environment", &self.environment)
            .finish()
    }
}
