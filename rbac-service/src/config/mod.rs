use chrono::Duration;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config::{self as core_config, get_env, get_env_list, get_env_parsed};
use service_core::error::AppError;
use std::env;
use std::sync::Arc;

use crate::services::{Catalog, StaticCatalog, TokenSettings};

/// Minimum signing secret length accepted in production.
const MIN_PROD_SECRET_BYTES: usize = 32;

// Upper bounds keep every lifetime inside the range chrono can add to now.
const MAX_ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 60 * 24 * 365;
const MAX_REFRESH_TOKEN_EXPIRY_DAYS: i64 = 365 * 10;
const MAX_PASSWORD_RESET_EXPIRY_HOURS: i64 = 24 * 30;
const MAX_EMAIL_VERIFICATION_EXPIRY_DAYS: i64 = 365;

#[derive(Debug, Clone, Deserialize)]
pub struct RbacConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub jwt: JwtConfig,
    pub tokens: TokenLifetimeConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: Secret<String>,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenLifetimeConfig {
    /// 0 disables store-side expiry for refresh tokens.
    pub refresh_token_expiry_days: i64,
    pub password_reset_expiry_hours: i64,
    pub email_verification_expiry_days: i64,
    pub purge_interval_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    pub resources: Vec<String>,
    pub actions: Vec<String>,
}

impl RbacConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = RbacConfig {
            otlp_endpoint: env::var("OTLP_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| common_config.otlp_endpoint.clone()),
            log_level: get_env("LOG_LEVEL", Some(common_config.log_level.as_str()), is_prod)?,
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("rbac-service"), is_prod)?,
            mongodb: MongoConfig {
                uri: Secret::new(get_env("MONGODB_URI", None, is_prod)?),
                database: get_env("MONGODB_DATABASE", None, is_prod)?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env("JWT_SECRET", None, is_prod)?),
                access_token_expiry_minutes: get_env_parsed(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("60"),
                    is_prod,
                )?,
            },
            tokens: TokenLifetimeConfig {
                refresh_token_expiry_days: get_env_parsed(
                    "REFRESH_TOKEN_EXPIRY_DAYS",
                    Some("30"),
                    is_prod,
                )?,
                password_reset_expiry_hours: get_env_parsed(
                    "PASSWORD_RESET_TOKEN_EXPIRY_HOURS",
                    Some("24"),
                    is_prod,
                )?,
                email_verification_expiry_days: get_env_parsed(
                    "EMAIL_VERIFICATION_TOKEN_EXPIRY_DAYS",
                    Some("7"),
                    is_prod,
                )?,
                purge_interval_seconds: get_env_parsed(
                    "TOKEN_PURGE_INTERVAL_SECONDS",
                    Some("3600"),
                    is_prod,
                )?,
            },
            catalog: CatalogConfig {
                resources: get_env_list("CATALOG_RESOURCES", Some(""), false)?,
                actions: get_env_list("CATALOG_ACTIONS", Some(""), false)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let secret = self.jwt.secret.expose_secret();
        if secret.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must not be empty"
            )));
        }

        check_range(
            "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
            self.jwt.access_token_expiry_minutes,
            1,
            MAX_ACCESS_TOKEN_EXPIRY_MINUTES,
        )?;
        check_range(
            "REFRESH_TOKEN_EXPIRY_DAYS",
            self.tokens.refresh_token_expiry_days,
            0,
            MAX_REFRESH_TOKEN_EXPIRY_DAYS,
        )?;
        check_range(
            "PASSWORD_RESET_TOKEN_EXPIRY_HOURS",
            self.tokens.password_reset_expiry_hours,
            1,
            MAX_PASSWORD_RESET_EXPIRY_HOURS,
        )?;
        check_range(
            "EMAIL_VERIFICATION_TOKEN_EXPIRY_DAYS",
            self.tokens.email_verification_expiry_days,
            1,
            MAX_EMAIL_VERIFICATION_EXPIRY_DAYS,
        )?;

        if self.tokens.purge_interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_PURGE_INTERVAL_SECONDS must be greater than 0"
            )));
        }

        // In production, ensure stricter validation
        if self.environment == Environment::Prod {
            if secret.len() < MIN_PROD_SECRET_BYTES {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT_SECRET must be at least {} bytes in production",
                    MIN_PROD_SECRET_BYTES
                )));
            }

            if self.tokens.refresh_token_expiry_days == 0 {
                tracing::warn!("Refresh tokens never expire in production - consider setting REFRESH_TOKEN_EXPIRY_DAYS");
            }
        }

        Ok(())
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_token_ttl: Duration::minutes(self.jwt.access_token_expiry_minutes),
            refresh_token_ttl: match self.tokens.refresh_token_expiry_days {
                0 => None,
                days => Some(Duration::days(days)),
            },
            password_reset_ttl: Duration::hours(self.tokens.password_reset_expiry_hours),
            email_verification_ttl: Duration::days(self.tokens.email_verification_expiry_days),
        }
    }

    pub fn purge_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tokens.purge_interval_seconds)
    }

    /// Catalog built from `CATALOG_RESOURCES` / `CATALOG_ACTIONS`, if either is set.
    pub fn catalog(&self) -> Option<Arc<dyn Catalog>> {
        let catalog = StaticCatalog::new(
            self.catalog.resources.clone(),
            self.catalog.actions.clone(),
        );
        if catalog.is_empty() {
            None
        } else {
            Some(Arc::new(catalog))
        }
    }
}

fn check_range(name: &str, value: i64, min: i64, max: i64) -> Result<(), AppError> {
    if value < min || value > max {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be between {} and {}, got {}",
            name,
            min,
            max,
            value
        )));
    }
    Ok(())
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
