use anyhow::{bail, Context, Result};
use bigdecimal::BigDecimal;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::domain::CouponPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Required unless the server runs on the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Without a gateway URL, sessions are opened by the local sandbox.
    pub payment_gateway_url: Option<String>,
    pub payment_gateway_key: Option<String>,
    pub payment_webhook_secret: String,
    pub admin_api_key: String,
    pub coupon_max_percentage: i32,
    pub coupon_min_validity_hours: i64,
    pub referral_reward_amount: BigDecimal,
    pub log_format: LogFormat,
}

/// Business policy values handed to the services.
#[derive(Debug, Clone)]
pub struct Settings {
    pub coupon_max_percentage: i32,
    pub coupon_min_validity_hours: i64,
    pub referral_reward_amount: BigDecimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coupon_max_percentage: 70,
            coupon_min_validity_hours: 12,
            referral_reward_amount: BigDecimal::from(100),
        }
    }
}

impl Settings {
    pub fn coupon_policy(&self) -> CouponPolicy {
        CouponPolicy {
            max_percentage: self.coupon_max_percentage,
            min_validity: chrono::Duration::hours(self.coupon_min_validity_hours),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so parsing is testable without
    /// touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };

        let config = Config {
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            payment_gateway_url: lookup("PAYMENT_GATEWAY_URL").filter(|v| !v.trim().is_empty()),
            payment_gateway_key: lookup("PAYMENT_GATEWAY_KEY").filter(|v| !v.trim().is_empty()),
            payment_webhook_secret: required("PAYMENT_WEBHOOK_SECRET")?,
            admin_api_key: required("ADMIN_API_KEY")?,
            coupon_max_percentage: parse_or(&lookup, "COUPON_MAX_PERCENTAGE", 70)?,
            coupon_min_validity_hours: parse_or(&lookup, "COUPON_MIN_VALIDITY_HOURS", 12)?,
            referral_reward_amount: parse_or(
                &lookup,
                "REFERRAL_REWARD_AMOUNT",
                BigDecimal::from(100),
            )?,
            log_format: match lookup("LOG_FORMAT").as_deref().map(str::trim) {
                None | Some("") | Some("pretty") => LogFormat::Pretty,
                Some("json") => LogFormat::Json,
                Some(other) => bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
            },
        };

        if let Some(url) = &config.payment_gateway_url {
            url::Url::parse(url).context("PAYMENT_GATEWAY_URL is not a valid URL")?;
            if config.payment_gateway_key.is_none() {
                bail!("PAYMENT_GATEWAY_KEY must be set when PAYMENT_GATEWAY_URL is set");
            }
        }
        if !(1..=100).contains(&config.coupon_max_percentage) {
            bail!("COUPON_MAX_PERCENTAGE must be between 1 and 100");
        }
        if config.referral_reward_amount <= BigDecimal::from(0) {
            bail!("REFERRAL_REWARD_AMOUNT must be positive");
        }

        Ok(config)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            coupon_max_percentage: self.coupon_max_percentage,
            coupon_min_validity_hours: self.coupon_min_validity_hours,
            referral_reward_amount: self.referral_reward_amount.clone(),
        }
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set (or run with --in-memory)")
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        _ => Ok(default),
    }
}
