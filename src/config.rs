// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! Recharge policy and locale defaults live here as named values so the
//! wizard never hard-codes business constants.

use crate::models::{Language, PaymentMethodKind};
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Minimum recharge, in USD.
pub const DEFAULT_MIN_RECHARGE_USD: i64 = 2;
/// Largest single recharge, in USD.
pub const DEFAULT_MAX_RECHARGE_USD: i64 = 10_000;
/// 100 points = $1 USD.
pub const POINTS_PER_USD: u64 = 100;
/// One day of service costs 30 points ($0.30).
pub const POINTS_PER_DAY: u64 = 30;
/// Local currency units per USD when no live rate is available.
pub const FALLBACK_EXCHANGE_RATE: i64 = 590;

/// Rules the recharge wizard enforces before any request is made.
#[derive(Debug, Clone)]
pub struct RechargePolicy {
    pub min_amount_usd: Decimal,
    pub max_amount_usd: Decimal,
    pub points_per_usd: u64,
    pub points_per_day: u64,
    pub fallback_exchange_rate: Decimal,
    /// Method kinds whose flow is currently switched off.
    pub disabled_kinds: Vec<PaymentMethodKind>,
}

impl Default for RechargePolicy {
    fn default() -> Self {
        Self {
            min_amount_usd: Decimal::from(DEFAULT_MIN_RECHARGE_USD),
            max_amount_usd: Decimal::from(DEFAULT_MAX_RECHARGE_USD),
            points_per_usd: POINTS_PER_USD,
            points_per_day: POINTS_PER_DAY,
            fallback_exchange_rate: Decimal::from(FALLBACK_EXCHANGE_RATE),
            disabled_kinds: vec![PaymentMethodKind::Card],
        }
    }
}

/// Locale inference settings.
#[derive(Debug, Clone)]
pub struct LocaleConfig {
    /// Used when geolocation fails and the user never chose.
    pub fallback_language: Language,
    /// Regions that settle in local currency.
    pub local_currency_regions: Vec<String>,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            fallback_language: Language::Es,
            local_currency_regions: vec!["VE".to_string()],
        }
    }
}

/// Client configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, without trailing slash
    pub api_base_url: String,
    /// IP geolocation endpoint
    pub geolocation_url: String,
    /// JSON file backing durable key-value storage
    pub storage_path: PathBuf,
    /// Where a generated tool token is redeemed
    pub tool_launch_url: String,
    /// WhatsApp number for manual payment reports
    pub support_whatsapp: String,
    pub wallet_poll_interval: Duration,
    pub countdown_tick: Duration,
    pub recharge: RechargePolicy,
    pub locale: LocaleConfig,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            geolocation_url: "https://ipapi.co/json/".to_string(),
            storage_path: PathBuf::from(".jall/storage.json"),
            tool_launch_url: "https://gpt.jall.lat/".to_string(),
            support_whatsapp: "584121234567".to_string(),
            wallet_poll_interval: Duration::from_secs(5),
            countdown_tick: Duration::from_secs(1),
            recharge: RechargePolicy::default(),
            locale: LocaleConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let min_amount_usd = match env::var("JALL_MIN_RECHARGE_USD") {
            Ok(raw) => Decimal::from_str(raw.trim())
                .map_err(|_| ConfigError::Invalid("JALL_MIN_RECHARGE_USD", raw.clone()))?,
            Err(_) => defaults.recharge.min_amount_usd,
        };
        if min_amount_usd <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "JALL_MIN_RECHARGE_USD",
                min_amount_usd.to_string(),
            ));
        }

        let max_amount_usd = match env::var("JALL_MAX_RECHARGE_USD") {
            Ok(raw) => Decimal::from_str(raw.trim())
                .map_err(|_| ConfigError::Invalid("JALL_MAX_RECHARGE_USD", raw.clone()))?,
            Err(_) => defaults.recharge.max_amount_usd,
        };
        if max_amount_usd < min_amount_usd {
            return Err(ConfigError::Invalid(
                "JALL_MAX_RECHARGE_USD",
                max_amount_usd.to_string(),
            ));
        }

        let wallet_poll_secs: u64 = env::var("JALL_WALLET_POLL_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        Ok(Self {
            api_base_url: env::var("JALL_API_URL")
                .unwrap_or(defaults.api_base_url)
                .trim_end_matches('/')
                .to_string(),
            geolocation_url: env::var("JALL_GEOLOCATION_URL").unwrap_or(defaults.geolocation_url),
            storage_path: env::var("JALL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_path),
            tool_launch_url: env::var("JALL_TOOL_LAUNCH_URL").unwrap_or(defaults.tool_launch_url),
            support_whatsapp: env::var("JALL_SUPPORT_WHATSAPP")
                .unwrap_or(defaults.support_whatsapp),
            wallet_poll_interval: Duration::from_secs(wallet_poll_secs.max(1)),
            countdown_tick: defaults.countdown_tick,
            recharge: RechargePolicy {
                min_amount_usd,
                max_amount_usd,
                ..defaults.recharge
            },
            locale: defaults.locale,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
