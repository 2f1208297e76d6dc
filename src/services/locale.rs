// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Locale/region resolver.
//!
//! Language precedence: explicit user choice > inference from the detected
//! region > configured fallback. The region is looked up once by IP and
//! persisted; lookups are best effort and never retried.

use crate::config::LocaleConfig;
use crate::error::{ClientError, Result};
use crate::models::{Language, LocalePreference};
use crate::services::storage::{keys, KeyValueStore};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Region codes whose default language is Spanish.
pub const SPANISH_SPEAKING_REGIONS: &[&str] = &[
    "VE", "ES", "MX", "AR", "CO", "PE", "CL", "EC", "GT", "CU", "BO", "DO", "HN", "PY", "SV", "NI",
    "CR", "PA", "UY", "PR", "GQ",
];

/// Default language for a region.
pub fn infer_language(region_code: &str) -> Language {
    if SPANISH_SPEAKING_REGIONS.contains(&region_code) {
        Language::Es
    } else {
        Language::En
    }
}

/// Best-effort IP geolocation.
#[async_trait]
pub trait GeoLocator: Send + Sync {
    /// ISO country code of the caller, if the service knows it.
    async fn country_code(&self) -> Result<Option<String>>;
}

/// ipapi.co-compatible locator.
pub struct IpApiLocator {
    http: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct IpApiResponse {
    country_code: Option<String>,
}

impl IpApiLocator {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn country_code(&self) -> Result<Option<String>> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, &body));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("JSON parse error: {}", e)))?;

        Ok(body
            .country_code
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty()))
    }
}

pub struct LocaleService {
    store: Arc<dyn KeyValueStore>,
    locator: Arc<dyn GeoLocator>,
    config: LocaleConfig,
    state: watch::Sender<LocalePreference>,
}

impl LocaleService {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        locator: Arc<dyn GeoLocator>,
        config: LocaleConfig,
    ) -> Self {
        let (state, _) = watch::channel(LocalePreference {
            language: config.fallback_language,
            region_code: None,
            is_local_currency_region: false,
            user_chosen: false,
        });
        Self {
            store,
            locator,
            config,
            state,
        }
    }

    /// Resolve the locale from storage, detecting the region if unknown.
    pub async fn init(&self) -> LocalePreference {
        let saved_language = self
            .store
            .get(keys::LANGUAGE)
            .and_then(|raw| raw.parse::<Language>().ok());
        let saved_region = self.store.get(keys::COUNTRY).filter(|c| !c.is_empty());

        self.state.send_modify(|pref| {
            if let Some(language) = saved_language {
                pref.language = language;
                pref.user_chosen = true;
            }
        });

        if let Some(region) = saved_region {
            self.apply_region(&region);
            return self.preference();
        }

        match self.locator.country_code().await {
            Ok(Some(region)) => {
                tracing::info!(region = %region, "Detected region");
                if let Err(e) = self.store.set(keys::COUNTRY, &region) {
                    tracing::warn!(error = %e, "Failed to persist region");
                }
                self.apply_region(&region);
            }
            Ok(None) => {
                tracing::info!("Region lookup returned no country; using fallback language");
                self.apply_fallback();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Region lookup failed; using fallback language");
                self.apply_fallback();
            }
        }

        self.preference()
    }

    /// Explicit user choice. Persisted and never overridden by inference.
    pub fn set_language(&self, language: Language) -> Result<()> {
        self.state.send_modify(|pref| {
            pref.language = language;
            pref.user_chosen = true;
        });
        self.store.set(keys::LANGUAGE, language.code())
    }

    pub fn preference(&self) -> LocalePreference {
        self.state.borrow().clone()
    }

    pub fn language(&self) -> Language {
        self.state.borrow().language
    }

    pub fn is_local_currency_region(&self) -> bool {
        self.state.borrow().is_local_currency_region
    }

    pub fn subscribe(&self) -> watch::Receiver<LocalePreference> {
        self.state.subscribe()
    }

    fn apply_region(&self, region: &str) {
        let is_local = self
            .config
            .local_currency_regions
            .iter()
            .any(|r| r.eq_ignore_ascii_case(region));
        self.state.send_modify(|pref| {
            pref.region_code = Some(region.to_string());
            pref.is_local_currency_region = is_local;
            if !pref.user_chosen {
                pref.language = infer_language(region);
            }
        });
    }

    fn apply_fallback(&self) {
        let fallback = self.config.fallback_language;
        self.state.send_modify(|pref| {
            if !pref.user_chosen {
                pref.language = fallback;
            }
        });
    }
}
