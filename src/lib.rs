// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Jall AI client: the dashboard's state and flows without the UI.
//!
//! This crate provides session and locale bootstrap, the wallet view, the
//! recharge and feedback wizards, and tool activation against the Jall AI
//! backend.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use models::{LocalePreference, Session};
use services::{
    AccountsFeed, ActivationService, Backend, FeedbackController, FeedbackSink, GeoLocator,
    KeyValueStore, LocaleService, PollHandle, RechargeController, SessionService, WalletService,
};
use std::sync::Arc;

/// Shared dashboard state.
pub struct Dashboard {
    pub config: Config,
    pub backend: Arc<dyn Backend>,
    pub session: Arc<SessionService>,
    pub locale: Arc<LocaleService>,
    pub wallet: Arc<WalletService>,
    pub activation: Arc<ActivationService>,
}

impl Dashboard {
    pub fn new(
        config: Config,
        backend: Arc<dyn Backend>,
        store: Arc<dyn KeyValueStore>,
        locator: Arc<dyn GeoLocator>,
    ) -> Self {
        let session = Arc::new(SessionService::new(backend.clone(), store.clone()));
        let locale = Arc::new(LocaleService::new(store, locator, config.locale.clone()));
        let wallet = Arc::new(WalletService::new(backend.clone(), session.clone()));
        let activation = Arc::new(ActivationService::new(
            backend.clone(),
            session.clone(),
            wallet.clone(),
            config.tool_launch_url.clone(),
        ));

        Self {
            config,
            backend,
            session,
            locale,
            wallet,
            activation,
        }
    }

    /// Bootstrap session and locale concurrently.
    pub async fn init(&self) -> (Option<Session>, LocalePreference) {
        tokio::join!(self.session.init(), self.locale.init())
    }

    /// Poll the wallet at the configured interval. Drop the handle to stop.
    pub fn poll_wallet(&self) -> PollHandle {
        self.wallet.start_polling(self.config.wallet_poll_interval)
    }

    /// Poll the user's tool accounts at the same interval.
    pub fn poll_accounts(&self) -> (PollHandle, AccountsFeed) {
        self.activation.start_polling(self.config.wallet_poll_interval)
    }

    pub fn recharge(&self) -> RechargeController {
        RechargeController::new(
            self.backend.clone(),
            self.session.clone(),
            self.locale.clone(),
            self.wallet.clone(),
            self.config.recharge.clone(),
            self.config.support_whatsapp.clone(),
        )
    }

    pub fn feedback(&self, sink: Arc<dyn FeedbackSink>) -> FeedbackController {
        FeedbackController::new(sink)
    }

    /// Stop applying late results; the dashboard is going away.
    pub fn dispose(&self) {
        self.session.dispose();
    }
}
