// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wallet view model.
//!
//! The balance is only ever read from the backend. Each fetched value is
//! tagged with the session epoch it was fetched under and is invisible once
//! that session ends.

use crate::error::{ClientError, Result};
use crate::models::Wallet;
use crate::services::backend::Backend;
use crate::services::poll::PollHandle;
use crate::services::session::SessionService;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
struct WalletSnapshot {
    epoch: u64,
    wallet: Wallet,
}

pub struct WalletService {
    backend: Arc<dyn Backend>,
    session: Arc<SessionService>,
    latest: watch::Sender<Option<WalletSnapshot>>,
}

impl WalletService {
    pub fn new(backend: Arc<dyn Backend>, session: Arc<SessionService>) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            backend,
            session,
            latest,
        }
    }

    /// Fetch the wallet, creating it on first use.
    pub async fn refresh(&self) -> Result<Wallet> {
        let ticket = self.session.ticket()?;

        let wallet = match self.backend.wallet(&ticket.token, &ticket.user_id).await {
            Ok(wallet) => wallet,
            Err(ClientError::NotFound(_)) => {
                tracing::info!(user_id = %ticket.user_id, "No wallet yet; creating one");
                self.backend
                    .create_wallet(&ticket.token, &ticket.user_id)
                    .await?
            }
            Err(ClientError::Unauthorized) => {
                self.session.invalidate(ticket.epoch);
                return Err(ClientError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        if !self.session.is_current(ticket.epoch) {
            tracing::debug!(user_id = %ticket.user_id, "Session changed; discarding wallet");
            return Err(ClientError::Stale);
        }

        self.latest.send_replace(Some(WalletSnapshot {
            epoch: ticket.epoch,
            wallet: wallet.clone(),
        }));
        Ok(wallet)
    }

    /// Last wallet fetched under the current session.
    pub fn current(&self) -> Option<Wallet> {
        let epoch = self.session.epoch();
        self.session.current()?;
        self.latest
            .borrow()
            .as_ref()
            .filter(|s| s.epoch == epoch)
            .map(|s| s.wallet.clone())
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.current().map(|w| w.balance)
    }

    /// Poll the wallet every `every` until the handle is dropped.
    pub fn start_polling(self: &Arc<Self>, every: Duration) -> PollHandle {
        let service = Arc::clone(self);
        PollHandle::spawn(every, move || {
            let service = Arc::clone(&service);
            async move {
                match service.refresh().await {
                    Ok(_) | Err(ClientError::NotAuthenticated) | Err(ClientError::Stale) => {}
                    Err(e) => tracing::warn!(error = %e, "Wallet poll failed"),
                }
            }
        })
    }
}
