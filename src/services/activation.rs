// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tool activation: rent a provider with wallet balance, open it, count down.
//!
//! The wallet balance is only a hint for what to show; the backend decides
//! whether an assignment is affordable.

use crate::error::{ClientError, Result};
use crate::models::{
    Account, AccountAccessRequest, AssignAccountRequest, Provider, UserToolAccount,
};
use crate::services::backend::Backend;
use crate::services::poll::PollHandle;
use crate::services::session::{SessionService, SessionTicket};
use crate::services::wallet::WalletService;
use crate::time_utils::{format_utc_rfc3339, Remaining};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What a provider card offers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderStatus {
    /// A live grant exists.
    Active {
        account: UserToolAccount,
        remaining: Remaining,
    },
    Activate {
        price: Decimal,
    },
    /// Balance below the price; leads into the recharge wizard.
    RechargeRequired {
        price: Decimal,
        balance: Decimal,
    },
}

/// Status of `provider` for a user holding `accounts` and `balance`.
pub fn evaluate(
    provider: &Provider,
    accounts: &[UserToolAccount],
    balance: Decimal,
    now: DateTime<Utc>,
) -> ProviderStatus {
    let live = accounts
        .iter()
        .filter(|a| a.provider_id == provider.id && a.is_live(now))
        .max_by_key(|a| a.expires_at);

    match live {
        Some(account) => ProviderStatus::Active {
            remaining: account
                .expires_at
                .map(|at| Remaining::until(at, now))
                .unwrap_or(Remaining::until(now, now)),
            account: account.clone(),
        },
        None if balance >= provider.final_price => ProviderStatus::Activate {
            price: provider.final_price,
        },
        None => ProviderStatus::RechargeRequired {
            price: provider.final_price,
            balance,
        },
    }
}

#[derive(Debug, Clone)]
pub enum ActivationOutcome {
    Activated(UserToolAccount),
    RechargeRequired { price: Decimal, balance: Decimal },
}

#[derive(Debug, Clone)]
pub enum ToolLaunch {
    Launch { url: String, account: Account },
    RechargeRequired,
}

#[derive(Debug, Clone)]
struct AccountsSnapshot {
    epoch: u64,
    accounts: Vec<UserToolAccount>,
}

/// Latest polled accounts. Invisible once the session they were fetched
/// under ends.
#[derive(Clone)]
pub struct AccountsFeed {
    session: Arc<SessionService>,
    latest: watch::Receiver<Option<AccountsSnapshot>>,
}

impl AccountsFeed {
    pub fn current(&self) -> Option<Vec<UserToolAccount>> {
        let epoch = self.session.epoch();
        self.session.current()?;
        self.latest
            .borrow()
            .as_ref()
            .filter(|s| s.epoch == epoch)
            .map(|s| s.accounts.clone())
    }

    /// Wait for the next applied poll result.
    pub async fn changed(&mut self) -> Result<()> {
        self.latest
            .changed()
            .await
            .map_err(|e| ClientError::Internal(e.into()))
    }
}

pub struct ActivationService {
    backend: Arc<dyn Backend>,
    session: Arc<SessionService>,
    wallet: Arc<WalletService>,
    tool_launch_url: String,
}

impl ActivationService {
    pub fn new(
        backend: Arc<dyn Backend>,
        session: Arc<SessionService>,
        wallet: Arc<WalletService>,
        tool_launch_url: String,
    ) -> Self {
        Self {
            backend,
            session,
            wallet,
            tool_launch_url,
        }
    }

    /// A 401 ends the session it was issued under.
    fn rejected(&self, ticket: &SessionTicket, error: ClientError) -> ClientError {
        if matches!(error, ClientError::Unauthorized) {
            self.session.invalidate(ticket.epoch);
        }
        error
    }

    async fn balance_hint(&self) -> Decimal {
        if let Some(balance) = self.wallet.balance() {
            return balance;
        }
        match self.wallet.refresh().await {
            Ok(wallet) => wallet.balance,
            Err(e) => {
                tracing::debug!(error = %e, "No wallet for balance hint");
                Decimal::ZERO
            }
        }
    }

    async fn refresh_wallet(&self) {
        if let Err(e) = self.wallet.refresh().await {
            tracing::debug!(error = %e, "Wallet refresh after activation failed");
        }
    }

    /// Active providers.
    pub async fn providers(&self) -> Result<Vec<Provider>> {
        let ticket = self.session.ticket()?;
        let providers = self
            .backend
            .providers(&ticket.token)
            .await
            .map_err(|e| self.rejected(&ticket, e))?;
        Ok(providers.into_iter().filter(|p| p.active).collect())
    }

    pub async fn my_accounts(&self) -> Result<Vec<UserToolAccount>> {
        let ticket = self.session.ticket()?;
        self.backend
            .my_accounts(&ticket.token)
            .await
            .map_err(|e| self.rejected(&ticket, e))
    }

    /// Every active provider with its current status.
    pub async fn statuses(&self) -> Result<Vec<(Provider, ProviderStatus)>> {
        let (providers, accounts) = tokio::try_join!(self.providers(), self.my_accounts())?;
        let balance = self.balance_hint().await;
        let now = Utc::now();
        Ok(providers
            .into_iter()
            .map(|p| {
                let status = evaluate(&p, &accounts, balance, now);
                (p, status)
            })
            .collect())
    }

    /// Rent `provider`. Skips the backend when the balance hint is short.
    pub async fn activate(&self, provider: &Provider) -> Result<ActivationOutcome> {
        let ticket = self.session.ticket()?;
        let balance = self.balance_hint().await;
        let price = provider.final_price;

        if balance < price {
            tracing::info!(provider_id = %provider.id, %balance, %price, "Balance too low to activate");
            return Ok(ActivationOutcome::RechargeRequired { price, balance });
        }

        let request = AssignAccountRequest {
            user_id: ticket.user_id.clone(),
            provider_id: provider.id.clone(),
            expires_at: None,
        };
        match self.backend.assign_account(&ticket.token, &request).await {
            Ok(account) => {
                tracing::info!(
                    provider_id = %provider.id,
                    account_id = %account.account_id,
                    expires_at = ?account.expires_at.map(format_utc_rfc3339),
                    "Tool activated"
                );
                self.refresh_wallet().await;
                Ok(ActivationOutcome::Activated(account))
            }
            Err(ClientError::InsufficientBalance(message)) => {
                tracing::info!(provider_id = %provider.id, %message, "Backend refused activation");
                Ok(ActivationOutcome::RechargeRequired { price, balance })
            }
            Err(e) => Err(self.rejected(&ticket, e)),
        }
    }

    /// Validate access to `account_id` and mint a launch URL for it.
    pub async fn open_tool(&self, account_id: &str) -> Result<ToolLaunch> {
        let ticket = self.session.ticket()?;
        let request = AccountAccessRequest {
            user_id: ticket.user_id.clone(),
            account_id: account_id.to_string(),
        };

        let access = self
            .backend
            .validate_access(&ticket.token, &request)
            .await
            .map_err(|e| self.rejected(&ticket, e))?;
        if !access.has_access {
            return Err(ClientError::AccessDenied(access.message));
        }
        if !access.has_balance {
            return Ok(ToolLaunch::RechargeRequired);
        }

        let generated = self
            .backend
            .generate_token(&ticket.token, &request)
            .await
            .map_err(|e| self.rejected(&ticket, e))?;
        self.refresh_wallet().await;

        Ok(ToolLaunch::Launch {
            url: format!(
                "{}?token={}",
                self.tool_launch_url,
                urlencoding::encode(&generated.token)
            ),
            account: generated.account,
        })
    }

    /// Re-fetch the user's accounts every `every` until the handle drops.
    pub fn start_polling(self: &Arc<Self>, every: Duration) -> (PollHandle, AccountsFeed) {
        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        let service = Arc::clone(self);
        let handle = PollHandle::spawn(every, move || {
            let service = Arc::clone(&service);
            let tx = Arc::clone(&tx);
            async move {
                let Ok(ticket) = service.session.ticket() else {
                    return;
                };
                match service.backend.my_accounts(&ticket.token).await {
                    Ok(accounts) if service.session.is_current(ticket.epoch) => {
                        tx.send_replace(Some(AccountsSnapshot {
                            epoch: ticket.epoch,
                            accounts,
                        }));
                    }
                    Ok(_) => {
                        tracing::debug!(
                            user_id = %ticket.user_id,
                            "Session changed; discarding accounts"
                        );
                    }
                    Err(e) => {
                        let e = service.rejected(&ticket, e);
                        tracing::warn!(error = %e, "Accounts poll failed");
                    }
                }
            }
        });
        let feed = AccountsFeed {
            session: Arc::clone(&self.session),
            latest: rx,
        };
        (handle, feed)
    }

    pub async fn deactivate(&self, account_id: &str) -> Result<String> {
        let ticket = self.session.ticket()?;
        let response = self
            .backend
            .deactivate_account(&ticket.token, &ticket.user_id, account_id)
            .await
            .map_err(|e| self.rejected(&ticket, e))?;
        Ok(response.message)
    }
}

/// Publish the time left until `expires_at` every `tick`.
pub fn start_countdown(
    expires_at: DateTime<Utc>,
    tick: Duration,
) -> (PollHandle, watch::Receiver<Remaining>) {
    let (tx, rx) = watch::channel(Remaining::until(expires_at, Utc::now()));
    let tx = Arc::new(tx);
    let handle = PollHandle::spawn(tick, move || {
        let tx = Arc::clone(&tx);
        async move {
            tx.send_replace(Remaining::until(expires_at, Utc::now()));
        }
    });
    (handle, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn provider(price: Decimal) -> Provider {
        Provider {
            id: "chatgpt".to_string(),
            type_provider: "chatgpt".to_string(),
            type_cost: "day".to_string(),
            cost: Decimal::new(20, 2),
            profit_margin: Decimal::new(10, 2),
            final_price: price,
            active: true,
            logo: None,
        }
    }

    fn grant(expires_at: DateTime<Utc>, active: bool) -> UserToolAccount {
        UserToolAccount {
            id: "g1".to_string(),
            user_id: "u1".to_string(),
            account_id: "a1".to_string(),
            provider_id: "chatgpt".to_string(),
            active,
            expires_at: Some(expires_at),
            last_access_at: None,
            access_token: None,
            account: None,
        }
    }

    #[test]
    fn test_evaluate_affordability() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let p = provider(Decimal::new(30, 2));

        assert_eq!(
            evaluate(&p, &[], Decimal::new(20, 2), now),
            ProviderStatus::RechargeRequired {
                price: Decimal::new(30, 2),
                balance: Decimal::new(20, 2),
            }
        );
        assert_eq!(
            evaluate(&p, &[], Decimal::new(30, 2), now),
            ProviderStatus::Activate {
                price: Decimal::new(30, 2)
            }
        );
    }

    #[test]
    fn test_evaluate_live_grant_wins() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let p = provider(Decimal::new(30, 2));
        let accounts = [grant(now + chrono::Duration::hours(2), true)];

        match evaluate(&p, &accounts, Decimal::ZERO, now) {
            ProviderStatus::Active { remaining, .. } => {
                assert_eq!(remaining.to_string(), "2h 0m 0s")
            }
            other => panic!("expected active, got {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_ignores_expired_and_inactive() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let p = provider(Decimal::new(30, 2));
        let accounts = [
            grant(now - chrono::Duration::seconds(1), true),
            grant(now + chrono::Duration::hours(1), false),
        ];
        assert!(matches!(
            evaluate(&p, &accounts, Decimal::ONE, now),
            ProviderStatus::Activate { .. }
        ));
    }
}
