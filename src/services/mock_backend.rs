// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory backend for offline tests.
//! Only available in debug/test builds.
//!
//! Besides canned data it records how often each endpoint was called and
//! can hold a call in flight until the test releases it.

use crate::error::{ClientError, Result};
use crate::models::{
    Account, AccountAccessRequest, AccessGrant, AssignAccountRequest, CreatePaymentRequest,
    ExchangeRate, GenerateTokenResponse, MessageResponse, Payment, PaymentMethod, PaymentStatus,
    ProofFile, Provider, SignInRequest, SignInResponse, UploadedAsset, User, UserToolAccount,
    ValidateAccessResponse, Wallet,
};
use crate::services::backend::Backend;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Holds one call to an endpoint until released.
#[derive(Debug, Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Wait until the held call has reached the backend.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call complete.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct MockState {
    /// email -> (user, password)
    users: HashMap<String, (User, String)>,
    /// token -> user id
    tokens: HashMap<String, String>,
    wallets: HashMap<String, Wallet>,
    providers: Vec<Provider>,
    payment_methods: Vec<PaymentMethod>,
    payment_methods_fail: bool,
    exchange_rate: Option<Decimal>,
    payments_fail: bool,
    uploads_fail: bool,
    payments: Vec<CreatePaymentRequest>,
    accounts: Vec<UserToolAccount>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn user_for(&self, token: &str) -> Result<String> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(ClientError::Unauthorized)
    }
}

#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    calls: DashMap<&'static str, usize>,
    gates: DashMap<&'static str, Arc<Gate>>,
    offline: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Count the call, wait on its gate if one is set, then fail if offline.
    async fn pass(&self, endpoint: &'static str) -> Result<()> {
        *self.calls.entry(endpoint).or_insert(0) += 1;
        let gate = self.gates.remove(endpoint).map(|(_, gate)| gate);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::Network("connection refused".to_string()));
        }
        Ok(())
    }

    // ─── Test controls ───────────────────────────────────────────────────────

    /// Every call fails as unreachable while set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn add_user(&self, user: User, password: &str) {
        self.lock()
            .users
            .insert(user.email.clone(), (user, password.to_string()));
    }

    pub fn set_balance(&self, user_id: &str, balance: Decimal) {
        let mut state = self.lock();
        let id = format!("wallet-{}", user_id);
        state.wallets.insert(
            user_id.to_string(),
            Wallet {
                id,
                user_id: user_id.to_string(),
                balance,
                last_recharge: None,
            },
        );
    }

    pub fn set_providers(&self, providers: Vec<Provider>) {
        self.lock().providers = providers;
    }

    pub fn set_payment_methods(&self, methods: Vec<PaymentMethod>) {
        self.lock().payment_methods = methods;
    }

    pub fn fail_payment_methods(&self, fail: bool) {
        self.lock().payment_methods_fail = fail;
    }

    /// `None` makes the exchange-rate endpoint fail.
    pub fn set_exchange_rate(&self, rate: Option<Decimal>) {
        self.lock().exchange_rate = rate;
    }

    pub fn fail_payments(&self, fail: bool) {
        self.lock().payments_fail = fail;
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.lock().uploads_fail = fail;
    }

    pub fn add_account(&self, account: UserToolAccount) {
        self.lock().accounts.push(account);
    }

    /// Register a token for `user_id` as if issued by an earlier sign-in.
    pub fn issue_token(&self, user_id: &str) -> String {
        let token = format!("token-{}", user_id);
        self.lock()
            .tokens
            .insert(token.clone(), user_id.to_string());
        token
    }

    /// Make every later call with `token` fail with 401.
    pub fn revoke_token(&self, token: &str) {
        self.lock().tokens.remove(token);
    }

    pub fn payments(&self) -> Vec<CreatePaymentRequest> {
        self.lock().payments.clone()
    }

    pub fn accounts(&self) -> Vec<UserToolAccount> {
        self.lock().accounts.clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls.get(endpoint).map(|c| *c).unwrap_or(0)
    }

    /// Hold the next call to `endpoint` until [`Gate::release`].
    pub fn hold(&self, endpoint: &'static str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.insert(endpoint, Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn sign_in(&self, credentials: &SignInRequest) -> Result<SignInResponse> {
        self.pass("sign_in").await?;
        let mut state = self.lock();
        let user = match state.users.get(&credentials.email) {
            Some((user, password)) if *password == credentials.password => user.clone(),
            _ => {
                return Err(ClientError::Api {
                    status: 400,
                    message: "Invalid credentials".to_string(),
                })
            }
        };
        let token = format!("token-{}", user.id);
        state.tokens.insert(token.clone(), user.id.clone());
        Ok(SignInResponse {
            ok: true,
            user,
            access: AccessGrant {
                access_token: token,
                expires_at: None,
            },
        })
    }

    async fn logout(&self, token: &str) -> Result<()> {
        self.pass("logout").await?;
        self.lock().tokens.remove(token);
        Ok(())
    }

    async fn profile(&self, token: &str) -> Result<User> {
        self.pass("profile").await?;
        let state = self.lock();
        let user_id = state.user_for(token)?;
        state
            .users
            .values()
            .find(|(u, _)| u.id == user_id)
            .map(|(u, _)| u.clone())
            .ok_or(ClientError::Unauthorized)
    }

    async fn wallet(&self, token: &str, user_id: &str) -> Result<Wallet> {
        self.pass("wallet").await?;
        let state = self.lock();
        state.user_for(token)?;
        state
            .wallets
            .get(user_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("Wallet not found".to_string()))
    }

    async fn create_wallet(&self, token: &str, user_id: &str) -> Result<Wallet> {
        self.pass("create_wallet").await?;
        self.lock().user_for(token)?;
        self.set_balance(user_id, Decimal::ZERO);
        self.lock()
            .wallets
            .get(user_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("Wallet not found".to_string()))
    }

    async fn providers(&self, token: &str) -> Result<Vec<Provider>> {
        self.pass("providers").await?;
        let state = self.lock();
        state.user_for(token)?;
        Ok(state.providers.clone())
    }

    async fn payment_methods(&self, token: &str) -> Result<Vec<PaymentMethod>> {
        self.pass("payment_methods").await?;
        let state = self.lock();
        state.user_for(token)?;
        if state.payment_methods_fail {
            return Err(ClientError::Network("connection refused".to_string()));
        }
        Ok(state.payment_methods.clone())
    }

    async fn exchange_rate(&self, token: &str, _method_id: &str) -> Result<ExchangeRate> {
        self.pass("exchange_rate").await?;
        let state = self.lock();
        state.user_for(token)?;
        let rate = state
            .exchange_rate
            .ok_or_else(|| ClientError::Network("connection refused".to_string()))?;
        Ok(ExchangeRate {
            rate,
            currency: Some("VES".to_string()),
        })
    }

    async fn create_payment(
        &self,
        token: &str,
        request: &CreatePaymentRequest,
    ) -> Result<Payment> {
        self.pass("create_payment").await?;
        let mut state = self.lock();
        state.user_for(token)?;
        if state.payments_fail {
            return Err(ClientError::Api {
                status: 500,
                message: "Payment could not be recorded".to_string(),
            });
        }
        state.payments.push(request.clone());
        Ok(Payment {
            id: state.next_id("payment"),
            status: PaymentStatus::Pending,
        })
    }

    async fn upload(&self, token: &str, file: ProofFile) -> Result<UploadedAsset> {
        self.pass("upload").await?;
        let mut state = self.lock();
        state.user_for(token)?;
        if state.uploads_fail {
            return Err(ClientError::Api {
                status: 413,
                message: "File too large".to_string(),
            });
        }
        let id = state.next_id("proof");
        Ok(UploadedAsset {
            key: format!("proofs/{}-{}", id, file.file_name),
        })
    }

    async fn assign_account(
        &self,
        token: &str,
        request: &AssignAccountRequest,
    ) -> Result<UserToolAccount> {
        self.pass("assign_account").await?;
        let mut state = self.lock();
        state.user_for(token)?;

        let price = state
            .providers
            .iter()
            .find(|p| p.id == request.provider_id)
            .map(|p| p.final_price)
            .ok_or_else(|| ClientError::NotFound("Provider not found".to_string()))?;
        let wallet = state
            .wallets
            .get_mut(&request.user_id)
            .ok_or_else(|| ClientError::NotFound("Wallet not found".to_string()))?;
        if wallet.balance < price {
            return Err(ClientError::InsufficientBalance(
                "Saldo insuficiente".to_string(),
            ));
        }
        wallet.balance -= price;

        let account_id = state.next_id("account");
        let grant_id = state.next_id("grant");
        let grant = UserToolAccount {
            id: grant_id,
            user_id: request.user_id.clone(),
            account_id: account_id.clone(),
            provider_id: request.provider_id.clone(),
            active: true,
            expires_at: Some(
                request
                    .expires_at
                    .unwrap_or_else(|| Utc::now() + Duration::hours(24)),
            ),
            last_access_at: None,
            access_token: None,
            account: Some(Account {
                id: account_id.clone(),
                provider_id: request.provider_id.clone(),
                supported_users: 5,
                email: format!("{}@pool.jall.lat", account_id),
                available: true,
                active: true,
            }),
        };
        state.accounts.push(grant.clone());
        Ok(grant)
    }

    async fn validate_access(
        &self,
        token: &str,
        request: &AccountAccessRequest,
    ) -> Result<ValidateAccessResponse> {
        self.pass("validate_access").await?;
        let state = self.lock();
        state.user_for(token)?;

        let grant = state
            .accounts
            .iter()
            .find(|a| a.user_id == request.user_id && a.account_id == request.account_id)
            .cloned();
        let has_balance = state
            .wallets
            .get(&request.user_id)
            .is_some_and(|w| w.balance > Decimal::ZERO);

        Ok(match grant {
            Some(grant) if grant.is_live(Utc::now()) => ValidateAccessResponse {
                has_access: true,
                has_balance,
                message: "Access granted".to_string(),
                user_account: Some(grant),
            },
            Some(grant) => ValidateAccessResponse {
                has_access: false,
                has_balance,
                message: "Access expired".to_string(),
                user_account: Some(grant),
            },
            None => ValidateAccessResponse {
                has_access: false,
                has_balance,
                message: "No access to this account".to_string(),
                user_account: None,
            },
        })
    }

    async fn generate_token(
        &self,
        token: &str,
        request: &AccountAccessRequest,
    ) -> Result<GenerateTokenResponse> {
        self.pass("generate_token").await?;
        let mut state = self.lock();
        state.user_for(token)?;

        let access_token = state.next_id("launch");
        let grant = state
            .accounts
            .iter_mut()
            .find(|a| a.user_id == request.user_id && a.account_id == request.account_id)
            .ok_or_else(|| ClientError::NotFound("Account not found".to_string()))?;
        grant.access_token = Some(access_token.clone());
        grant.last_access_at = Some(Utc::now());
        let account = grant
            .account
            .clone()
            .ok_or_else(|| ClientError::NotFound("Account not found".to_string()))?;

        Ok(GenerateTokenResponse {
            token: access_token,
            account,
        })
    }

    async fn my_accounts(&self, token: &str) -> Result<Vec<UserToolAccount>> {
        self.pass("my_accounts").await?;
        let state = self.lock();
        let user_id = state.user_for(token)?;
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn deactivate_account(
        &self,
        token: &str,
        user_id: &str,
        account_id: &str,
    ) -> Result<MessageResponse> {
        self.pass("deactivate_account").await?;
        let mut state = self.lock();
        state.user_for(token)?;
        let grant = state
            .accounts
            .iter_mut()
            .find(|a| a.user_id == user_id && a.account_id == account_id)
            .ok_or_else(|| ClientError::NotFound("Account not found".to_string()))?;
        grant.active = false;
        Ok(MessageResponse {
            message: "Account deactivated".to_string(),
        })
    }
}
