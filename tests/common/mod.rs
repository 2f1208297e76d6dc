// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use jall_client::config::Config;
use jall_client::error::{ClientError, Result};
use jall_client::models::{PaymentMethod, PaymentMethodKind, Provider, SettlementCurrency, User};
use jall_client::services::{GeoLocator, MemoryStore, MockBackend};
use jall_client::Dashboard;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const EMAIL: &str = "ana@example.com";
pub const PASSWORD: &str = "secret";
pub const USER_ID: &str = "u1";

/// Locator returning a fixed answer.
pub struct FixedLocator {
    region: Option<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl FixedLocator {
    #[allow(dead_code)]
    pub fn region(code: &str) -> Self {
        Self {
            region: Some(code.to_string()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn failing() -> Self {
        Self {
            region: None,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoLocator for FixedLocator {
    async fn country_code(&self) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClientError::Network("timed out".to_string()));
        }
        Ok(self.region.clone())
    }
}

#[allow(dead_code)]
pub struct TestEnv {
    pub backend: Arc<MockBackend>,
    pub store: Arc<MemoryStore>,
    pub locator: Arc<FixedLocator>,
    pub dashboard: Dashboard,
}

#[allow(dead_code)]
pub fn user() -> User {
    User {
        id: USER_ID.to_string(),
        email: EMAIL.to_string(),
        name: "Ana".to_string(),
        surname: "Pérez".to_string(),
        rol: "user".to_string(),
        status: "active".to_string(),
    }
}

#[allow(dead_code)]
pub fn provider(id: &str, price: Decimal) -> Provider {
    Provider {
        id: id.to_string(),
        type_provider: id.to_string(),
        type_cost: "day".to_string(),
        cost: price,
        profit_margin: Decimal::ZERO,
        final_price: price,
        active: true,
        logo: None,
    }
}

#[allow(dead_code)]
pub fn method(id: &str, kind: PaymentMethodKind, currency: SettlementCurrency) -> PaymentMethod {
    PaymentMethod {
        id: id.to_string(),
        name: id.to_string(),
        kind,
        settlement_currency: currency,
        destination_account_info: Default::default(),
        active: true,
    }
}

/// Pago Movil (local), Binance (USD), card (USD, disabled flow).
#[allow(dead_code)]
pub fn default_methods() -> Vec<PaymentMethod> {
    vec![
        method(
            "pago_movil",
            PaymentMethodKind::PagoMovil,
            SettlementCurrency::Local,
        ),
        method("binance", PaymentMethodKind::Binance, SettlementCurrency::Usd),
        method("card", PaymentMethodKind::Card, SettlementCurrency::Usd),
    ]
}

/// Offline dashboard over a mock backend, in-memory store, and fixed region.
#[allow(dead_code)]
pub fn create_test_env(locator: FixedLocator) -> TestEnv {
    create_test_env_with(Config::default(), locator)
}

#[allow(dead_code)]
pub fn create_test_env_with(config: Config, locator: FixedLocator) -> TestEnv {
    let backend = Arc::new(MockBackend::new());
    backend.add_user(user(), PASSWORD);
    backend.set_payment_methods(default_methods());
    backend.set_exchange_rate(Some(Decimal::from(590)));

    let store = Arc::new(MemoryStore::new());
    let locator = Arc::new(locator);
    let dashboard = Dashboard::new(config, backend.clone(), store.clone(), locator.clone());

    TestEnv {
        backend,
        store,
        locator,
        dashboard,
    }
}

/// Signed-in user in Venezuela with `balance` USD.
#[allow(dead_code)]
pub async fn signed_in_env(balance: Decimal) -> TestEnv {
    let env = create_test_env(FixedLocator::region("VE"));
    env.backend.set_balance(USER_ID, balance);
    env.dashboard.init().await;
    env.dashboard
        .session
        .sign_in(EMAIL, PASSWORD)
        .await
        .expect("sign in should succeed");
    env
}
