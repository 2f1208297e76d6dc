//! Wallet model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Backend-held balance record. The client never mutates the balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    /// Balance in USD
    pub balance: Decimal,
    #[serde(default)]
    pub last_recharge: Option<DateTime<Utc>>,
}

/// Coarse balance health, as shown on the balance card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceLevel {
    Healthy,
    Moderate,
    Low,
}

impl Wallet {
    pub fn level(&self) -> BalanceLevel {
        if self.balance >= Decimal::from(10) {
            BalanceLevel::Healthy
        } else if self.balance >= Decimal::from(2) {
            BalanceLevel::Moderate
        } else {
            BalanceLevel::Low
        }
    }

    /// Balance expressed in points.
    pub fn points(&self, points_per_usd: u64) -> u64 {
        use rust_decimal::prelude::ToPrimitive;

        (self.balance * Decimal::from(points_per_usd))
            .floor()
            .to_u64()
            .unwrap_or(0)
    }
}

/// Body of `POST /wallets`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub user_id: String,
}
