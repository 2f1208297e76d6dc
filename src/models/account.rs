//! Providers and rented tool accounts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A rentable AI tool (ChatGPT Plus, Google AI Ultra, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    /// Tool family, e.g. "chatgpt"
    pub type_provider: String,
    /// Billing period, e.g. "day"
    #[serde(default)]
    pub type_cost: String,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default)]
    pub profit_margin: Decimal,
    /// Price the user pays, in USD
    pub final_price: Decimal,
    pub active: bool,
    #[serde(default)]
    pub logo: Option<serde_json::Value>,
}

/// Shared upstream account behind a grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub provider_id: String,
    #[serde(default)]
    pub supported_users: u32,
    pub email: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub active: bool,
}

/// A user's time-boxed grant on a tool account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserToolAccount {
    pub id: String,
    pub user_id: String,
    pub account_id: String,
    pub provider_id: String,
    pub active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_access_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub account: Option<Account>,
}

impl UserToolAccount {
    /// Active and not yet expired at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.is_some_and(|at| at > now)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignAccountRequest {
    pub user_id: String,
    pub provider_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Body shared by validate-access and generate-token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAccessRequest {
    pub user_id: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAccessResponse {
    pub has_access: bool,
    pub has_balance: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_account: Option<UserToolAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateTokenResponse {
    pub token: String,
    pub account: Account,
}

/// Generic `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}
