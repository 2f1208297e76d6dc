//! Payment methods, exchange rates, and recharge requests.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Currency a method requires the user to pay in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementCurrency {
    Usd,
    Local,
}

/// Payment channel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    PagoMovil,
    Binance,
    Crypto,
    Card,
    #[serde(other)]
    Other,
}

/// A payment method offered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
    pub kind: PaymentMethodKind,
    pub settlement_currency: SettlementCurrency,
    /// Bank, phone, holder, wallet address... as labelled pairs
    #[serde(default)]
    pub destination_account_info: BTreeMap<String, String>,
    pub active: bool,
}

impl PaymentMethod {
    pub fn settles_locally(&self) -> bool {
        self.settlement_currency == SettlementCurrency::Local
    }
}

/// Response of `GET /payments/exchange-rate`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    /// Local currency units per USD
    pub rate: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Body of `POST /payments`: a pending recharge awaiting manual verification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub user_id: String,
    pub payment_method_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_usd: Decimal,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount_local: Option<Decimal>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub exchange_rate: Option<Decimal>,
    pub points: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Other,
}

/// Payment record created by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub status: PaymentStatus,
}

/// Response of `POST /storage/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedAsset {
    #[serde(alias = "url")]
    pub key: String,
}

/// A receipt or screenshot to upload as payment evidence.
#[derive(Debug, Clone)]
pub struct ProofFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
