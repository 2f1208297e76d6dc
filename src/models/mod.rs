// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models mirroring backend resources.

pub mod account;
pub mod locale;
pub mod payment;
pub mod user;
pub mod wallet;

pub use account::{
    Account, AccountAccessRequest, AssignAccountRequest, GenerateTokenResponse, MessageResponse,
    Provider, UserToolAccount, ValidateAccessResponse,
};
pub use locale::{Language, LocalePreference};
pub use payment::{
    CreatePaymentRequest, ExchangeRate, Payment, PaymentMethod, PaymentMethodKind, PaymentStatus,
    ProofFile, SettlementCurrency, UploadedAsset,
};
pub use user::{AccessGrant, SignInRequest, SignInResponse, Session, User};
pub use wallet::{BalanceLevel, CreateWalletRequest, Wallet};
