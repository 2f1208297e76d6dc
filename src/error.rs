// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client error types with consistent user-facing messages.

use serde::Deserialize;

/// Client error type shared by every service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Authentication required")]
    Unauthorized,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Response arrived after its owner was reset")]
    Stale,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// Fallback message used when an error body carries no message.
    pub const GENERIC_HTTP_ERROR: &'static str = "HTTP error";

    /// Build an error from a non-2xx status and its raw body.
    ///
    /// The message is the body's `message` field (string, or first entry of
    /// a string array), defaulting to `HTTP error <status>`.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body)
            .unwrap_or_else(|| format!("{} {}", Self::GENERIC_HTTP_ERROR, status));

        match status {
            401 => ClientError::Unauthorized,
            404 => ClientError::NotFound(message),
            402 => ClientError::InsufficientBalance(message),
            _ if mentions_insufficient_balance(&message) => {
                ClientError::InsufficientBalance(message)
            }
            _ => ClientError::Api { status, message },
        }
    }

    /// True for failures that never reached the backend's business logic.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    /// True when the backend refused for lack of funds.
    pub fn is_insufficient_balance(&self) -> bool {
        matches!(self, ClientError::InsufficientBalance(_))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageField {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<MessageField>,
}

fn extract_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = match parsed.message? {
        MessageField::One(m) => m,
        MessageField::Many(list) => list.into_iter().next()?,
    };
    let message = message.trim().to_string();
    (!message.is_empty()).then_some(message)
}

fn mentions_insufficient_balance(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("insufficient") || lower.contains("saldo insuficiente")
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
