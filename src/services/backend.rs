// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend REST client.
//!
//! Handles:
//! - Auth (sign-in, logout, profile)
//! - Wallets, providers, payment methods, exchange rates
//! - Pending payment submission and proof uploads
//! - Tool account assignment, access validation, token generation

use crate::error::{ClientError, Result};
use crate::models::{
    AccountAccessRequest, AssignAccountRequest, CreatePaymentRequest, CreateWalletRequest,
    ExchangeRate, GenerateTokenResponse, MessageResponse, Payment, PaymentMethod, ProofFile,
    Provider, SignInRequest, SignInResponse, UploadedAsset, User, UserToolAccount,
    ValidateAccessResponse, Wallet,
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Everything the dashboard asks of the backend.
///
/// Implemented over HTTP by [`ApiClient`]; tests use the in-crate mock.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_in(&self, credentials: &SignInRequest) -> Result<SignInResponse>;
    async fn logout(&self, token: &str) -> Result<()>;
    async fn profile(&self, token: &str) -> Result<User>;

    async fn wallet(&self, token: &str, user_id: &str) -> Result<Wallet>;
    async fn create_wallet(&self, token: &str, user_id: &str) -> Result<Wallet>;

    async fn providers(&self, token: &str) -> Result<Vec<Provider>>;

    async fn payment_methods(&self, token: &str) -> Result<Vec<PaymentMethod>>;
    async fn exchange_rate(&self, token: &str, method_id: &str) -> Result<ExchangeRate>;
    async fn create_payment(&self, token: &str, request: &CreatePaymentRequest)
        -> Result<Payment>;
    async fn upload(&self, token: &str, file: ProofFile) -> Result<UploadedAsset>;

    async fn assign_account(
        &self,
        token: &str,
        request: &AssignAccountRequest,
    ) -> Result<UserToolAccount>;
    async fn validate_access(
        &self,
        token: &str,
        request: &AccountAccessRequest,
    ) -> Result<ValidateAccessResponse>;
    async fn generate_token(
        &self,
        token: &str,
        request: &AccountAccessRequest,
    ) -> Result<GenerateTokenResponse>;
    async fn my_accounts(&self, token: &str) -> Result<Vec<UserToolAccount>>;
    async fn deactivate_account(
        &self,
        token: &str,
        user_id: &str,
        account_id: &str,
    ) -> Result<MessageResponse>;
}

/// HTTP implementation of [`Backend`].
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Generic GET request with JSON response.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, token: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// POST a JSON body, optionally authenticated.
    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T> {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if status == 401 {
            tracing::debug!("Backend rejected bearer token (401)");
        }

        Err(ClientError::from_status(status, &body))
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        Self::check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Network(format!("JSON parse error: {}", e)))
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn sign_in(&self, credentials: &SignInRequest) -> Result<SignInResponse> {
        self.post_json("/auth/signin", credentials, None).await
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url("/auth/logout"))
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn profile(&self, token: &str) -> Result<User> {
        self.get_json("/auth/profile", token).await
    }

    async fn wallet(&self, token: &str, user_id: &str) -> Result<Wallet> {
        let path = format!("/wallets/{}", urlencoding::encode(user_id));
        self.get_json(&path, token).await
    }

    async fn create_wallet(&self, token: &str, user_id: &str) -> Result<Wallet> {
        let body = CreateWalletRequest {
            user_id: user_id.to_string(),
        };
        self.post_json("/wallets", &body, Some(token)).await
    }

    async fn providers(&self, token: &str) -> Result<Vec<Provider>> {
        self.get_json("/providers/find/all", token).await
    }

    async fn payment_methods(&self, token: &str) -> Result<Vec<PaymentMethod>> {
        self.get_json("/payment-methods", token).await
    }

    async fn exchange_rate(&self, token: &str, method_id: &str) -> Result<ExchangeRate> {
        let response = self
            .http
            .get(self.url("/payments/exchange-rate"))
            .bearer_auth(token)
            .query(&[("paymentMethodId", method_id)])
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check_response_json(response).await
    }

    async fn create_payment(
        &self,
        token: &str,
        request: &CreatePaymentRequest,
    ) -> Result<Payment> {
        self.post_json("/payments", request, Some(token)).await
    }

    async fn upload(&self, token: &str, file: ProofFile) -> Result<UploadedAsset> {
        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str(&file.content_type)
            .map_err(|e| ClientError::Validation(format!("Bad content type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("/storage/upload"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Upload failed: {}", e)))?;

        Self::check_response_json(response).await
    }

    async fn assign_account(
        &self,
        token: &str,
        request: &AssignAccountRequest,
    ) -> Result<UserToolAccount> {
        self.post_json("/user-accounts/assign", request, Some(token))
            .await
    }

    async fn validate_access(
        &self,
        token: &str,
        request: &AccountAccessRequest,
    ) -> Result<ValidateAccessResponse> {
        self.post_json("/user-accounts/validate-access", request, Some(token))
            .await
    }

    async fn generate_token(
        &self,
        token: &str,
        request: &AccountAccessRequest,
    ) -> Result<GenerateTokenResponse> {
        self.post_json("/user-accounts/generate-token", request, Some(token))
            .await
    }

    async fn my_accounts(&self, token: &str) -> Result<Vec<UserToolAccount>> {
        self.get_json("/user-accounts/my-accounts", token).await
    }

    async fn deactivate_account(
        &self,
        token: &str,
        user_id: &str,
        account_id: &str,
    ) -> Result<MessageResponse> {
        let path = format!(
            "/user-accounts/{}/{}",
            urlencoding::encode(user_id),
            urlencoding::encode(account_id)
        );
        let response = self
            .http
            .delete(self.url(&path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Self::check_response_json(response).await
    }
}
