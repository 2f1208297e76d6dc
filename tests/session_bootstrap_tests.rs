// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session restore/validation, sign-in, logout, and wallet visibility.

use jall_client::error::ClientError;
use jall_client::models::User;
use jall_client::services::storage::keys;
use jall_client::services::KeyValueStore;
use rust_decimal::Decimal;
use std::time::Duration;

mod common;
use common::{create_test_env, signed_in_env, user, FixedLocator, TestEnv, USER_ID};

/// Persist a session as a previous run would have.
fn seed_session(env: &TestEnv, user: &User) -> String {
    let token = env.backend.issue_token(&user.id);
    env.store.set(keys::TOKEN, &token).unwrap();
    env.store
        .set(keys::USER, &serde_json::to_string(user).unwrap())
        .unwrap();
    token
}

#[tokio::test]
async fn test_restore_validates_and_refreshes_snapshot() {
    let env = create_test_env(FixedLocator::region("VE"));
    let mut stale = user();
    stale.name = "Old".to_string();
    let token = seed_session(&env, &stale);

    let (session, _) = env.dashboard.init().await;
    let session = session.expect("session restored");
    assert_eq!(session.auth_token, token);
    assert_eq!(session.display_name, "Ana Pérez");
    assert_eq!(env.backend.call_count("profile"), 1);

    let stored: User = serde_json::from_str(&env.store.get(keys::USER).unwrap()).unwrap();
    assert_eq!(stored.name, "Ana");
}

#[tokio::test]
async fn test_partial_session_is_cleared() {
    let env = create_test_env(FixedLocator::region("VE"));
    env.store.set(keys::TOKEN, "token-u1").unwrap();

    let (session, _) = env.dashboard.init().await;
    assert!(session.is_none());
    assert!(env.store.get(keys::TOKEN).is_none());
    assert!(env.store.get(keys::USER).is_none());
    assert_eq!(env.backend.call_count("profile"), 0);
}

#[tokio::test]
async fn test_unparseable_snapshot_is_cleared() {
    let env = create_test_env(FixedLocator::region("VE"));
    env.store.set(keys::TOKEN, "token-u1").unwrap();
    env.store.set(keys::USER, "{not json").unwrap();

    assert!(env.dashboard.session.restore().is_none());
    assert!(env.store.get(keys::TOKEN).is_none());
    assert!(env.store.get(keys::USER).is_none());
}

#[tokio::test]
async fn test_rejected_token_clears_session() {
    let env = create_test_env(FixedLocator::region("VE"));
    let token = seed_session(&env, &user());
    env.backend.revoke_token(&token);

    let (session, _) = env.dashboard.init().await;
    assert!(session.is_none());
    assert!(env.dashboard.session.current().is_none());
    assert!(env.store.get(keys::TOKEN).is_none());
    assert!(env.store.get(keys::USER).is_none());
}

#[tokio::test]
async fn test_unreachable_backend_keeps_session() {
    let env = create_test_env(FixedLocator::region("VE"));
    let token = seed_session(&env, &user());
    env.backend.set_offline(true);

    let (session, _) = env.dashboard.init().await;
    assert_eq!(session.map(|s| s.auth_token), Some(token.clone()));
    assert_eq!(env.store.get(keys::TOKEN), Some(token));
}

#[tokio::test]
async fn test_sign_in_persists_both_keys() {
    let env = create_test_env(FixedLocator::region("VE"));
    let session = env
        .dashboard
        .session
        .sign_in(" ana@example.com ", common::PASSWORD)
        .await
        .unwrap();

    assert_eq!(session.user_id, USER_ID);
    assert_eq!(env.store.get(keys::TOKEN), Some(session.auth_token.clone()));
    let stored: User = serde_json::from_str(&env.store.get(keys::USER).unwrap()).unwrap();
    assert_eq!(stored.id, USER_ID);
}

#[tokio::test]
async fn test_invalid_credentials_never_reach_backend() {
    let env = create_test_env(FixedLocator::region("VE"));
    let err = env
        .dashboard
        .session
        .sign_in("not-an-email", "x")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    let err = env
        .dashboard
        .session
        .sign_in(common::EMAIL, "")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(env.backend.call_count("sign_in"), 0);
}

#[tokio::test]
async fn test_wrong_password_keeps_logged_out() {
    let env = create_test_env(FixedLocator::region("VE"));
    let err = env
        .dashboard
        .session
        .sign_in(common::EMAIL, "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid credentials");
    assert!(env.dashboard.session.current().is_none());
    assert!(env.store.get(keys::TOKEN).is_none());
}

#[tokio::test]
async fn test_logout_clears_storage_and_notifies_backend() {
    let env = signed_in_env(Decimal::from(3)).await;
    env.dashboard.wallet.refresh().await.unwrap();
    assert_eq!(env.dashboard.wallet.balance(), Some(Decimal::from(3)));

    env.dashboard.session.logout().await;
    assert!(env.dashboard.session.current().is_none());
    assert!(env.store.get(keys::TOKEN).is_none());
    assert!(env.store.get(keys::USER).is_none());
    assert_eq!(env.backend.call_count("logout"), 1);
    assert_eq!(env.dashboard.wallet.balance(), None);
}

#[tokio::test]
async fn test_missing_wallet_is_created() {
    let env = create_test_env(FixedLocator::region("VE"));
    env.dashboard
        .session
        .sign_in(common::EMAIL, common::PASSWORD)
        .await
        .unwrap();

    let wallet = env.dashboard.wallet.refresh().await.unwrap();
    assert_eq!(wallet.balance, Decimal::ZERO);
    assert_eq!(env.backend.call_count("create_wallet"), 1);

    env.dashboard.wallet.refresh().await.unwrap();
    assert_eq!(env.backend.call_count("create_wallet"), 1);
}

#[tokio::test]
async fn test_wallet_unauthorized_ends_session() {
    let env = signed_in_env(Decimal::ONE).await;
    let token = env.dashboard.session.current().unwrap().auth_token;
    env.backend.revoke_token(&token);

    let err = env.dashboard.wallet.refresh().await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
    assert!(env.dashboard.session.current().is_none());
    assert!(env.store.get(keys::TOKEN).is_none());
}

#[tokio::test]
async fn test_logout_during_wallet_poll_leaves_no_balance() {
    let env = signed_in_env(Decimal::from(12)).await;
    let gate = env.backend.hold("wallet");

    let poll = env.dashboard.poll_wallet();
    gate.entered().await;
    env.dashboard.session.logout().await;
    gate.release();

    // Let the held poll finish
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(env.dashboard.wallet.current().is_none());
    assert_eq!(env.dashboard.wallet.balance(), None);
    drop(poll);
}

#[tokio::test]
async fn test_late_wallet_after_relogin_is_discarded() {
    let env = signed_in_env(Decimal::from(12)).await;
    let gate = env.backend.hold("wallet");

    let refresh = tokio::spawn({
        let wallet = env.dashboard.wallet.clone();
        async move { wallet.refresh().await }
    });
    gate.entered().await;

    // Same user, new session: the token stays valid but the epoch moves on
    env.dashboard
        .session
        .sign_in(common::EMAIL, common::PASSWORD)
        .await
        .unwrap();
    gate.release();

    assert!(matches!(refresh.await.unwrap(), Err(ClientError::Stale)));
    assert!(env.dashboard.wallet.current().is_none());
}

#[tokio::test]
async fn test_dispose_hides_session_state() {
    let env = signed_in_env(Decimal::ONE).await;
    env.dashboard.wallet.refresh().await.unwrap();
    env.dashboard.dispose();

    assert!(env.dashboard.session.is_disposed());
    assert!(env.dashboard.wallet.current().is_none());
    assert!(matches!(
        env.dashboard.wallet.refresh().await,
        Err(ClientError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn test_logout_during_validation_keeps_session_cleared() {
    let env = create_test_env(FixedLocator::region("VE"));
    seed_session(&env, &user());
    let gate = env.backend.hold("profile");

    let init = tokio::spawn({
        let session = env.dashboard.session.clone();
        async move { session.init().await }
    });
    gate.entered().await;
    // Restored optimistically while validation is in flight
    assert!(env.dashboard.session.current().is_some());

    env.dashboard.session.logout().await;
    gate.release();

    assert!(init.await.unwrap().is_none());
    assert!(env.dashboard.session.current().is_none());
    assert!(env.store.get(keys::TOKEN).is_none());
    assert!(env.store.get(keys::USER).is_none());
    assert_eq!(env.backend.call_count("profile"), 1);
}
