// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Language and region resolution.

use jall_client::models::Language;
use jall_client::services::storage::keys;
use jall_client::services::KeyValueStore;

mod common;
use common::{create_test_env, FixedLocator};

#[tokio::test]
async fn test_persisted_choice_beats_region() {
    let env = create_test_env(FixedLocator::region("VE"));
    env.store.set(keys::LANGUAGE, "en").unwrap();

    let (_, locale) = env.dashboard.init().await;
    assert_eq!(locale.language, Language::En);
    assert!(locale.user_chosen);
    assert_eq!(locale.region_code.as_deref(), Some("VE"));
    assert!(locale.is_local_currency_region);
}

#[tokio::test]
async fn test_region_infers_language_and_is_persisted() {
    let env = create_test_env(FixedLocator::region("US"));

    let (_, locale) = env.dashboard.init().await;
    assert_eq!(locale.language, Language::En);
    assert!(!locale.user_chosen);
    assert!(!locale.is_local_currency_region);
    assert_eq!(env.store.get(keys::COUNTRY).as_deref(), Some("US"));
    // Inferred languages are not stored as a choice
    assert!(env.store.get(keys::LANGUAGE).is_none());
}

#[tokio::test]
async fn test_stored_region_skips_lookup() {
    let env = create_test_env(FixedLocator::region("US"));
    env.store.set(keys::COUNTRY, "MX").unwrap();

    let (_, locale) = env.dashboard.init().await;
    assert_eq!(locale.language, Language::Es);
    assert_eq!(locale.region_code.as_deref(), Some("MX"));
    assert!(!locale.is_local_currency_region);
    assert_eq!(env.locator.calls(), 0);
}

#[tokio::test]
async fn test_failed_lookup_uses_fallback() {
    let env = create_test_env(FixedLocator::failing());

    let (_, locale) = env.dashboard.init().await;
    assert_eq!(locale.language, Language::Es);
    assert_eq!(locale.region_code, None);
    assert!(!locale.is_local_currency_region);
    assert!(env.store.get(keys::COUNTRY).is_none());
    assert_eq!(env.locator.calls(), 1);
}

#[tokio::test]
async fn test_set_language_persists_and_publishes() {
    let env = create_test_env(FixedLocator::region("VE"));
    env.dashboard.init().await;
    let mut updates = env.dashboard.locale.subscribe();

    env.dashboard.locale.set_language(Language::En).unwrap();
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().language, Language::En);
    assert_eq!(env.store.get(keys::LANGUAGE).as_deref(), Some("en"));

    // A later bootstrap keeps the explicit choice
    let (_, locale) = env.dashboard.init().await;
    assert_eq!(locale.language, Language::En);
}
