//! File-backed store durability across reopen

use openid_core::*;
use openid_store::*;
use std::sync::Arc;

#[test]
fn associations_and_auth_key_survive_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let now = SystemClock.now();
    let assoc = Association::new("durable", vec![5u8; 32], now, 3600, AssociationType::HmacSha256).unwrap();

    let key = {
        let store = FjallStore::open(temp.path(), StoreConfig::default()).unwrap();
        store.store_association("http://op.example/", &assoc).unwrap();
        store.auth_key().unwrap()
    };

    let reopened = FjallStore::open(temp.path(), StoreConfig::default()).unwrap();
    assert_eq!(reopened.auth_key().unwrap(), key);
    assert_eq!(
        reopened.get_association("http://op.example/", Some("durable")).unwrap(),
        Some(assoc)
    );
}

#[test]
fn consumed_nonce_stays_consumed_after_reopen() {
    let temp = tempfile::tempdir().unwrap();
    let nonce = Nonce::new("persisted-nonce");

    {
        let store = FjallStore::open(temp.path(), StoreConfig::default()).unwrap();
        store.store_nonce(&nonce).unwrap();
        store.store_nonce(&Nonce::new("unused")).unwrap();
        assert!(store.use_nonce(&nonce).unwrap());
    }

    let reopened = FjallStore::open(temp.path(), StoreConfig::default()).unwrap();
    assert!(!reopened.use_nonce(&nonce).unwrap());
    assert!(reopened.use_nonce(&Nonce::new("unused")).unwrap());
}

#[test]
fn cleanup_sweeps_expired_state() {
    let temp = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(10_000));
    let store = FjallStore::open_with_clock(
        temp.path(),
        StoreConfig { nonce_window_secs: 100 },
        clock.clone(),
    )
    .unwrap();

    let short = Association::new("short", vec![1u8; 20], 10_000, 50, AssociationType::HmacSha1).unwrap();
    let long = Association::new("long", vec![1u8; 20], 10_000, 5_000, AssociationType::HmacSha1).unwrap();
    store.store_association("http://a/", &short).unwrap();
    store.store_association("http://b/", &long).unwrap();
    store.store_nonce(&Nonce::new("n1")).unwrap();
    store.store_nonce(&Nonce::new("n2")).unwrap();

    clock.advance(101);
    assert_eq!(store.cleanup_associations().unwrap(), 1);
    assert_eq!(store.cleanup_nonces().unwrap(), 2);
    assert_eq!(store.association_count().unwrap(), 1);
    assert!(store.get_association("http://b/", None).unwrap().is_some());
}
