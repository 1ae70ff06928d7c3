//! Store contract tests, run against every stateful backend

use openid_core::*;
use openid_store::*;
use std::sync::Arc;

const URL: &str = "http://op.example.com/server";
const START: u64 = 1_700_000_000;

fn assoc(handle: &str, issued: u64, lifetime: u64) -> Association {
    Association::new(handle, vec![0x42u8; 20], issued, lifetime, AssociationType::HmacSha1).unwrap()
}

fn memory() -> (MemoryStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    (MemoryStore::new().with_clock(clock.clone()), clock)
}

fn disk() -> (FjallStore, Arc<ManualClock>, tempfile::TempDir) {
    let clock = Arc::new(ManualClock::new(START));
    let temp = tempfile::tempdir().unwrap();
    let store = FjallStore::open_with_clock(temp.path(), StoreConfig::default(), clock.clone()).unwrap();
    (store, clock, temp)
}

fn check_store_and_fetch_by_handle(store: &dyn AssociationStore) {
    let a = assoc("handle-a", START, 3600);
    store.store_association(URL, &a).unwrap();

    assert_eq!(store.get_association(URL, Some("handle-a")).unwrap(), Some(a));
    assert!(store.get_association(URL, Some("missing")).unwrap().is_none());
    assert!(store.get_association("http://other.example/", Some("handle-a")).unwrap().is_none());
}

fn check_overwrite_same_handle(store: &dyn AssociationStore) {
    store.store_association(URL, &assoc("h", START, 100)).unwrap();
    let replacement = Association::new("h", vec![7u8; 32], START, 500, AssociationType::HmacSha256).unwrap();
    store.store_association(URL, &replacement).unwrap();

    let fetched = store.get_association(URL, Some("h")).unwrap().unwrap();
    assert_eq!(fetched.secret(), &[7u8; 32][..]);
    assert_eq!(fetched.assoc_type(), AssociationType::HmacSha256);
}

fn check_expiry_boundary(store: &dyn AssociationStore, clock: &ManualClock) {
    store.store_association(URL, &assoc("short", START, 60)).unwrap();

    clock.set(START + 59);
    assert!(store.get_association(URL, Some("short")).unwrap().is_some());
    assert!(store.get_association(URL, None).unwrap().is_some());

    clock.set(START + 60);
    assert!(store.get_association(URL, Some("short")).unwrap().is_none());
    assert!(store.get_association(URL, None).unwrap().is_none());

    // the expired entry was dropped during lookup
    clock.set(START);
    assert!(store.get_association(URL, Some("short")).unwrap().is_none());
}

fn check_latest_expiry_wins(store: &dyn AssociationStore, clock: &ManualClock) {
    store.store_association(URL, &assoc("sooner", START, 600)).unwrap();
    store.store_association(URL, &assoc("later", START, 1200)).unwrap();
    store.store_association(URL, &assoc("middle", START, 900)).unwrap();

    assert_eq!(store.get_association(URL, None).unwrap().unwrap().handle(), "later");

    clock.set(START + 1200);
    assert!(store.get_association(URL, None).unwrap().is_none());
}

fn check_latest_skips_expired(store: &dyn AssociationStore, clock: &ManualClock) {
    store.store_association(URL, &assoc("long", START, 1000)).unwrap();
    store.store_association(URL, &assoc("longest-but-old", START - 5000, 5500)).unwrap();

    clock.set(START + 600);
    assert_eq!(store.get_association(URL, None).unwrap().unwrap().handle(), "long");
}

fn check_remove(store: &dyn AssociationStore) {
    store.store_association(URL, &assoc("gone", START, 3600)).unwrap();

    assert!(store.remove_association(URL, "gone").unwrap());
    assert!(!store.remove_association(URL, "gone").unwrap());
    assert!(!store.remove_association("http://never.example/", "gone").unwrap());
    assert!(store.get_association(URL, Some("gone")).unwrap().is_none());
}

fn check_url_key_isolation(store: &dyn AssociationStore) {
    let other = format!("{}\0evil", URL);
    store.store_association(&other, &assoc("h", START, 3600)).unwrap();

    assert!(store.get_association(URL, None).unwrap().is_none());
    assert!(store.get_association(URL, Some("evil\0h")).unwrap().is_none());
    assert!(!store.remove_association(URL, "evil\0h").unwrap());
    assert_eq!(store.get_association(&other, Some("h")).unwrap().unwrap().handle(), "h");
}

fn check_auth_key_is_stable(store: &dyn AssociationStore) {
    let first = store.auth_key().unwrap();
    assert_eq!(first.as_bytes().len(), AUTH_KEY_LEN);
    for _ in 0..5 {
        assert_eq!(store.auth_key().unwrap(), first);
    }
    assert!(!store.is_dumb());
}

fn check_nonce_used_once(store: &dyn NonceGuard) {
    let nonce = Nonce::new("once-only");
    store.store_nonce(&nonce).unwrap();

    assert!(store.use_nonce(&nonce).unwrap());
    assert!(!store.use_nonce(&nonce).unwrap());
    assert!(!store.use_nonce(&nonce).unwrap());
    assert!(!store.use_nonce(&Nonce::new("never-stored")).unwrap());
}

fn check_stale_nonce_refused(store: &dyn NonceGuard, clock: &ManualClock) {
    let opaque = Nonce::new("opaque-token");
    store.store_nonce(&opaque).unwrap();
    clock.advance(DEFAULT_NONCE_WINDOW.as_secs() + 1);
    assert!(!store.use_nonce(&opaque).unwrap());
    // discarded, not merely refused
    clock.set(START);
    assert!(!store.use_nonce(&opaque).unwrap());
}

fn check_embedded_timestamp_governs_age(store: &dyn NonceGuard, clock: &ManualClock) {
    let mut rng = rand::thread_rng();
    let old = Nonce::generate(&mut rng, START - DEFAULT_NONCE_WINDOW.as_secs() - 10);
    let fresh = Nonce::generate(&mut rng, START);

    store.store_nonce(&old).unwrap();
    store.store_nonce(&fresh).unwrap();
    clock.set(START);

    assert!(!store.use_nonce(&old).unwrap());
    assert!(store.use_nonce(&fresh).unwrap());
}

macro_rules! contract_tests {
    ($name:ident, $make:expr) => {
        mod $name {
            use super::*;

            #[test]
            fn store_and_fetch_by_handle() {
                let made = $make;
                check_store_and_fetch_by_handle(&made.0);
            }

            #[test]
            fn overwrite_same_handle() {
                let made = $make;
                check_overwrite_same_handle(&made.0);
            }

            #[test]
            fn expiry_boundary() {
                let made = $make;
                check_expiry_boundary(&made.0, &made.1);
            }

            #[test]
            fn latest_expiry_wins() {
                let made = $make;
                check_latest_expiry_wins(&made.0, &made.1);
            }

            #[test]
            fn latest_skips_expired() {
                let made = $make;
                check_latest_skips_expired(&made.0, &made.1);
            }

            #[test]
            fn remove() {
                let made = $make;
                check_remove(&made.0);
            }

            #[test]
            fn url_key_isolation() {
                let made = $make;
                check_url_key_isolation(&made.0);
            }

            #[test]
            fn auth_key_is_stable() {
                let made = $make;
                check_auth_key_is_stable(&made.0);
            }

            #[test]
            fn nonce_used_once() {
                let made = $make;
                check_nonce_used_once(&made.0);
            }

            #[test]
            fn stale_nonce_refused() {
                let made = $make;
                check_stale_nonce_refused(&made.0, &made.1);
            }

            #[test]
            fn embedded_timestamp_governs_age() {
                let made = $make;
                check_embedded_timestamp_governs_age(&made.0, &made.1);
            }
        }
    };
}

contract_tests!(memory_store, memory());
contract_tests!(fjall_store, disk());

#[test]
fn dumb_store_signs_with_phrase_key() {
    let a = DumbStore::new("shared phrase");
    let b = DumbStore::new("shared phrase");
    assert!(a.is_dumb());

    let fields: KvForm = [("openid.mode", "id_res")].into_iter().collect();
    let key = a.auth_key().unwrap();
    let signed = key.signer().with_prefix("openid.").sign(&fields, &["mode"]).unwrap();

    let other = b.auth_key().unwrap();
    assert!(other
        .signer()
        .with_prefix("openid.")
        .verify(&fields, &signed.signed, &signed.sig)
        .is_ok());
}
