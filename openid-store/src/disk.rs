//! File-backed store on a fjall keyspace
//!
//! Three partitions: `associations` keyed by the length-prefixed
//! `server_url` followed by the handle, holding the serialized association,
//! `nonces` keyed by the nonce holding the big-endian store time, and `meta`
//! holding the auth key. Every mutation is synced to disk before returning.

use crate::{random_auth_key, StoreConfig};
use fjall::{Config, Keyspace, Partition, PartitionCreateOptions, PersistMode};
use openid_core::*;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

const AUTH_KEY_ENTRY: &str = "auth_key";

/// Number of mutexes keys are striped across
const LOCK_STRIPES: usize = 64;

pub struct FjallStore {
    keyspace: Arc<Keyspace>,
    associations: Partition,
    nonces: Partition,
    auth_key: AuthKey,
    /// Serializes read-then-delete sequences on the same key
    locks: Vec<Mutex<()>>,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

fn storage_err(e: impl std::fmt::Display) -> OpenIdError {
    OpenIdError::Storage(e.to_string())
}

impl FjallStore {
    /// Open or create a store at `path`
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        Self::open_with_clock(path, config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        path: impl AsRef<Path>,
        config: StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let keyspace = Arc::new(Config::new(path).open().map_err(storage_err)?);

        let open = |name: &str| {
            keyspace
                .open_partition(name, PartitionCreateOptions::default())
                .map_err(storage_err)
        };
        let associations = open("associations")?;
        let nonces = open("nonces")?;
        let meta = open("meta")?;

        let auth_key = match meta.get(AUTH_KEY_ENTRY).map_err(storage_err)? {
            Some(bytes) => AuthKey::from_slice(&bytes).ok_or_else(|| {
                OpenIdError::Storage(format!("stored auth key has length {}", bytes.len()))
            })?,
            None => {
                let key = random_auth_key();
                meta.insert(AUTH_KEY_ENTRY, &key.as_bytes()[..])
                    .map_err(storage_err)?;
                keyspace.persist(PersistMode::SyncAll).map_err(storage_err)?;
                debug!("created auth key");
                key
            }
        };

        Ok(FjallStore {
            keyspace,
            associations,
            nonces,
            auth_key,
            locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            clock,
            config,
        })
    }

    /// Create temporary store for testing
    #[cfg(any(test, feature = "test-utils"))]
    pub fn temp() -> Result<(Self, tempfile::TempDir)> {
        let temp_dir = tempfile::tempdir()?;
        let store = Self::open(temp_dir.path(), StoreConfig::default())?;
        Ok((store, temp_dir))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Drop every expired association, returning how many were removed
    pub fn cleanup_associations(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut expired = Vec::new();
        for item in self.associations.iter() {
            let (key, value) = item.map_err(storage_err)?;
            if decode_association(&value).map_or(true, |assoc| assoc.is_expired(now)) {
                expired.push(key.to_vec());
            }
        }

        let mut removed = 0;
        for key in expired {
            if self.remove_association_if(&key, |assoc| assoc.map_or(true, |a| a.is_expired(now)))? {
                removed += 1;
            }
        }

        debug!(removed, "swept expired associations");
        Ok(removed)
    }

    /// Drop every nonce outside the replay window
    pub fn cleanup_nonces(&self) -> Result<usize> {
        let now = self.clock.now();
        let window = self.config.nonce_window();
        let mut stale = Vec::new();
        for item in self.nonces.iter() {
            let (key, value) = item.map_err(storage_err)?;
            let nonce = Nonce::new(String::from_utf8_lossy(&key));
            if nonce.is_stale(decode_stored_at(&value), now, window) {
                stale.push(key.to_vec());
            }
        }

        let mut removed = 0;
        for key in &stale {
            if self.remove_nonce_if_stale(key, now, window)? {
                removed += 1;
            }
        }
        if removed > 0 {
            self.persist()?;
        }

        debug!(removed, "swept stale nonces");
        Ok(removed)
    }

    pub fn association_count(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.associations.iter() {
            item.map_err(storage_err)?;
            count += 1;
        }
        Ok(count)
    }

    /// Persist all changes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(storage_err)
    }

    fn lock_for(&self, key: &[u8]) -> MutexGuard<'_, ()> {
        let stripe = blake3::hash(key).as_bytes()[0] as usize % self.locks.len();
        // The mutex guards no data, so a poisoned lock is still usable
        self.locks[stripe]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Delete the nonce at `key` if it is still stale under the lock.
    ///
    /// The nonce may have been stored again since it was found stale.
    fn remove_nonce_if_stale(&self, key: &[u8], now: u64, window: Duration) -> Result<bool> {
        let _guard = self.lock_for(key);
        let Some(value) = self.nonces.get(key).map_err(storage_err)? else {
            return Ok(false);
        };

        let nonce = Nonce::new(String::from_utf8_lossy(key));
        if !nonce.is_stale(decode_stored_at(&value), now, window) {
            return Ok(false);
        }

        self.nonces.remove(key).map_err(storage_err)?;
        Ok(true)
    }

    /// Delete the association at `key` if `pred` holds for its current value
    fn remove_association_if(
        &self,
        key: &[u8],
        pred: impl FnOnce(Option<&Association>) -> bool,
    ) -> Result<bool> {
        let _guard = self.lock_for(key);
        let Some(value) = self.associations.get(key).map_err(storage_err)? else {
            return Ok(false);
        };

        let current = decode_association(&value);
        if !pred(current.as_ref()) {
            return Ok(false);
        }

        self.associations.remove(key).map_err(storage_err)?;
        self.persist()?;
        Ok(true)
    }
}

fn association_key(server_url: &str, handle: &str) -> Vec<u8> {
    let mut key = association_prefix(server_url);
    key.extend_from_slice(handle.as_bytes());
    key
}

/// Big-endian URL length, then the URL, so no URL is a prefix of another's key
fn association_prefix(server_url: &str) -> Vec<u8> {
    let url = server_url.as_bytes();
    let mut prefix = Vec::with_capacity(8 + url.len());
    prefix.extend_from_slice(&(url.len() as u64).to_be_bytes());
    prefix.extend_from_slice(url);
    prefix
}

/// `None` for records that do not parse; they are treated as expired
fn decode_association(value: &[u8]) -> Option<Association> {
    let text = std::str::from_utf8(value).ok()?;
    match Association::deserialize(text) {
        Ok(assoc) => Some(assoc),
        Err(e) => {
            warn!(error = %e, "corrupt association record");
            None
        }
    }
}

fn decode_stored_at(value: &[u8]) -> u64 {
    value
        .try_into()
        .map(u64::from_be_bytes)
        .unwrap_or(0)
}

impl AssociationStore for FjallStore {
    fn store_association(&self, server_url: &str, association: &Association) -> Result<()> {
        let key = association_key(server_url, association.handle());
        {
            let _guard = self.lock_for(&key);
            self.associations
                .insert(key.as_slice(), association.serialize())
                .map_err(storage_err)?;
        }
        self.persist()?;

        debug!(server_url, handle = association.handle(), "stored association");
        Ok(())
    }

    fn get_association(&self, server_url: &str, handle: Option<&str>) -> Result<Option<Association>> {
        let now = self.clock.now();

        let mut live = Vec::new();
        let mut expired = Vec::new();
        match handle {
            Some(handle) => {
                let key = association_key(server_url, handle);
                if let Some(value) = self.associations.get(&key).map_err(storage_err)? {
                    match decode_association(&value) {
                        Some(assoc) if !assoc.is_expired(now) => live.push(assoc),
                        _ => expired.push(key),
                    }
                }
            }
            None => {
                for item in self.associations.prefix(association_prefix(server_url)) {
                    let (key, value) = item.map_err(storage_err)?;
                    match decode_association(&value) {
                        Some(assoc) if !assoc.is_expired(now) => live.push(assoc),
                        _ => expired.push(key.to_vec()),
                    }
                }
            }
        }

        for key in expired {
            // Re-checked under the lock so a concurrent refresh is not lost
            if self.remove_association_if(&key, |assoc| assoc.map_or(true, |a| a.is_expired(now)))? {
                debug!(server_url, "dropped expired association");
            }
        }

        Ok(latest_live(&live, now).cloned())
    }

    fn remove_association(&self, server_url: &str, handle: &str) -> Result<bool> {
        let removed = self.remove_association_if(&association_key(server_url, handle), |_| true)?;

        debug!(server_url, handle, removed, "remove association");
        Ok(removed)
    }

    fn auth_key(&self) -> Result<AuthKey> {
        Ok(self.auth_key.clone())
    }

    fn mode(&self) -> StoreMode {
        StoreMode::Full
    }
}

impl NonceGuard for FjallStore {
    fn store_nonce(&self, nonce: &Nonce) -> Result<()> {
        let key = nonce.as_str().as_bytes();
        {
            let _guard = self.lock_for(key);
            self.nonces
                .insert(key, self.clock.now().to_be_bytes().to_vec())
                .map_err(storage_err)?;
        }
        self.persist()
    }

    fn use_nonce(&self, nonce: &Nonce) -> Result<bool> {
        let key = nonce.as_str().as_bytes();
        let _guard = self.lock_for(key);

        let Some(value) = self.nonces.get(key).map_err(storage_err)? else {
            return Ok(false);
        };
        self.nonces.remove(key).map_err(storage_err)?;
        self.persist()?;

        if nonce.is_stale(decode_stored_at(&value), self.clock.now(), self.config.nonce_window()) {
            warn!(nonce = nonce.as_str(), "discarding nonce outside replay window");
            return Ok(false);
        }
        Ok(true)
    }
}
