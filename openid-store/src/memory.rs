//! In-memory store
//!
//! Associations are grouped per server URL in a sharded map so lookups for
//! different providers do not contend. Nonce consumption is a single
//! `DashMap::remove`, which only one racing caller can win.

use crate::{random_auth_key, StoreConfig};
use dashmap::DashMap;
use openid_core::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct MemoryStore {
    /// server_url -> handle -> association
    associations: DashMap<String, HashMap<String, Association>>,
    /// nonce -> time it was stored
    nonces: DashMap<String, u64>,
    auth_key: AuthKey,
    clock: Arc<dyn Clock>,
    config: StoreConfig,
}

impl MemoryStore {
    /// Empty store with a random auth key and the system clock
    pub fn new() -> Self {
        MemoryStore {
            associations: DashMap::new(),
            nonces: DashMap::new(),
            auth_key: random_auth_key(),
            clock: Arc::new(SystemClock),
            config: StoreConfig::default(),
        }
    }

    pub fn with_auth_key(mut self, auth_key: AuthKey) -> Self {
        self.auth_key = auth_key;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Drop every expired association, returning how many were removed
    pub fn cleanup_associations(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        for mut entry in self.associations.iter_mut() {
            let before = entry.len();
            entry.retain(|_, assoc| !assoc.is_expired(now));
            removed += before - entry.len();
        }
        self.associations.retain(|_, by_handle| !by_handle.is_empty());

        debug!(removed, "swept expired associations");
        removed
    }

    /// Drop every nonce outside the replay window
    pub fn cleanup_nonces(&self) -> usize {
        let now = self.clock.now();
        let window = self.config.nonce_window();
        let before = self.nonces.len();
        self.nonces
            .retain(|value, stored_at| !Nonce::new(value.as_str()).is_stale(*stored_at, now, window));
        let removed = before.saturating_sub(self.nonces.len());

        debug!(removed, "swept stale nonces");
        removed
    }

    /// Remove the per-URL map once its last association is gone
    fn drop_if_empty(&self, server_url: &str) {
        self.associations
            .remove_if(server_url, |_, by_handle| by_handle.is_empty());
    }

    pub fn url_count(&self) -> usize {
        self.associations.len()
    }

    pub fn association_count(&self) -> usize {
        self.associations.iter().map(|entry| entry.len()).sum()
    }

    pub fn nonce_count(&self) -> usize {
        self.nonces.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssociationStore for MemoryStore {
    fn store_association(&self, server_url: &str, association: &Association) -> Result<()> {
        self.associations
            .entry(server_url.to_string())
            .or_default()
            .insert(association.handle().to_string(), association.clone());

        debug!(server_url, handle = association.handle(), "stored association");
        Ok(())
    }

    fn get_association(&self, server_url: &str, handle: Option<&str>) -> Result<Option<Association>> {
        let now = self.clock.now();
        let Some(mut by_handle) = self.associations.get_mut(server_url) else {
            return Ok(None);
        };

        let before = by_handle.len();
        by_handle.retain(|_, assoc| !assoc.is_expired(now));
        if by_handle.len() < before {
            debug!(server_url, removed = before - by_handle.len(), "dropped expired associations");
        }

        let found = match handle {
            Some(handle) => by_handle.get(handle).cloned(),
            None => latest_live(by_handle.values(), now).cloned(),
        };
        let emptied = by_handle.is_empty();
        drop(by_handle);

        if emptied {
            self.drop_if_empty(server_url);
        }
        Ok(found)
    }

    fn remove_association(&self, server_url: &str, handle: &str) -> Result<bool> {
        let removed = self
            .associations
            .get_mut(server_url)
            .map(|mut by_handle| by_handle.remove(handle).is_some())
            .unwrap_or(false);
        if removed {
            self.drop_if_empty(server_url);
        }

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

impl NonceGuard for MemoryStore {
    fn store_nonce(&self, nonce: &Nonce) -> Result<()> {
        self.nonces.insert(nonce.as_str().to_string(), self.clock.now());
        Ok(())
    }

    fn use_nonce(&self, nonce: &Nonce) -> Result<bool> {
        let Some((_, stored_at)) = self.nonces.remove(nonce.as_str()) else {
            return Ok(false);
        };

        if nonce.is_stale(stored_at, self.clock.now(), self.config.nonce_window()) {
            warn!(nonce = nonce.as_str(), "discarding nonce outside replay window");
            return Ok(false);
        }
        Ok(true)
    }
}
