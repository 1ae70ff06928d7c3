//! Store contracts for associations, nonces, and the auth key
//!
//! Backends implement [`AssociationStore`], and [`NonceGuard`] when they can
//! promise exactly-once nonce consumption. Both traits take `&self` and are
//! invoked concurrently from independent requests.

use crate::{timing, Association, AssociationType, Nonce, Result, Signer};
use std::fmt;

/// Length of the key returned by [`AssociationStore::auth_key`]
pub const AUTH_KEY_LEN: usize = 20;

/// What a store can persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreMode {
    /// Per-association secrets are stored; use association signing
    Full,
    /// Only the stable auth key exists; the protocol layer must sign in dumb mode
    Dumb,
}

/// Stable process-wide signing key for dumb mode
#[derive(Clone)]
pub struct AuthKey([u8; AUTH_KEY_LEN]);

impl AuthKey {
    pub fn from_bytes(bytes: [u8; AUTH_KEY_LEN]) -> Self {
        AuthKey(bytes)
    }

    /// `None` unless `bytes` is exactly [`AUTH_KEY_LEN`] long
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; AUTH_KEY_LEN] = bytes.try_into().ok()?;
        Some(AuthKey(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; AUTH_KEY_LEN] {
        &self.0
    }

    /// HMAC-SHA1 signer keyed with the auth key
    pub fn signer(&self) -> Signer<'_> {
        Signer::new(AssociationType::HmacSha1, &self.0)
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool {
        timing::constant_time_key_compare(self, other)
    }
}

impl Eq for AuthKey {}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKey").finish_non_exhaustive()
    }
}

/// Persistence for associations, keyed by `(server_url, handle)`
pub trait AssociationStore: Send + Sync {
    /// Store or overwrite `association` under its handle.
    ///
    /// The write is durable when this returns.
    fn store_association(&self, server_url: &str, association: &Association) -> Result<()>;

    /// Look up a live association.
    ///
    /// With a handle, returns that exact association. Without one, returns
    /// the live association with the latest expiry for `server_url`.
    /// Expired associations are never returned and may be deleted as a
    /// side effect.
    fn get_association(&self, server_url: &str, handle: Option<&str>) -> Result<Option<Association>>;

    /// Delete an association, returning whether one was removed
    fn remove_association(&self, server_url: &str, handle: &str) -> Result<bool>;

    /// The stable auth key; identical on every call
    fn auth_key(&self) -> Result<AuthKey>;

    /// Capability flag consulted by the protocol layer
    fn mode(&self) -> StoreMode;

    fn is_dumb(&self) -> bool {
        self.mode() == StoreMode::Dumb
    }
}

/// Exactly-once consumption of nonces
pub trait NonceGuard: Send + Sync {
    /// Record `nonce` as available
    fn store_nonce(&self, nonce: &Nonce) -> Result<()>;

    /// Atomically consume `nonce`.
    ///
    /// Returns `true` for exactly one caller per stored nonce. Nonces outside
    /// the replay window are discarded and reported as `false`.
    fn use_nonce(&self, nonce: &Nonce) -> Result<bool>;
}

/// Pick the live association with the latest expiry
pub fn latest_live<'a>(
    associations: impl IntoIterator<Item = &'a Association>,
    now: u64,
) -> Option<&'a Association> {
    associations
        .into_iter()
        .filter(|assoc| !assoc.is_expired(now))
        .max_by_key(|assoc| assoc.expires_at())
}
