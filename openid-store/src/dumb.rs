//! Store for deployments that cannot persist anything
//!
//! Only the auth key exists, derived from a configured secret phrase so that
//! every process sharing the phrase signs identically. Associations are
//! never kept. It does not implement [`openid_core::NonceGuard`].

use openid_core::*;
use sha1::{Digest, Sha1};
use tracing::debug;

pub struct DumbStore {
    auth_key: AuthKey,
}

impl DumbStore {
    /// Derive the auth key as SHA-1 of `secret_phrase`
    pub fn new(secret_phrase: &str) -> Self {
        let digest = Sha1::digest(secret_phrase.as_bytes());
        let mut bytes = [0u8; AUTH_KEY_LEN];
        bytes.copy_from_slice(&digest);

        DumbStore {
            auth_key: AuthKey::from_bytes(bytes),
        }
    }
}

impl AssociationStore for DumbStore {
    fn store_association(&self, server_url: &str, association: &Association) -> Result<()> {
        debug!(server_url, handle = association.handle(), "dumb store ignores association");
        Ok(())
    }

    fn get_association(&self, _server_url: &str, _handle: Option<&str>) -> Result<Option<Association>> {
        Ok(None)
    }

    fn remove_association(&self, _server_url: &str, _handle: &str) -> Result<bool> {
        Ok(false)
    }

    fn auth_key(&self) -> Result<AuthKey> {
        Ok(self.auth_key.clone())
    }

    fn mode(&self) -> StoreMode {
        StoreMode::Dumb
    }
}
