//! Store backends for OpenID associations and nonces
//!
//! - [`MemoryStore`]: process-local, sharded maps
//! - [`FjallStore`]: file-backed database on a fjall keyspace
//! - [`DumbStore`]: auth key only, for deployments without persistence

pub mod config;
pub mod disk;
pub mod dumb;
pub mod memory;

pub use config::*;
pub use disk::*;
pub use dumb::*;
pub use memory::*;

use rand::RngCore;

/// Fresh auth key from the operating system RNG
pub(crate) fn random_auth_key() -> openid_core::AuthKey {
    let mut bytes = [0u8; openid_core::AUTH_KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    openid_core::AuthKey::from_bytes(bytes)
}
