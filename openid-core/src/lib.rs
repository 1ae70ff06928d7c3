//! Trust-establishment primitives for OpenID associations
//!
//! - big-integer and base64 codec helpers
//! - the canonical key-value form used for signed payloads
//! - Diffie-Hellman exchange for transmitting association secrets
//! - associations, nonces, and the store contracts that persist them
//! - HMAC signing and verification over ordered field lists

pub mod association;
pub mod clock;
pub mod codec;
pub mod dh;
pub mod error;
pub mod kvform;
pub mod nonce;
pub mod signer;
pub mod store;
pub mod timing;

pub use association::*;
pub use clock::*;
pub use dh::*;
pub use error::*;
pub use kvform::*;
pub use nonce::*;
pub use signer::*;
pub use store::*;

/// Result type alias for openid operations
pub type Result<T> = std::result::Result<T, OpenIdError>;
