//! One-time tokens for replay protection
//!
//! A nonce is an opaque string. Nonces minted here start with a W3C UTC
//! timestamp (`2005-05-15T17:11:51Z`) followed by a short random salt, and
//! stores use that timestamp to age them out.

use chrono::{DateTime, NaiveDateTime};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Conservative replay window: six hours
pub const DEFAULT_NONCE_WINDOW: Duration = Duration::from_secs(6 * 60 * 60);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const TIMESTAMP_LEN: usize = 20;
const SALT_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    /// Wrap a nonce received from a peer
    pub fn new(value: impl Into<String>) -> Self {
        Nonce(value.into())
    }

    /// Mint a nonce stamped with `now` and a random alphanumeric salt
    pub fn generate<R: Rng>(rng: &mut R, now: u64) -> Self {
        let stamp = i64::try_from(now)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default();
        let salt: String = (0..SALT_LEN)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect();

        Nonce(format!("{}{}", stamp, salt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Embedded timestamp in seconds since the epoch, if the nonce has one
    pub fn timestamp(&self) -> Option<u64> {
        let prefix = self.0.get(..TIMESTAMP_LEN)?;
        let parsed = NaiveDateTime::parse_from_str(prefix, TIMESTAMP_FORMAT).ok()?;
        u64::try_from(parsed.and_utc().timestamp()).ok()
    }

    /// Whether this nonce falls outside `window` of `now`.
    ///
    /// Age is measured from the embedded timestamp, or from `stored_at` for
    /// opaque nonces. Timestamps further than `window` in the future are
    /// also refused.
    pub fn is_stale(&self, stored_at: u64, now: u64, window: Duration) -> bool {
        let reference = self.timestamp().unwrap_or(stored_at);
        let window = window.as_secs();

        now.saturating_sub(reference) > window || reference.saturating_sub(now) > window
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Nonce {
    fn from(value: &str) -> Self {
        Nonce::new(value)
    }
}

impl From<String> for Nonce {
    fn from(value: String) -> Self {
        Nonce(value)
    }
}
