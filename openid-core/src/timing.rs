//! Constant-time comparisons
//!
//! Signature and key checks go through these helpers so that a mismatch
//! does not leak how many leading bytes matched.

use subtle::ConstantTimeEq;

/// Constant-time signature comparison
pub fn constant_time_sig_compare(sig1: &[u8], sig2: &[u8]) -> bool {
    if sig1.len() != sig2.len() {
        return false;
    }

    sig1.ct_eq(sig2).into()
}

/// Constant-time auth key comparison
pub fn constant_time_key_compare(key1: &crate::AuthKey, key2: &crate::AuthKey) -> bool {
    constant_time_sig_compare(key1.as_bytes(), key2.as_bytes())
}
