//! Wire encodings for big integers and binary secrets
//!
//! Integers travel as base64 of their big-endian two's-complement bytes
//! (the "btwoc" form), so a value with the top bit set gains a leading
//! zero byte and is never read back as negative.

use crate::{OpenIdError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use num_bigint::BigUint;

/// Encode a non-negative integer as minimal big-endian two's-complement bytes.
///
/// Zero encodes as a single `0x00`.
pub fn long_to_bytes(n: &BigUint) -> Vec<u8> {
    // to_bytes_be() already yields [0] for zero
    let mut bytes = n.to_bytes_be();
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    bytes
}

/// Decode big-endian bytes produced by [`long_to_bytes`].
pub fn bytes_to_long(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Standard-alphabet base64 on a single line
pub fn to_b64(data: impl AsRef<[u8]>) -> String {
    STANDARD.encode(data)
}

/// Decode standard base64, ignoring embedded ASCII whitespace.
pub fn from_b64(s: &str) -> Result<Vec<u8>> {
    let compact: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| OpenIdError::InvalidEncoding(format!("invalid base64: {}", e)))
}

pub fn long_to_b64(n: &BigUint) -> String {
    to_b64(long_to_bytes(n))
}

pub fn b64_to_long(s: &str) -> Result<BigUint> {
    Ok(bytes_to_long(&from_b64(s)?))
}

/// Byte-wise XOR of two equal-length strings.
///
/// Mismatched lengths are a caller bug and are rejected rather than truncated.
pub fn strxor(a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
    if a.len() != b.len() {
        return Err(OpenIdError::InvalidArgument(format!(
            "strxor inputs differ in length: {} != {}",
            a.len(),
            b.len()
        )));
    }

    Ok(a.iter().zip(b).map(|(x, y)| x ^ y).collect())
}
