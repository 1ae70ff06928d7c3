//! HMAC signing over ordered field lists
//!
//! A signature covers the canonical `name:value\n` text of the fields
//! named in the `signed` list, in exactly that order. Reordering the list
//! produces a different signature.

use crate::{codec, kvform::kv_text, timing, OpenIdError, Result};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Association types, each naming the HMAC used with the shared secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationType {
    HmacSha1,
    HmacSha256,
}

impl AssociationType {
    /// Wire name of the association type
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationType::HmacSha1 => "HMAC-SHA1",
            AssociationType::HmacSha256 => "HMAC-SHA256",
        }
    }

    /// Secret length in bytes, equal to the hash output length
    pub fn secret_len(&self) -> usize {
        match self {
            AssociationType::HmacSha1 => 20,
            AssociationType::HmacSha256 => 32,
        }
    }

    /// Compute the raw MAC of `text` under `key`
    pub fn mac(&self, key: &[u8], text: &[u8]) -> Result<Vec<u8>> {
        match self {
            AssociationType::HmacSha1 => {
                let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key)
                    .map_err(|e| OpenIdError::InvalidArgument(format!("hmac key: {}", e)))?;
                mac.update(text);
                Ok(mac.finalize().into_bytes().to_vec())
            }
            AssociationType::HmacSha256 => {
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
                    .map_err(|e| OpenIdError::InvalidArgument(format!("hmac key: {}", e)))?;
                mac.update(text);
                Ok(mac.finalize().into_bytes().to_vec())
            }
        }
    }
}

impl fmt::Display for AssociationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssociationType {
    type Err = OpenIdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "HMAC-SHA1" => Ok(AssociationType::HmacSha1),
            "HMAC-SHA256" => Ok(AssociationType::HmacSha256),
            other => Err(OpenIdError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Anything fields can be looked up in by name
pub trait FieldSource {
    fn field(&self, name: &str) -> Option<&str>;
}

impl FieldSource for crate::KvForm {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name)
    }
}

impl FieldSource for HashMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl FieldSource for BTreeMap<String, String> {
    fn field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// Output of [`Signer::sign`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedFields {
    /// Comma-joined field names, in signing order
    pub signed: String,
    /// Base64 MAC over the canonical text
    pub sig: String,
}

/// HMAC signer bound to one secret
pub struct Signer<'a> {
    algorithm: AssociationType,
    secret: &'a [u8],
    prefix: &'a str,
}

impl<'a> Signer<'a> {
    pub fn new(algorithm: AssociationType, secret: &'a [u8]) -> Self {
        Signer {
            algorithm,
            secret,
            prefix: "",
        }
    }

    /// Look up each signed name as `prefix + name` in the field source.
    ///
    /// Protocol messages carry fields as `openid.mode` while the signed
    /// list names them as `mode`.
    pub fn with_prefix(mut self, prefix: &'a str) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn algorithm(&self) -> AssociationType {
        self.algorithm
    }

    /// Sign the named fields in the given order.
    ///
    /// An empty list is rejected, since its `signed` value could never verify.
    pub fn sign<F, S>(&self, fields: &F, order: &[S]) -> Result<SignedFields>
    where
        F: FieldSource + ?Sized,
        S: AsRef<str>,
    {
        if order.is_empty() {
            return Err(OpenIdError::InvalidArgument(
                "at least one field must be signed".to_string(),
            ));
        }

        let names: Vec<&str> = order.iter().map(|name| name.as_ref()).collect();
        let mac = self.raw_mac(fields, &names).ok_or_else(|| {
            OpenIdError::InvalidArgument("signed field missing from message".to_string())
        })??;

        Ok(SignedFields {
            signed: names.join(","),
            sig: codec::to_b64(mac),
        })
    }

    /// Verify `sig` over the fields named in `signed_csv`, in that order.
    ///
    /// Fails with [`OpenIdError::InvalidSignature`] on any mismatch,
    /// including missing fields or an undecodable signature.
    pub fn verify<F>(&self, fields: &F, signed_csv: &str, sig: &str) -> Result<()>
    where
        F: FieldSource + ?Sized,
    {
        let names: Vec<&str> = signed_csv.split(',').collect();
        let expected = match self.raw_mac(fields, &names) {
            Some(mac) => mac?,
            None => {
                tracing::debug!(signed = signed_csv, "signed field missing during verification");
                return Err(OpenIdError::InvalidSignature);
            }
        };
        let supplied = codec::from_b64(sig).map_err(|_| OpenIdError::InvalidSignature)?;

        if timing::constant_time_sig_compare(&expected, &supplied) {
            Ok(())
        } else {
            Err(OpenIdError::InvalidSignature)
        }
    }

    /// `None` when a named field is absent
    fn raw_mac<F>(&self, fields: &F, names: &[&str]) -> Option<Result<Vec<u8>>>
    where
        F: FieldSource + ?Sized,
    {
        let mut pairs = Vec::with_capacity(names.len());
        for name in names {
            let value = fields.field(&format!("{}{}", self.prefix, name))?;
            pairs.push((*name, value));
        }

        let text = kv_text(pairs);
        Some(self.algorithm.mac(self.secret, text.as_bytes()))
    }
}
