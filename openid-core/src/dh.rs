//! Diffie-Hellman exchange for transmitting association secrets
//!
//! The provider masks the association secret with a digest of the shared
//! value `K` and sends the result with its own public key; the relying
//! party recomputes `K` from its private exponent and unmasks the secret.

use crate::{codec, AssociationType, OpenIdError, Result};
use num_bigint::{BigUint, RandBigInt};
use rand::Rng;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

/// Default OpenID modulus, a 1024-bit safe prime
const DEFAULT_MODULUS: &str = "155172898181473697471232257763715539915724801966915404479707795314057629378541917580651227423698188993727816152646631438561595825688188889951272158842675419950341258706556549803580104870537681476726513255747040765857479291291572334510643245094715007229621094194349783925984760375594985848253359305585439638443";

const DEFAULT_GENERATOR: u32 = 2;

/// Session types: how the association secret is masked in transit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionType {
    DhSha1,
    DhSha256,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::DhSha1 => "DH-SHA1",
            SessionType::DhSha256 => "DH-SHA256",
        }
    }

    /// Hash `data` with this session's digest
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            SessionType::DhSha1 => Sha1::digest(data).to_vec(),
            SessionType::DhSha256 => Sha256::digest(data).to_vec(),
        }
    }

    /// The association type whose secret length matches this session
    pub fn association_type(&self) -> AssociationType {
        match self {
            SessionType::DhSha1 => AssociationType::HmacSha1,
            SessionType::DhSha256 => AssociationType::HmacSha256,
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = OpenIdError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DH-SHA1" => Ok(SessionType::DhSha1),
            "DH-SHA256" => Ok(SessionType::DhSha256),
            other => Err(OpenIdError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Group parameters: modulus `p` and generator `g`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhParams {
    modulus: BigUint,
    generator: BigUint,
}

impl DhParams {
    pub fn new(modulus: BigUint, generator: BigUint) -> Result<Self> {
        if modulus < BigUint::from(3u32) {
            return Err(OpenIdError::InvalidArgument(
                "modulus must be at least 3".to_string(),
            ));
        }
        if generator < BigUint::from(2u32) || generator >= modulus {
            return Err(OpenIdError::InvalidArgument(
                "generator must lie in [2, p)".to_string(),
            ));
        }

        Ok(DhParams { modulus, generator })
    }

    /// Decode parameters sent as base64 btwoc; absent values use the defaults
    pub fn from_base64(modulus: Option<&str>, generator: Option<&str>) -> Result<Self> {
        let defaults = DhParams::default();
        let modulus = match modulus {
            Some(p) => codec::b64_to_long(p)?,
            None => defaults.modulus,
        };
        let generator = match generator {
            Some(g) => codec::b64_to_long(g)?,
            None => defaults.generator,
        };

        Self::new(modulus, generator)
    }

    /// `(p, g)` as base64 btwoc
    pub fn to_base64(&self) -> (String, String) {
        (
            codec::long_to_b64(&self.modulus),
            codec::long_to_b64(&self.generator),
        )
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    pub fn is_default(&self) -> bool {
        *self == DhParams::default()
    }
}

impl Default for DhParams {
    fn default() -> Self {
        #[allow(clippy::expect_used)]
        let modulus = BigUint::parse_bytes(DEFAULT_MODULUS.as_bytes(), 10)
            .expect("default modulus is a decimal literal");

        DhParams {
            modulus,
            generator: BigUint::from(DEFAULT_GENERATOR),
        }
    }
}

/// One side of a Diffie-Hellman exchange
#[derive(Clone)]
pub struct DiffieHellman {
    params: DhParams,
    private: BigUint,
}

impl DiffieHellman {
    /// Pick a private exponent uniformly from `[1, p-2]` using `rng`
    pub fn new<R: Rng + ?Sized>(params: DhParams, rng: &mut R) -> Self {
        let low = BigUint::from(1u32);
        let high = params.modulus().clone() - 1u32;
        let private = rng.gen_biguint_range(&low, &high);

        DiffieHellman { params, private }
    }

    /// Build from base64 parameters received from a peer
    pub fn from_base64<R: Rng + ?Sized>(
        modulus: Option<&str>,
        generator: Option<&str>,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Self::new(DhParams::from_base64(modulus, generator)?, rng))
    }

    pub fn params(&self) -> &DhParams {
        &self.params
    }

    /// Public value `g^x mod p` to send to the peer
    pub fn create_key_exchange(&self) -> BigUint {
        self.params
            .generator()
            .modpow(&self.private, self.params.modulus())
    }

    /// Shared value `peer^x mod p`
    pub fn decrypt_key_exchange(&self, peer_public: &BigUint) -> BigUint {
        peer_public.modpow(&self.private, self.params.modulus())
    }

    /// Mask or unmask `secret` with the digest of the shared value.
    ///
    /// The operation is its own inverse: the sender masks with the
    /// receiver's public value, the receiver unmasks with the sender's.
    pub fn xor_secret(
        &self,
        peer_public: &BigUint,
        secret: &[u8],
        session: SessionType,
    ) -> Result<Vec<u8>> {
        let shared = self.decrypt_key_exchange(peer_public);
        let mask = session.digest(&codec::long_to_bytes(&shared));
        codec::strxor(secret, &mask)
    }
}

impl fmt::Debug for DiffieHellman {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffieHellman")
            .field("default_params", &self.params.is_default())
            .finish_non_exhaustive()
    }
}
