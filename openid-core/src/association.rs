//! Associations: shared secrets negotiated with an OpenID provider

use crate::{codec, AssociationType, KvForm, OpenIdError, Result, Signer};
use std::fmt;

/// Version tag written into serialized associations
const SERIALIZATION_VERSION: &str = "2";

/// Field order of the serialized form
const SERIALIZED_FIELDS: [&str; 6] = ["version", "handle", "secret", "issued", "lifetime", "assoc_type"];

/// A shared signing secret plus the metadata needed to expire it.
///
/// Fields are private and there are no setters: the secret and timing of an
/// association never change after it is created.
#[derive(Clone, PartialEq, Eq)]
pub struct Association {
    handle: String,
    secret: Vec<u8>,
    issued: u64,
    lifetime: u64,
    assoc_type: AssociationType,
}

impl Association {
    /// Create an association, checking the secret length against `assoc_type`
    pub fn new(
        handle: impl Into<String>,
        secret: Vec<u8>,
        issued: u64,
        lifetime: u64,
        assoc_type: AssociationType,
    ) -> Result<Self> {
        let handle = handle.into();
        // Handles are printable ASCII without spaces
        if handle.is_empty() || !handle.bytes().all(|b| (33..=126).contains(&b)) {
            return Err(OpenIdError::InvalidArgument(format!(
                "invalid association handle {:?}",
                handle
            )));
        }

        if secret.len() != assoc_type.secret_len() {
            return Err(OpenIdError::InvalidArgument(format!(
                "{} requires a {}-byte secret, got {}",
                assoc_type,
                assoc_type.secret_len(),
                secret.len()
            )));
        }

        Ok(Association {
            handle,
            secret,
            issued,
            lifetime,
            assoc_type,
        })
    }

    /// Create an association issued at `now` that expires in `expires_in` seconds
    pub fn from_expires_in(
        expires_in: u64,
        handle: impl Into<String>,
        secret: Vec<u8>,
        assoc_type: AssociationType,
        now: u64,
    ) -> Result<Self> {
        Self::new(handle, secret, now, expires_in, assoc_type)
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    pub fn assoc_type(&self) -> AssociationType {
        self.assoc_type
    }

    pub fn expires_at(&self) -> u64 {
        self.issued.saturating_add(self.lifetime)
    }

    /// Seconds left before expiry, zero once expired
    pub fn expires_in(&self, now: u64) -> u64 {
        self.expires_at().saturating_sub(now)
    }

    /// Expired at and after `issued + lifetime`
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at()
    }

    /// A signer keyed with this association's secret
    pub fn signer(&self) -> Signer<'_> {
        Signer::new(self.assoc_type, &self.secret)
    }

    /// Serialize to the canonical key-value form used for persistence
    pub fn serialize(&self) -> String {
        let issued = self.issued.to_string();
        let lifetime = self.lifetime.to_string();
        let secret = codec::to_b64(&self.secret);
        let values = [
            SERIALIZATION_VERSION,
            self.handle.as_str(),
            secret.as_str(),
            issued.as_str(),
            lifetime.as_str(),
            self.assoc_type.as_str(),
        ];

        SERIALIZED_FIELDS.iter().copied().zip(values).collect::<KvForm>().encode()
    }

    /// Parse the output of [`Association::serialize`]
    pub fn deserialize(text: &str) -> Result<Self> {
        let form = KvForm::parse(text);
        let keys: Vec<&str> = form.keys().collect();
        if keys != SERIALIZED_FIELDS {
            return Err(OpenIdError::InvalidEncoding(format!(
                "unexpected association fields: {:?}",
                keys
            )));
        }

        let field = |name: &str| form.get(name).unwrap_or_default();

        if field("version") != SERIALIZATION_VERSION {
            return Err(OpenIdError::InvalidEncoding(format!(
                "unknown association version {:?}",
                field("version")
            )));
        }

        let issued = parse_secs(field("issued"), "issued")?;
        let lifetime = parse_secs(field("lifetime"), "lifetime")?;
        let secret = codec::from_b64(field("secret"))?;
        let assoc_type = field("assoc_type").parse()?;

        Self::new(field("handle"), secret, issued, lifetime, assoc_type)
            .map_err(|e| OpenIdError::InvalidEncoding(e.to_string()))
    }
}

fn parse_secs(value: &str, name: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| OpenIdError::InvalidEncoding(format!("invalid {}: {:?}", name, value)))
}

impl fmt::Debug for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Association")
            .field("handle", &self.handle)
            .field("issued", &self.issued)
            .field("lifetime", &self.lifetime)
            .field("assoc_type", &self.assoc_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Association {
        Association::new("handle-1", vec![7u8; 20], 1_000, 600, AssociationType::HmacSha1).unwrap()
    }

    #[test]
    fn test_expiry_boundary() {
        let assoc = sample();
        assert_eq!(assoc.expires_at(), 1_600);
        assert!(!assoc.is_expired(1_599));
        assert!(assoc.is_expired(1_600));
        assert_eq!(assoc.expires_in(1_000), 600);
        assert_eq!(assoc.expires_in(2_000), 0);
    }

    #[test]
    fn test_secret_length_checked() {
        let result = Association::new("h", vec![0u8; 20], 0, 1, AssociationType::HmacSha256);
        assert!(matches!(result, Err(OpenIdError::InvalidArgument(_))));
        assert!(Association::new("h", vec![0u8; 32], 0, 1, AssociationType::HmacSha256).is_ok());
        assert!(Association::new("", vec![0u8; 20], 0, 1, AssociationType::HmacSha1).is_err());
    }

    #[test]
    fn test_handle_must_be_printable_without_spaces() {
        for bad in ["with space", "line\nbreak", "nul\0byte", "caf\u{e9}"] {
            let result = Association::new(bad, vec![0u8; 20], 0, 1, AssociationType::HmacSha1);
            assert!(matches!(result, Err(OpenIdError::InvalidArgument(_))), "{:?}", bad);
        }
        assert!(Association::new("{HMAC-SHA1}{4f2a}{x==}", vec![0u8; 20], 0, 1, AssociationType::HmacSha1).is_ok());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let assoc = sample();
        let text = assoc.serialize();
        assert!(text.starts_with("version:2\nhandle:handle-1\n"));
        assert!(text.ends_with("assoc_type:HMAC-SHA1\n"));
        assert_eq!(Association::deserialize(&text).unwrap(), assoc);
    }

    #[test]
    fn test_deserialize_rejects_bad_input() {
        assert!(Association::deserialize("version:2\nhandle:x\n").is_err());

        let wrong_version = sample().serialize().replace("version:2", "version:1");
        assert!(Association::deserialize(&wrong_version).is_err());

        let bad_time = sample().serialize().replace("issued:1000", "issued:soon");
        assert!(Association::deserialize(&bad_time).is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", sample());
        assert!(rendered.contains("handle-1"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_from_expires_in() {
        let assoc = Association::from_expires_in(
            300,
            "h",
            vec![1u8; 32],
            AssociationType::HmacSha256,
            5_000,
        )
        .unwrap();
        assert_eq!(assoc.issued(), 5_000);
        assert_eq!(assoc.expires_in(5_100), 200);
    }

    #[test]
    fn test_signer_uses_association_secret() {
        let assoc = sample();
        let fields: KvForm = [("mode", "id_res")].into_iter().collect();
        let signed = assoc.signer().sign(&fields, &["mode"]).unwrap();
        assert!(assoc.signer().verify(&fields, "mode", &signed.sig).is_ok());
    }
}
