//! One-way, secret-salted, kind-separated digesting (spec §4.1).
//!
//! Every identifier-like value (email, phone, device id, national id,
//! wallet, card bin+last4, ip, street address) passes through `digest`
//! before it is placed in an evaluation context or persisted. The digest
//! never round-trips: there is no decode path anywhere in this crate.
//!
//! Grounded on the teacher's HMAC signing in `vault/execution.rs`
//! (`sign_request`), which also builds an `Hmac<Sha256>` from a secret and
//! hex/base64-encodes the result; here the "message" is the domain tag
//! plus the raw value instead of a request body.

use anyhow::{bail, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The identifier kinds the scoring engine ever digests. Kept as an enum
/// (rather than a bare string) so two different kinds can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestKind {
    Email,
    Phone,
    DeviceId,
    DeviceFingerprint,
    NationalId,
    Wallet,
    CardBinLast4,
    Ip,
    StreetAddress,
    ApiKey,
}

impl DigestKind {
    fn tag(self) -> &'static str {
        match self {
            DigestKind::Email => "email",
            DigestKind::Phone => "phone",
            DigestKind::DeviceId => "device_id",
            DigestKind::DeviceFingerprint => "device_fingerprint",
            DigestKind::NationalId => "national_id",
            DigestKind::Wallet => "wallet",
            DigestKind::CardBinLast4 => "card_bin_last4",
            DigestKind::Ip => "ip",
            DigestKind::StreetAddress => "street_address",
            DigestKind::ApiKey => "api_key",
        }
    }
}

/// Deterministic digester keyed by a process secret.
#[derive(Clone)]
pub struct Hasher {
    secret: Vec<u8>,
}

impl Hasher {
    /// Fails with a `ConfigError`-flavored message if the secret is empty;
    /// the spec requires this to be a startup failure, not a per-request one.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.trim().is_empty() {
            bail!("ConfigError: SECRET_KEY is unset");
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
        })
    }

    /// `digest("email", "a") != digest("phone", "a")` by construction: the
    /// kind tag and a NUL separator are hashed ahead of the value.
    pub fn digest(&self, kind: DigestKind, value: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC accepts keys of any length");
        mac.update(kind.tag().as_bytes());
        mac.update(&[0u8]);
        mac.update(value.trim().to_lowercase().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Convenience for optional inputs: absence stays absent, never becomes
    /// a digest of an empty string.
    pub fn digest_opt(&self, kind: DigestKind, value: Option<&str>) -> Option<String> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| self.digest(kind, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_secret() {
        assert!(Hasher::new("").is_err());
        assert!(Hasher::new("   ").is_err());
    }

    #[test]
    fn deterministic_across_instances() {
        let a = Hasher::new("s3cret").unwrap();
        let b = Hasher::new("s3cret").unwrap();
        assert_eq!(
            a.digest(DigestKind::Email, "user@example.com"),
            b.digest(DigestKind::Email, "user@example.com")
        );
    }

    #[test]
    fn domain_separated_by_kind() {
        let h = Hasher::new("s3cret").unwrap();
        assert_ne!(
            h.digest(DigestKind::Email, "a"),
            h.digest(DigestKind::Phone, "a")
        );
    }

    #[test]
    fn case_and_whitespace_insensitive() {
        let h = Hasher::new("s3cret").unwrap();
        assert_eq!(
            h.digest(DigestKind::Email, "User@Example.com"),
            h.digest(DigestKind::Email, " user@example.com ")
        );
    }

    #[test]
    fn different_secrets_diverge() {
        let a = Hasher::new("secret-a").unwrap();
        let b = Hasher::new("secret-b").unwrap();
        assert_ne!(a.digest(DigestKind::Wallet, "0xabc"), b.digest(DigestKind::Wallet, "0xabc"));
    }

    #[test]
    fn digest_opt_treats_absence_as_absence() {
        let h = Hasher::new("s3cret").unwrap();
        assert!(h.digest_opt(DigestKind::Phone, None).is_none());
        assert!(h.digest_opt(DigestKind::Phone, Some("")).is_none());
        assert!(h.digest_opt(DigestKind::Phone, Some("+1234")).is_some());
    }
}
