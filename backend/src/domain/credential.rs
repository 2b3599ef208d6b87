//! Signed credential verification.
//!
//! Clients authenticate with an opaque, query-string shaped assertion issued
//! by the identity provider: `key=value` pairs carrying an `auth_date`
//! issuance timestamp, a JSON `user` subfield, and a `hash` signature.
//!
//! Verification recomputes an HMAC-SHA256 digest over the alphabetically
//! sorted, newline-joined `key=value` pairs (the `hash` field excluded) using
//! a derived key `HMAC-SHA256(key = "WebAppData", msg = shared secret)` and
//! compares it to the provided signature in constant time.
//!
//! The staleness window below bounds how long a captured credential stays
//! usable; within the window there is deliberately no replay protection, so
//! tightening it is a product decision rather than a code default.

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Maximum accepted age of a credential's `auth_date`, in seconds (24 hours,
/// clock-skew tolerant).
pub const CREDENTIAL_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Signing context mixed into the derived key.
const KEY_DERIVATION_CONTEXT: &[u8] = b"WebAppData";

/// Shared secret used to derive the credential signing key.
///
/// The secret is wiped from memory when dropped.
#[derive(Clone)]
pub struct CredentialSecret(Zeroizing<Vec<u8>>);

impl CredentialSecret {
    /// Wrap the provider-issued shared secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(secret.into()))
    }

    fn derived_key(&self) -> [u8; 32] {
        let mut mac = HmacSha256::new_from_slice(KEY_DERIVATION_CONTEXT)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(&self.0);
        mac.finalize().into_bytes().into()
    }
}

impl std::fmt::Debug for CredentialSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialSecret(..)")
    }
}

/// Why a credential was rejected.
///
/// Only logged internally; every variant surfaces to callers as the same
/// generic authentication failure so the check order cannot be probed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("credential is empty")]
    MissingCredential,
    #[error("credential carries no signature field")]
    MissingSignature,
    #[error("credential signature does not match")]
    BadSignature,
    #[error("credential issued more than {CREDENTIAL_MAX_AGE_SECS}s ago")]
    Expired,
    #[error("credential payload is malformed: {0}")]
    MalformedPayload(String),
}

/// Identity subfields embedded in the credential's `user` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct IdentityPayload {
    id: i64,
    first_name: String,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    /// Stable numeric identity assigned by the external provider.
    pub external_id: i64,
    /// Given name as asserted by the provider.
    pub first_name: String,
    /// Family name, when the provider supplies one.
    pub last_name: Option<String>,
    /// Avatar URL, when the provider supplies one.
    pub photo_url: Option<String>,
    /// Credential issuance time.
    pub issued_at: DateTime<Utc>,
}

impl VerifiedIdentity {
    /// Name shown to other users, combining the provided name parts.
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

/// Verify a raw credential against the shared secret at the given instant.
///
/// Pure: no clock access (the caller supplies `now`) and no side effects.
pub fn verify_credential(
    raw: &str,
    secret: &CredentialSecret,
    now: DateTime<Utc>,
) -> Result<VerifiedIdentity, CredentialError> {
    if raw.trim().is_empty() {
        return Err(CredentialError::MissingCredential);
    }

    let mut signature = None;
    let mut fields: Vec<(String, String)> = Vec::new();
    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        if key == "hash" {
            signature = Some(value.into_owned());
        } else {
            fields.push((key.into_owned(), value.into_owned()));
        }
    }

    let signature = signature.ok_or(CredentialError::MissingSignature)?;
    let signature = hex::decode(&signature).map_err(|_| CredentialError::BadSignature)?;

    fields.sort_by(|a, b| a.0.cmp(&b.0));
    let check_string = fields
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("\n");

    let mut mac = HmacSha256::new_from_slice(&secret.derived_key())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(check_string.as_bytes());
    // verify_slice is constant time.
    mac.verify_slice(&signature)
        .map_err(|_| CredentialError::BadSignature)?;

    let issued_at = field_value(&fields, "auth_date")
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| CredentialError::MalformedPayload("auth_date".to_owned()))?;

    if now.signed_duration_since(issued_at).num_seconds() > CREDENTIAL_MAX_AGE_SECS {
        return Err(CredentialError::Expired);
    }

    let user = field_value(&fields, "user")
        .ok_or_else(|| CredentialError::MalformedPayload("user".to_owned()))?;
    let payload: IdentityPayload = serde_json::from_str(user)
        .map_err(|err| CredentialError::MalformedPayload(err.to_string()))?;

    Ok(VerifiedIdentity {
        external_id: payload.id,
        first_name: payload.first_name,
        last_name: payload.last_name,
        photo_url: payload.photo_url,
        issued_at,
    })
}

fn field_value<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Test-only signing helpers mirroring the provider's procedure. Used by
/// this module's tests and by adapter tests that need a valid credential.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Build a signed credential from already-decoded pairs.
    pub(crate) fn sign(pairs: &[(&str, &str)], secret: &CredentialSecret) -> String {
        let mut sorted: Vec<_> = pairs.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let check_string = sorted
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut mac =
            HmacSha256::new_from_slice(&secret.derived_key()).expect("HMAC accepts any key");
        mac.update(check_string.as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());

        let mut encoded = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in pairs {
            encoded.append_pair(key, value);
        }
        encoded.append_pair("hash", &digest);
        encoded.finish()
    }

    /// Build a minimal valid credential for `external_id` issued at the
    /// given instant.
    pub(crate) fn sign_identity(
        secret: &CredentialSecret,
        external_id: i64,
        issued_at: DateTime<Utc>,
    ) -> String {
        let auth_date = issued_at.timestamp().to_string();
        let user = format!(r#"{{"id":{external_id},"first_name":"Test"}}"#);
        sign(
            &[("auth_date", auth_date.as_str()), ("user", user.as_str())],
            secret,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::sign;
    use super::*;
    use chrono::Duration;
    use rstest::{fixture, rstest};

    const SECRET: &str = "test-shared-secret";

    #[fixture]
    fn secret() -> CredentialSecret {
        CredentialSecret::new(SECRET.as_bytes().to_vec())
    }

    fn credential_issued_at(issued_at: DateTime<Utc>, secret: &CredentialSecret) -> String {
        let auth_date = issued_at.timestamp().to_string();
        sign(
            &[
                ("auth_date", auth_date.as_str()),
                (
                    "user",
                    r#"{"id":42,"first_name":"Ada","last_name":"Lovelace"}"#,
                ),
                ("query_id", "AAE42"),
            ],
            secret,
        )
    }

    #[rstest]
    fn valid_credential_yields_embedded_identity(secret: CredentialSecret) {
        let now = Utc::now();
        let raw = credential_issued_at(now - Duration::minutes(5), &secret);

        let identity = verify_credential(&raw, &secret, now).expect("credential verifies");
        assert_eq!(identity.external_id, 42);
        assert_eq!(identity.display_name(), "Ada Lovelace");
        assert!(identity.photo_url.is_none());
    }

    #[rstest]
    fn flipping_one_signature_byte_rejects(secret: CredentialSecret) {
        let now = Utc::now();
        let raw = credential_issued_at(now, &secret);

        // The hash is the final pair; flip its last hex digit.
        let flipped = match raw.chars().last() {
            Some('0') => format!("{}1", &raw[..raw.len() - 1]),
            Some(_) => format!("{}0", &raw[..raw.len() - 1]),
            None => unreachable!("credential is non-empty"),
        };

        let error = verify_credential(&flipped, &secret, now).expect_err("tampered signature");
        assert_eq!(error, CredentialError::BadSignature);
    }

    #[rstest]
    fn stale_credential_is_rejected_despite_valid_signature(secret: CredentialSecret) {
        let now = Utc::now();
        let raw = credential_issued_at(now - Duration::hours(25), &secret);

        let error = verify_credential(&raw, &secret, now).expect_err("stale credential");
        assert_eq!(error, CredentialError::Expired);
    }

    #[rstest]
    fn credential_just_inside_window_is_accepted(secret: CredentialSecret) {
        let now = Utc::now();
        let raw = credential_issued_at(now - Duration::hours(23), &secret);

        verify_credential(&raw, &secret, now).expect("fresh enough credential");
    }

    #[rstest]
    fn missing_signature_field_rejects(secret: CredentialSecret) {
        let error = verify_credential("auth_date=1&user=%7B%7D", &secret, Utc::now())
            .expect_err("unsigned credential");
        assert_eq!(error, CredentialError::MissingSignature);
    }

    #[rstest]
    fn empty_credential_rejects(secret: CredentialSecret) {
        let error = verify_credential("  ", &secret, Utc::now()).expect_err("blank credential");
        assert_eq!(error, CredentialError::MissingCredential);
    }

    #[rstest]
    fn malformed_user_json_rejects(secret: CredentialSecret) {
        let auth_date = Utc::now().timestamp().to_string();
        let raw = sign(
            &[("auth_date", auth_date.as_str()), ("user", "{not-json")],
            &secret,
        );

        let error = verify_credential(&raw, &secret, Utc::now()).expect_err("bad payload");
        assert!(matches!(error, CredentialError::MalformedPayload(_)));
    }

    #[rstest]
    fn wrong_secret_rejects(secret: CredentialSecret) {
        let other = CredentialSecret::new(b"another-secret".to_vec());
        let raw = credential_issued_at(Utc::now(), &other);

        let error = verify_credential(&raw, &secret, Utc::now()).expect_err("foreign signature");
        assert_eq!(error, CredentialError::BadSignature);
    }
}
