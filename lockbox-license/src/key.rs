//! Premium key parsing and RS256 signature verification.
//!
//! Premium keys are compact tokens: three base64url segments joined by `.`,
//! holding the header JSON, the payload JSON and an RSA-SHA256 signature
//! over `header_b64 + "." + payload_b64`.
//!
//! The payload is a JSON object containing:
//! - `jti`: key id
//! - `name`: licensee name
//! - `email`: licensee email
//! - `company`: organization (optional)
//! - `exp`: expiration timestamp, seconds since epoch (optional)
//! - `nbf`: not-before timestamp, seconds since epoch (optional)
//!
//! Timestamps may carry a fractional part. `exp` rounds up and `nbf` rounds
//! down, so neither ever makes a key valid for longer than it was signed for.

use crate::error::{LicenseError, LicenseResult};
use crate::public_key::{spki_der_to_pem, PREMIUM_PUBLIC_KEY_DER};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of dot-separated segments in a compact token.
const TOKEN_SEGMENTS: usize = 3;

/// A verified premium key.
///
/// The only way to obtain one is a successful [`PremiumKeyVerifier::verify`],
/// which is why this type serializes but does not deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PremiumKey {
    id: String,
    name: String,
    email: String,
    company: Option<String>,
    expiration_date: Option<DateTime<Utc>>,
}

impl PremiumKey {
    /// Returns the unique key id (`jti` claim).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the licensee name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the licensee email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the licensee organization, if the key names one.
    #[must_use]
    pub fn company(&self) -> Option<&str> {
        self.company.as_deref()
    }

    /// Returns the expiration date, or None for a key that never expires.
    #[must_use]
    pub fn expiration_date(&self) -> Option<DateTime<Utc>> {
        self.expiration_date
    }

    /// Returns true if the key has no expiration.
    #[must_use]
    pub fn is_perpetual(&self) -> bool {
        self.expiration_date.is_none()
    }

    /// Returns true if the key had expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|exp| exp < now)
    }
}

/// Raw payload claims. Every field is optional here so that absent
/// mandatory claims can be reported by name.
#[derive(Debug, Deserialize)]
struct PremiumClaims {
    jti: Option<String>,
    name: Option<String>,
    email: Option<String>,
    company: Option<String>,
    exp: Option<f64>,
    nbf: Option<f64>,
}

/// Verifies premium keys against an RSA public key.
///
/// Verification-only: the verifier holds no secret and accepts nothing but
/// RS256 signatures.
#[derive(Clone)]
pub struct PremiumKeyVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl PremiumKeyVerifier {
    /// Creates a verifier for the public key embedded in this build.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyMaterial`] if the embedded key cannot be loaded.
    pub fn embedded() -> LicenseResult<Self> {
        Self::from_public_key_der(PREMIUM_PUBLIC_KEY_DER)
    }

    /// Creates a verifier for a DER-encoded (SubjectPublicKeyInfo) RSA public key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::KeyMaterial`] if the bytes are not an RSA public key.
    pub fn from_public_key_der(der: &[u8]) -> LicenseResult<Self> {
        let pem = spki_der_to_pem(der);
        let decoding_key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| LicenseError::KeyMaterial(e.to_string()))?;

        // Temporal claims are checked in `verify_at` against an explicit clock.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Parses and verifies a premium key at the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, the signature does not
    /// verify, a mandatory claim is missing, or the key has expired.
    pub fn verify(&self, token: &str) -> LicenseResult<PremiumKey> {
        self.verify_at(token, Utc::now())
    }

    /// Parses and verifies a premium key, evaluating `exp`/`nbf` against `now`.
    ///
    /// # Errors
    ///
    /// See [`PremiumKeyVerifier::verify`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> LicenseResult<PremiumKey> {
        let token = token.trim();
        if token.is_empty() {
            return Err(LicenseError::Malformed("premium key is empty".to_string()));
        }

        let segments = token.split('.').count();
        if segments != TOKEN_SEGMENTS {
            return Err(LicenseError::Malformed(format!(
                "expected {TOKEN_SEGMENTS} dot-separated segments, found {segments}"
            )));
        }

        let claims =
            jsonwebtoken::decode::<PremiumClaims>(token, &self.decoding_key, &self.validation)
                .map_err(classify_decode_error)?
                .claims;

        let id = required_claim(claims.jti, "jti")?;
        let name = required_claim(claims.name, "name")?;
        let email = required_claim(claims.email, "email")?;
        let expiration_date = claims.exp.and_then(expiration_claim);
        let not_before = claims.nbf.and_then(not_before_claim);

        if let Some(nbf) = not_before {
            if nbf > now {
                return Err(LicenseError::NotYetValid(nbf));
            }
        }
        if let Some(exp) = expiration_date {
            if exp < now {
                return Err(LicenseError::Expired(exp));
            }
        }

        Ok(PremiumKey {
            id,
            name,
            email,
            company: claims.company,
            expiration_date,
        })
    }
}

impl fmt::Debug for PremiumKeyVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PremiumKeyVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

fn classify_decode_error(err: jsonwebtoken::errors::Error) -> LicenseError {
    match err.kind() {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
            LicenseError::InvalidSignature
        }
        ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
            LicenseError::KeyMaterial(err.to_string())
        }
        _ => LicenseError::Malformed(err.to_string()),
    }
}

fn required_claim(value: Option<String>, claim: &'static str) -> LicenseResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LicenseError::MissingClaim(claim)),
    }
}

/// Converts `exp`; None when it lies past the representable range.
fn expiration_claim(secs: f64) -> Option<DateTime<Utc>> {
    // `as` saturates, so huge values land on i64::MAX
    let secs = secs.ceil() as i64;
    match DateTime::from_timestamp(secs, 0) {
        Some(exp) => Some(exp),
        None if secs > 0 => None,
        None => Some(DateTime::<Utc>::MIN_UTC),
    }
}

/// Converts `nbf`; None when it lies before the representable range.
fn not_before_claim(secs: f64) -> Option<DateTime<Utc>> {
    let secs = secs.floor() as i64;
    match DateTime::from_timestamp(secs, 0) {
        Some(nbf) => Some(nbf),
        None if secs < 0 => None,
        None => Some(DateTime::<Utc>::MAX_UTC),
    }
}
