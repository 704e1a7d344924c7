use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::BillingError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `t=<unix>,v1=<hex>` signatures.
pub const SIGNATURE_HEADER: &str = "x-billing-signature";

/// Maximum distance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Hex HMAC-SHA256 over `"{timestamp}.{body}"`.
#[must_use]
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// A complete header value for `body` signed at `timestamp`.
#[must_use]
pub fn header_value(secret: &str, timestamp: i64, body: &[u8]) -> String {
    format!("t={timestamp},v1={}", sign(secret, timestamp, body))
}

/// Verifies webhook signatures against a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    /// Returns `None` for a blank secret.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into().trim().to_owned();
        if secret.is_empty() {
            return None;
        }
        Some(Self {
            secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        })
    }

    #[must_use]
    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Check `header` against the raw request body.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::MalformedSignature` when the header lacks a
    /// timestamp or signature, `StaleTimestamp` when it falls outside the
    /// tolerance, and `SignatureMismatch` when no `v1` entry matches.
    pub fn verify(&self, header: &str, body: &[u8], now: DateTime<Utc>) -> Result<(), BillingError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| BillingError::MalformedSignature)?,
                    );
                }
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(BillingError::MalformedSignature)?;
        if signatures.is_empty() {
            return Err(BillingError::MalformedSignature);
        }

        let age_secs = now
            .timestamp()
            .checked_sub(timestamp)
            .ok_or(BillingError::MalformedSignature)?;
        let within = age_secs
            .checked_abs()
            .is_some_and(|age| age <= self.tolerance_secs);
        if !within {
            return Err(BillingError::StaleTimestamp { age_secs });
        }

        let matched = signatures.into_iter().any(|candidate| {
            let Ok(expected) = hex::decode(candidate) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
                return false;
            };
            mac.update(timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(body);
            mac.verify_slice(&expected).is_ok()
        });

        if matched {
            Ok(())
        } else {
            Err(BillingError::SignatureMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::time::fixed_now;

    const SECRET: &str = "whsec_test";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SECRET).unwrap()
    }

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"type":"ping"}"#;
        let header = header_value(SECRET, fixed_now().timestamp(), body);
        verifier().verify(&header, body, fixed_now()).unwrap();
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let body = b"{}";
        let t = fixed_now().timestamp();
        let header = format!("t={t},v1=deadbeef,v1={}", sign(SECRET, t, body));
        verifier().verify(&header, body, fixed_now()).unwrap();
    }

    #[test]
    fn rejects_tampered_body() {
        let header = header_value(SECRET, fixed_now().timestamp(), b"{\"a\":1}");
        assert!(matches!(
            verifier().verify(&header, b"{\"a\":2}", fixed_now()),
            Err(BillingError::SignatureMismatch)
        ));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let signed_at = fixed_now() - Duration::seconds(DEFAULT_TOLERANCE_SECS + 1);
        let header = header_value(SECRET, signed_at.timestamp(), b"{}");
        assert!(matches!(
            verifier().verify(&header, b"{}", fixed_now()),
            Err(BillingError::StaleTimestamp { age_secs: 301 })
        ));
    }

    #[test]
    fn rejects_malformed_headers() {
        for header in ["", "v1=abc", "t=12", "t=abc,v1=00"] {
            assert!(
                matches!(
                    verifier().verify(header, b"{}", fixed_now()),
                    Err(BillingError::MalformedSignature)
                ),
                "{header}"
            );
        }
    }

    #[test]
    fn extreme_timestamps_are_rejected_without_overflow() {
        let oldest = format!("t={},v1=00", i64::MIN);
        assert!(matches!(
            verifier().verify(&oldest, b"{}", fixed_now()),
            Err(BillingError::MalformedSignature)
        ));

        let newest = format!("t={},v1=00", i64::MAX);
        assert!(matches!(
            verifier().verify(&newest, b"{}", fixed_now()),
            Err(BillingError::StaleTimestamp { .. })
        ));
    }

    #[test]
    fn blank_secret_disables_verifier() {
        assert!(SignatureVerifier::new("  ").is_none());
    }
}
