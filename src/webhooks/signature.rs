//! Signature Authenticator
//!
//! Meta signs every delivery with the app secret: `x-hub-signature: sha1=<hex>`
//! (HMAC-SHA1) and, on newer apps, `x-hub-signature-256: sha256=<hex>`. The MAC
//! is computed over the exact request bytes, so verification must run on the
//! raw body before any JSON decoding.

use crate::webhooks::error::WebhookError;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Legacy SHA-1 signature header
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// SHA-256 signature header
pub const SIGNATURE_256_HEADER: &str = "x-hub-signature-256";

/// Hash algorithm named by the signature prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    pub fn prefix(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "sha1" => Some(SignatureAlgorithm::Sha1),
            "sha256" => Some(SignatureAlgorithm::Sha256),
            _ => None,
        }
    }
}

/// Outcome of a successful authentication check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authentication {
    /// Header present and matching
    Verified(SignatureAlgorithm),
    /// Header absent and not required; accepted unverified
    Unsigned,
}

/// Validates payload signatures with the shared app secret
#[derive(Clone)]
pub struct SignatureAuthenticator {
    secret: String,
    require_signature: bool,
}

impl std::fmt::Debug for SignatureAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureAuthenticator")
            .field("secret", &"<redacted>")
            .field("require_signature", &self.require_signature)
            .finish()
    }
}

impl SignatureAuthenticator {
    pub fn new(secret: impl Into<String>, require_signature: bool) -> Self {
        Self {
            secret: secret.into(),
            require_signature,
        }
    }

    /// Produce a header value (`<algo>=<hex>`) for `body`
    pub fn sign(&self, algorithm: SignatureAlgorithm, body: &[u8]) -> String {
        let digest = match algorithm {
            SignatureAlgorithm::Sha1 => {
                let mut mac = HmacSha1::new_from_slice(self.secret.as_bytes())
                    .expect("HMAC can take key of any size");
                mac.update(body);
                mac.finalize().into_bytes().to_vec()
            }
            SignatureAlgorithm::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
                    .expect("HMAC can take key of any size");
                mac.update(body);
                mac.finalize().into_bytes().to_vec()
            }
        };
        format!("{}={}", algorithm.prefix(), hex::encode(digest))
    }

    /// Check `header` against the raw `body`.
    ///
    /// An absent header is accepted as [`Authentication::Unsigned`] unless
    /// signatures are required.
    pub fn authenticate(&self, body: &[u8], header: Option<&str>) -> Result<Authentication, WebhookError> {
        let Some(header) = header else {
            if self.require_signature {
                return Err(WebhookError::SignatureMissing);
            }
            return Ok(Authentication::Unsigned);
        };

        let (prefix, hex_digest) = header
            .trim()
            .split_once('=')
            .ok_or_else(|| WebhookError::SignatureMismatch("missing algorithm prefix".into()))?;
        let algorithm = SignatureAlgorithm::from_prefix(prefix)
            .ok_or_else(|| WebhookError::SignatureMismatch(format!("unsupported algorithm {prefix}")))?;
        let expected = hex::decode(hex_digest)
            .map_err(|_| WebhookError::SignatureMismatch("signature is not hex".into()))?;

        let verified = match algorithm {
            SignatureAlgorithm::Sha1 => {
                let mut mac = HmacSha1::new_from_slice(self.secret.as_bytes())
                    .map_err(|_| WebhookError::SignatureMismatch("invalid secret".into()))?;
                mac.update(body);
                mac.verify_slice(&expected).is_ok()
            }
            SignatureAlgorithm::Sha256 => {
                let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
                    .map_err(|_| WebhookError::SignatureMismatch("invalid secret".into()))?;
                mac.update(body);
                mac.verify_slice(&expected).is_ok()
            }
        };

        if verified {
            Ok(Authentication::Verified(algorithm))
        } else {
            Err(WebhookError::SignatureMismatch(format!(
                "{} digest does not match body",
                algorithm.prefix()
            )))
        }
    }
}

/// Pick the signature header from a request, preferring SHA-256.
///
/// A header that is present but not valid UTF-8 is returned as an empty string
/// so it fails verification instead of counting as absent.
pub fn signature_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SIGNATURE_256_HEADER)
        .or_else(|| headers.get(SIGNATURE_HEADER))
        .map(|value| value.to_str().unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const BODY: &[u8] = br#"{"object":"page","entry":[]}"#;

    #[test]
    fn test_sha1_known_vector() {
        // RFC 2202 test case 2
        let auth = SignatureAuthenticator::new("Jefe", false);
        let sig = auth.sign(SignatureAlgorithm::Sha1, b"what do ya want for nothing?");
        assert_eq!(sig, "sha1=effcdf6ae5eb2fa2d27416d5f184df9c259a7c79");
    }

    #[test]
    fn test_sign_and_verify_both_algorithms() {
        let auth = SignatureAuthenticator::new("app-secret", false);
        for algorithm in [SignatureAlgorithm::Sha1, SignatureAlgorithm::Sha256] {
            let header = auth.sign(algorithm, BODY);
            assert_eq!(
                auth.authenticate(BODY, Some(&header)).unwrap(),
                Authentication::Verified(algorithm)
            );
        }
    }

    #[test]
    fn test_mismatch_on_wrong_secret() {
        let signer = SignatureAuthenticator::new("other", false);
        let auth = SignatureAuthenticator::new("app-secret", false);
        let header = signer.sign(SignatureAlgorithm::Sha1, BODY);
        assert!(matches!(
            auth.authenticate(BODY, Some(&header)),
            Err(WebhookError::SignatureMismatch(_))
        ));
    }

    #[test]
    fn test_body_bytes_matter() {
        let auth = SignatureAuthenticator::new("app-secret", false);
        let header = auth.sign(SignatureAlgorithm::Sha1, BODY);
        // Same JSON, different whitespace
        let reformatted = br#"{ "object": "page", "entry": [] }"#;
        assert!(auth.authenticate(reformatted, Some(&header)).is_err());
    }

    #[test]
    fn test_malformed_headers() {
        let auth = SignatureAuthenticator::new("app-secret", false);
        assert!(auth.authenticate(BODY, Some("deadbeef")).is_err());
        assert!(auth.authenticate(BODY, Some("md5=deadbeef")).is_err());
        assert!(auth.authenticate(BODY, Some("sha1=not-hex")).is_err());
        assert!(auth.authenticate(BODY, Some("")).is_err());
    }

    #[test]
    fn test_missing_header_permissive_by_default() {
        let auth = SignatureAuthenticator::new("app-secret", false);
        assert_eq!(auth.authenticate(BODY, None).unwrap(), Authentication::Unsigned);
    }

    #[test]
    fn test_missing_header_rejected_when_required() {
        let auth = SignatureAuthenticator::new("app-secret", true);
        assert!(matches!(
            auth.authenticate(BODY, None),
            Err(WebhookError::SignatureMissing)
        ));
    }

    #[test]
    fn test_header_selection_prefers_sha256() {
        let mut headers = HeaderMap::new();
        assert_eq!(signature_header(&headers), None);

        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("sha1=aa"));
        assert_eq!(signature_header(&headers), Some("sha1=aa"));

        headers.insert(SIGNATURE_256_HEADER, HeaderValue::from_static("sha256=bb"));
        assert_eq!(signature_header(&headers), Some("sha256=bb"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let auth = SignatureAuthenticator::new("super-secret", false);
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
