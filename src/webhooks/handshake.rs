// Handshake Verifier
//
// Meta proves endpoint ownership with a GET carrying hub.mode, hub.verify_token
// and hub.challenge. The challenge is echoed back untouched when the mode is
// "subscribe" and the token matches the configured one.

use crate::webhooks::error::WebhookError;
use serde::Deserialize;

/// Query parameters of a handshake request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HandshakeParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,

    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,

    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Decide a handshake.
///
/// Returns the challenge to echo on success. A missing challenge on an
/// otherwise valid handshake echoes an empty body.
pub fn verify_handshake(params: &HandshakeParams, expected_token: &str) -> Result<String, WebhookError> {
    let mode_ok = params.mode.as_deref() == Some("subscribe");
    let token_ok = params.verify_token.as_deref() == Some(expected_token);

    if mode_ok && token_ok {
        Ok(params.challenge.clone().unwrap_or_default())
    } else {
        Err(WebhookError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: &str, token: &str, challenge: &str) -> HandshakeParams {
        HandshakeParams {
            mode: Some(mode.to_string()),
            verify_token: Some(token.to_string()),
            challenge: Some(challenge.to_string()),
        }
    }

    #[test]
    fn test_valid_handshake_echoes_challenge() {
        let result = verify_handshake(&params("subscribe", "secret", "1158201444"), "secret");
        assert_eq!(result.unwrap(), "1158201444");
    }

    #[test]
    fn test_challenge_is_not_transformed() {
        let challenge = "  {\"json\": true} & spaces  ";
        let result = verify_handshake(&params("subscribe", "t", challenge), "t");
        assert_eq!(result.unwrap(), challenge);
    }

    #[test]
    fn test_wrong_token_rejected() {
        let result = verify_handshake(&params("subscribe", "nope", "c"), "secret");
        assert!(matches!(result, Err(WebhookError::VerificationFailed)));
    }

    #[test]
    fn test_wrong_mode_rejected() {
        let result = verify_handshake(&params("unsubscribe", "secret", "c"), "secret");
        assert!(matches!(result, Err(WebhookError::VerificationFailed)));

        // Mode comparison is exact
        let result = verify_handshake(&params("Subscribe", "secret", "c"), "secret");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_params_rejected() {
        let result = verify_handshake(&HandshakeParams::default(), "secret");
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_challenge_echoes_empty() {
        let p = HandshakeParams {
            mode: Some("subscribe".into()),
            verify_token: Some("secret".into()),
            challenge: None,
        };
        assert_eq!(verify_handshake(&p, "secret").unwrap(), "");
    }
}
