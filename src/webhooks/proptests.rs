//! Property-Based Tests for the Webhook Pipeline
//!
//! - **Handshake**: the challenge is echoed verbatim exactly when mode and token
//!   match, and any mismatch is rejected whatever the challenge is
//! - **Normalization**: one canonical event per well-formed item, unknown
//!   objects and fields produce nothing, arbitrary JSON never panics
//! - **Signatures**: a signature verifies only against the bytes it was made for
//!
//! ```bash
//! cargo test --lib webhooks::proptests
//! ```

use proptest::prelude::*;
use serde_json::{json, Value};

use crate::webhooks::event::{CanonicalEvent, Platform};
use crate::webhooks::handshake::{verify_handshake, HandshakeParams};
use crate::webhooks::normalize::{normalize, RawPayload};
use crate::webhooks::signature::{SignatureAlgorithm, SignatureAuthenticator};

fn arb_json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn page_payload(texts: &[String]) -> Value {
    let messaging: Vec<Value> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            json!({
                "sender": {"id": format!("user-{i}")},
                "recipient": {"id": "page-1"},
                "message": {"mid": format!("m{i}"), "text": text}
            })
        })
        .collect();
    json!({"object": "page", "entry": [{"id": "page-1", "messaging": messaging}]})
}

proptest! {
    #[test]
    fn prop_valid_handshake_echoes_challenge(token in ".+", challenge in ".*") {
        let params = HandshakeParams {
            mode: Some("subscribe".to_string()),
            verify_token: Some(token.clone()),
            challenge: Some(challenge.clone()),
        };
        prop_assert_eq!(verify_handshake(&params, &token).unwrap(), challenge);
    }

    #[test]
    fn prop_mismatched_token_rejected(
        expected in "[a-z0-9]{1,16}",
        supplied in "[a-z0-9]{1,16}",
        challenge in ".*"
    ) {
        prop_assume!(expected != supplied);
        let params = HandshakeParams {
            mode: Some("subscribe".to_string()),
            verify_token: Some(supplied),
            challenge: Some(challenge),
        };
        prop_assert!(verify_handshake(&params, &expected).is_err());
    }

    #[test]
    fn prop_wrong_mode_rejected(mode in "[a-zA-Z]{0,12}", challenge in ".*") {
        prop_assume!(mode != "subscribe");
        let params = HandshakeParams {
            mode: Some(mode),
            verify_token: Some("token".to_string()),
            challenge: Some(challenge),
        };
        prop_assert!(verify_handshake(&params, "token").is_err());
    }

    #[test]
    fn prop_page_messages_map_one_to_one(texts in prop::collection::vec(".*", 0..8)) {
        let body = serde_json::to_vec(&page_payload(&texts)).unwrap();
        let events: Vec<CanonicalEvent> = normalize(RawPayload::from_slice(&body).unwrap()).collect();

        prop_assert_eq!(events.len(), texts.len());
        for (event, text) in events.iter().zip(&texts) {
            match event {
                CanonicalEvent::DirectMessage(m) => {
                    prop_assert_eq!(m.platform, Platform::Facebook);
                    prop_assert_eq!(m.text.as_deref(), Some(text.as_str()));
                }
                other => prop_assert!(false, "unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn prop_unknown_object_yields_nothing(object in "[a-z]{1,12}", entry in arb_json_value()) {
        prop_assume!(object != "instagram" && object != "page");
        let body = json!({"object": object, "entry": [{"changes": [entry.clone()], "messaging": [entry]}]});
        let payload = RawPayload::from_slice(&serde_json::to_vec(&body).unwrap()).unwrap();
        prop_assert_eq!(normalize(payload).count(), 0);
    }

    #[test]
    fn prop_any_object_shape_is_accepted(object in arb_json_value(), entry in arb_json_value()) {
        prop_assume!(object.as_str() != Some("instagram") && object.as_str() != Some("page"));
        let body = json!({"object": object, "entry": entry});
        let payload = RawPayload::from_slice(&serde_json::to_vec(&body).unwrap()).unwrap();
        prop_assert_eq!(normalize(payload).count(), 0);
    }

    #[test]
    fn prop_unknown_instagram_field_dropped(field in "[a-z_]{1,12}", value in arb_json_value()) {
        prop_assume!(!["messages", "comments", "mentions"].contains(&field.as_str()));
        let body = json!({"object": "instagram", "entry": [{"changes": [{"field": field, "value": value}]}]});
        let payload = RawPayload::from_slice(&serde_json::to_vec(&body).unwrap()).unwrap();
        prop_assert_eq!(normalize(payload).count(), 0);
    }

    #[test]
    fn prop_arbitrary_items_never_panic(
        object in prop_oneof![Just("instagram"), Just("page")],
        items in prop::collection::vec(arb_json_value(), 0..6)
    ) {
        let body = json!({"object": object, "entry": [{"changes": items.clone(), "messaging": items.clone()}]});
        let payload = RawPayload::from_slice(&serde_json::to_vec(&body).unwrap()).unwrap();
        let produced = normalize(payload).count();
        prop_assert!(produced <= items.len());
    }

    #[test]
    fn prop_signature_bound_to_body(
        secret in "[ -~]{1,32}",
        body in prop::collection::vec(any::<u8>(), 0..256),
        flip in any::<prop::sample::Index>()
    ) {
        let auth = SignatureAuthenticator::new(secret, false);
        for algorithm in [SignatureAlgorithm::Sha1, SignatureAlgorithm::Sha256] {
            let header = auth.sign(algorithm, &body);
            prop_assert!(auth.authenticate(&body, Some(&header)).is_ok());

            if !body.is_empty() {
                let mut tampered = body.clone();
                let i = flip.index(tampered.len());
                tampered[i] ^= 0x01;
                prop_assert!(auth.authenticate(&tampered, Some(&header)).is_err());
            }
        }
    }
}
