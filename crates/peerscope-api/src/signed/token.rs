// Time-bound tokens for the signed-request transport.
//
// The claim set carries the command (or response text) under `payload`,
// bounded by `iat`/`nbf`/`exp`. Both directions use HS256 with the
// per-device shared secret.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    payload: serde_json::Value,
    iat: i64,
    nbf: i64,
    exp: i64,
}

/// Sign `payload` so it is valid from now until now + `lifetime`.
pub fn encode(payload: &str, secret: &[u8], lifetime: Duration) -> Result<String, Error> {
    let now = Utc::now().timestamp();
    let lifetime = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);
    let claims = Claims {
        payload: serde_json::Value::String(payload.to_owned()),
        iat: now,
        nbf: now,
        exp: now.saturating_add(lifetime),
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )?;
    Ok(token)
}

/// Verify `token` and return its payload as text.
///
/// Non-string payloads (some agents return structured JSON) are re-serialized.
pub fn decode(token: &str, secret: &[u8]) -> Result<String, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp", "nbf"]);

    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(match data.claims.payload {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn payload_survives_signing() {
        let token = encode("show version", b"s3cret", Duration::from_secs(30)).unwrap();
        assert_eq!(decode(&token, b"s3cret").unwrap(), "show version");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = encode("show version", b"s3cret", Duration::from_secs(30)).unwrap();
        let err = decode(&token, b"other").unwrap_err();
        assert!(matches!(err, Error::Token(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now().timestamp();
        let claims = Claims {
            payload: serde_json::Value::String("late".into()),
            iat: now - 600,
            nbf: now - 600,
            exp: now - 300,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"s3cret"),
        )
        .unwrap();
        assert!(decode(&token, b"s3cret").is_err());
    }
}
