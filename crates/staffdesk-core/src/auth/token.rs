//! Structural validation of bearer tokens.
//!
//! Tokens are compact `header.payload.signature` strings. Only the payload
//! is inspected: it must be a JSON object carrying a `user_id`, and its
//! `exp` (seconds since epoch), when present, must lie in the future.
//! The signature is NOT verified here; the backend remains the authority.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// base64url that accepts payloads with or without `=` padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims read from a token payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenClaims {
    /// Expiry in seconds since epoch. `None` means the token never expires.
    pub exp: Option<f64>,
    pub user_id: Option<Value>,
    pub token_type: Option<String>,
}

impl TokenClaims {
    fn from_payload(payload: &Map<String, Value>) -> Option<Self> {
        let exp = match payload.get("exp") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(n.as_f64()?),
            // Anything else in `exp` makes the payload malformed
            Some(_) => return None,
        };

        let user_id = payload.get("user_id").filter(|v| is_present(v)).cloned();
        let token_type = payload
            .get("token_type")
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(Self { exp, user_id, token_type })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => exp <= timestamp_secs(now),
            None => false,
        }
    }

    /// Seconds left before expiry, clamped at zero. `None` for tokens without `exp`.
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.exp
            .map(|exp| ((exp - timestamp_secs(now)).floor() as i64).max(0))
    }
}

/// `null`, `false`, `0` and `""` do not count as a subject.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn timestamp_secs(now: DateTime<Utc>) -> f64 {
    now.timestamp_millis() as f64 / 1000.0
}

/// Decode the payload segment of a token.
///
/// Returns `None` unless the token has exactly three segments and the
/// middle one is base64url-encoded JSON object data.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let bytes = PAYLOAD_ENGINE.decode(parts[1]).ok()?;
    let payload: Value = serde_json::from_slice(&bytes).ok()?;
    TokenClaims::from_payload(payload.as_object()?)
}

/// Check a token against the validity rules at a given instant.
pub fn is_valid_at(token: &str, now: DateTime<Utc>) -> bool {
    match decode_claims(token) {
        Some(claims) => !claims.is_expired_at(now) && claims.user_id.is_some(),
        None => false,
    }
}

/// Check a token against the validity rules at the current time.
pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, Utc::now())
}


#[cfg(test)]
mod tests {
    use super::test_tokens::{expired, mint, valid};
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use chrono::Duration;
    use serde_json::json;

    fn raw_token(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_wrong_segment_count_is_invalid() {
        let good = valid(1);
        let parts: Vec<&str> = good.split('.').collect();

        assert!(!is_valid(""));
        assert!(!is_valid("abc"));
        assert!(!is_valid(&format!("{}.{}", parts[0], parts[1])));
        assert!(!is_valid(&format!("{}.extra", good)));
        assert!(!is_valid(&format!("{}..{}", parts[0], parts[2])));
        assert!(is_valid(&good));
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let past = raw_token(&json!({"user_id": 7, "exp": now.timestamp() - 1}).to_string());
        let future = raw_token(&json!({"user_id": 7, "exp": now.timestamp() + 1}).to_string());

        assert!(!is_valid_at(&past, now));
        assert!(is_valid_at(&future, now));
        // exp equal to now is already expired
        let exact = raw_token(&json!({"user_id": 7, "exp": 1_700_000_000}).to_string());
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert!(!is_valid_at(&exact, at));
        assert!(is_valid_at(&exact, at - Duration::seconds(1)));
    }

    #[test]
    fn test_missing_exp_never_expires() {
        let token = raw_token(r#"{"user_id": 3}"#);
        assert!(is_valid(&token));
        assert_eq!(decode_claims(&token).unwrap().seconds_until_expiry(Utc::now()), None);
    }

    #[test]
    fn test_user_id_required() {
        assert!(!is_valid(&mint(json!({"exp": Utc::now().timestamp() + 60}))));
        assert!(!is_valid(&raw_token(r#"{"user_id": null}"#)));
        assert!(!is_valid(&raw_token(r#"{"user_id": 0}"#)));
        assert!(!is_valid(&raw_token(r#"{"user_id": ""}"#)));
        assert!(is_valid(&raw_token(r#"{"user_id": "a1b2"}"#)));
    }

    #[test]
    fn test_malformed_payloads_are_invalid() {
        assert!(!is_valid("a.!!!not-base64!!!.c"));
        assert!(!is_valid(&raw_token("not json")));
        assert!(!is_valid(&raw_token("[1, 2, 3]")));
        assert!(!is_valid(&raw_token(r#"{"user_id": 1, "exp": "tomorrow"}"#)));
    }

    #[test]
    fn test_padded_payload_accepted() {
        let payload = STANDARD.encode(r#"{"user_id":12}"#);
        assert!(payload.ends_with('='));
        assert!(is_valid(&format!("h.{}.s", payload.replace('+', "-").replace('/', "_"))));
    }

    #[test]
    fn test_expired_token_is_invalid() {
        assert!(!is_valid(&expired(1)));
    }

    #[test]
    fn test_decode_claims_fields() {
        let claims = decode_claims(&valid(42)).expect("claims");
        assert_eq!(claims.user_id, Some(json!(42)));
        assert_eq!(claims.token_type.as_deref(), Some("access"));
        let left = claims.seconds_until_expiry(Utc::now()).unwrap();
        assert!(left > 3500 && left <= 3600);
    }
}
