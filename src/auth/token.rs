//! Token claim decoding and expiry checks.
//!
//! Access and refresh tokens are opaque to this crate except for the claims
//! segment, which carries the expiry timestamp. Decoding never panics: a
//! token that cannot be decoded is treated as expired.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Prefix marking a token as exempt from expiry checks.
/// Issued by development backends only; honored only when the codec is
/// constructed with dev tokens allowed.
pub const DEV_TOKEN_PREFIX: &str = "dev.";

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("token is not a three-part JWT")]
    MalformedToken,

    #[error("claims segment is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("claims segment is not valid JSON: {0}")]
    InvalidClaims(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry as epoch seconds.
    pub exp: i64,
}

/// Decode the claims segment of a token. Pure; no clock access.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    let mut parts = token.split('.');
    let (_header, payload) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(_sig), None) => (h, p),
        _ => return Err(DecodeError::MalformedToken),
    };
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Expiry oracle for stored tokens.
///
/// `allow_dev_tokens` is a construction-time capability: when off (the
/// production default), `dev.`-prefixed tokens get no special treatment and
/// fail decoding like any other malformed token.
#[derive(Debug, Clone, Copy)]
pub struct TokenCodec {
    allow_dev_tokens: bool,
}

impl TokenCodec {
    pub fn new(allow_dev_tokens: bool) -> Self {
        Self { allow_dev_tokens }
    }

    /// Whether the token carries the development bypass marker and the
    /// capability to honor it is enabled.
    pub fn is_bypass(&self, token: &str) -> bool {
        self.allow_dev_tokens && token.starts_with(DEV_TOKEN_PREFIX)
    }

    /// Whether the token is expired at `now`.
    ///
    /// Fail-closed: a token that cannot be decoded counts as expired.
    /// Bypass-marked tokens never expire.
    pub fn is_expired(&self, token: &str, now: DateTime<Utc>) -> bool {
        if self.is_bypass(token) {
            return false;
        }
        match decode(token) {
            Ok(claims) => claims.exp <= now.timestamp(),
            Err(_) => true,
        }
    }
}

/// Build an unsigned JWT-shaped token with the given expiry. Test helper.
#[cfg(test)]
pub(crate) fn make_token(exp: i64) -> String {
    let b64 = |b: &[u8]| base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b);
    let header = b64(br#"{"alg":"none"}"#);
    let payload = b64(format!(r#"{{"sub":"user-1","exp":{exp}}}"#).as_bytes());
    format!("{header}.{payload}.sig")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn decodes_valid_claims() {
        let token = make_token(1_900_000_000);
        let claims = decode(&token).expect("decode");
        assert_eq!(claims.exp, 1_900_000_000);
        assert_eq!(claims.sub.as_deref(), Some("user-1"));
    }

    #[test]
    fn decode_rejects_malformed_tokens() {
        assert!(matches!(decode(""), Err(DecodeError::MalformedToken)));
        assert!(matches!(decode("a.b"), Err(DecodeError::MalformedToken)));
        assert!(matches!(decode("a.b.c.d"), Err(DecodeError::MalformedToken)));
        assert!(matches!(decode("a.!!!.c"), Err(DecodeError::InvalidBase64(_))));

        let b64 = |b: &[u8]| base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b);
        let not_json = format!("{}.{}.sig", b64(b"{}"), b64(b"not json"));
        assert!(matches!(decode(&not_json), Err(DecodeError::InvalidClaims(_))));
    }

    #[test]
    fn expired_token_is_expired() {
        let codec = TokenCodec::new(false);
        let now = Utc::now();
        let past = (now - Duration::minutes(5)).timestamp();
        assert!(codec.is_expired(&make_token(past), now));
    }

    #[test]
    fn future_token_is_not_expired() {
        let codec = TokenCodec::new(false);
        let now = Utc::now();
        let future = (now + Duration::minutes(30)).timestamp();
        assert!(!codec.is_expired(&make_token(future), now));
    }

    #[test]
    fn undecodable_token_is_expired() {
        let codec = TokenCodec::new(false);
        assert!(codec.is_expired("garbage", Utc::now()));
        assert!(codec.is_expired("", Utc::now()));
    }

    #[test]
    fn exp_exactly_now_is_expired() {
        let codec = TokenCodec::new(false);
        let now = Utc::now();
        assert!(codec.is_expired(&make_token(now.timestamp()), now));
    }

    #[test]
    fn dev_token_bypasses_expiry_only_when_allowed() {
        let now = Utc::now();
        let dev_token = "dev.local-coach";

        let permissive = TokenCodec::new(true);
        assert!(permissive.is_bypass(dev_token));
        assert!(!permissive.is_expired(dev_token, now));

        // Production codec: the prefix is meaningless and the token fails
        // decoding, so it reads as expired.
        let strict = TokenCodec::new(false);
        assert!(!strict.is_bypass(dev_token));
        assert!(strict.is_expired(dev_token, now));
    }
}
