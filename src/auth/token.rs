// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token codec.
//!
//! Tokens are HS256 JWTs signed with the server secret. The role is carried
//! as a session tag, `HMAC-SHA256(secret, role_name)` encoded as unpadded
//! base64url, and is re-derived on every authorization check.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use sha2::Sha256;

use super::claims::SessionClaims;
use super::roles::Role;

type HmacSha256 = Hmac<Sha256>;

/// Token codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// A freshly signed token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Issues and parses session tokens with a single server secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    refresh_window: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .field("refresh_window", &self.refresh_window)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec.
    ///
    /// `ttl` is the lifetime of every issued or refreshed token;
    /// `refresh_window` is the trailing span before expiry during which the
    /// session middleware reissues the token.
    pub fn new(secret: &[u8], ttl: Duration, refresh_window: Duration) -> Self {
        Self {
            secret: secret.to_vec(),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            refresh_window,
        }
    }

    fn keyed_mac(&self, role: Role) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(role.as_str().as_bytes());
        mac
    }

    /// Derive the session tag for a role.
    pub fn session_tag(&self, role: Role) -> String {
        let digest = self.keyed_mac(role).finalize().into_bytes();
        Base64UrlUnpadded::encode_string(&digest)
    }

    /// Check a presented tag against the tag for `role` in constant time.
    pub fn tag_matches(&self, tag: &str, role: Role) -> bool {
        match Base64UrlUnpadded::decode_vec(tag) {
            Ok(bytes) => self.keyed_mac(role).verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    /// First role in `allowed` whose tag matches.
    pub fn match_role(&self, tag: &str, allowed: &[Role]) -> Option<Role> {
        allowed
            .iter()
            .copied()
            .find(|role| self.tag_matches(tag, *role))
    }

    /// Sign a token for `subject` carrying `session_tag`, expiring at `expires_at`.
    pub fn issue(
        &self,
        subject: u64,
        session_tag: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let claims = SessionClaims {
            sub: subject.to_string(),
            session: session_tag.to_string(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Sign a token for a credential holding `role`, valid for the configured TTL.
    pub fn issue_for_role(&self, subject: u64, role: Role) -> Result<IssuedToken, TokenError> {
        self.issue(subject, &self.session_tag(role), Utc::now() + self.ttl)
    }

    /// Verify signature and expiry and return the claims.
    ///
    /// No clock-skew leeway: a token is expired as soon as `now > exp`.
    pub fn parse(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_aud = false;

        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            })
    }

    /// Whether the remaining lifetime of `claims` is inside the refresh window.
    pub fn needs_refresh(&self, claims: &SessionClaims, now: DateTime<Utc>) -> bool {
        claims.exp - now.timestamp() <= self.refresh_window.num_seconds()
    }

    /// Reissue a token with the same subject and tag and a fresh expiry.
    pub fn refresh(&self, claims: &SessionClaims) -> Result<IssuedToken, TokenError> {
        let subject = claims.subject_id().ok_or(TokenError::Malformed)?;
        self.issue(subject, &claims.session, Utc::now() + self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            b"test-secret",
            Duration::hours(1),
            Duration::minutes(10),
        )
    }

    #[test]
    fn issued_token_parses_back_to_claims() {
        let codec = codec();
        let issued = codec.issue_for_role(7, Role::Merchant).unwrap();

        let claims = codec.parse(&issued.token).unwrap();
        assert_eq!(claims.subject_id(), Some(7));
        assert_eq!(claims.session, codec.session_tag(Role::Merchant));
        assert_eq!(claims.exp, issued.expires_at.timestamp());
        assert!(claims.iat <= claims.exp);
    }

    #[test]
    fn parsing_twice_yields_identical_claims() {
        let codec = codec();
        let issued = codec.issue_for_role(3, Role::Detonator).unwrap();

        let first = codec.parse(&issued.token).unwrap();
        let second = codec.parse(&issued.token).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        let tag = codec.session_tag(Role::Merchant);
        let issued = codec
            .issue(1, &tag, Utc::now() - Duration::seconds(5))
            .unwrap();

        assert_eq!(codec.parse(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let ours = codec();
        let theirs = TokenCodec::new(b"other-secret", Duration::hours(1), Duration::minutes(10));
        let issued = theirs.issue_for_role(1, Role::SuperAdmin).unwrap();

        assert_eq!(ours.parse(&issued.token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.parse("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(codec.parse(""), Err(TokenError::Malformed));
    }

    #[test]
    fn tampered_payload_invalidates_signature() {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

        let codec = codec();
        let issued = codec.issue_for_role(5, Role::Merchant).unwrap();
        let parts: Vec<&str> = issued.token.split('.').collect();

        let forged_claims = format!(
            r#"{{"sub":"6","session":"{}","iat":0,"exp":9999999999}}"#,
            codec.session_tag(Role::Merchant)
        );
        let forged = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(forged_claims.as_bytes()),
            parts[2]
        );

        assert_eq!(codec.parse(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn session_tag_is_keyed_and_role_specific() {
        let codec = codec();
        let other = TokenCodec::new(b"other-secret", Duration::hours(1), Duration::minutes(10));

        assert_ne!(codec.session_tag(Role::Merchant), codec.session_tag(Role::Detonator));
        assert_ne!(codec.session_tag(Role::Merchant), other.session_tag(Role::Merchant));
        assert!(!codec.session_tag(Role::Merchant).contains("merchant"));
    }

    #[test]
    fn tag_matching_uses_allow_list() {
        let codec = codec();
        let tag = codec.session_tag(Role::Merchant);

        assert!(codec.tag_matches(&tag, Role::Merchant));
        assert!(!codec.tag_matches(&tag, Role::Detonator));
        assert!(!codec.tag_matches("%%%", Role::Merchant));
        assert_eq!(codec.match_role(&tag, &[Role::Detonator]), None);
        assert_eq!(
            codec.match_role(&tag, &[Role::Detonator, Role::Merchant]),
            Some(Role::Merchant)
        );
    }

    #[test]
    fn refresh_window_detection() {
        let codec = codec();
        let now = Utc::now();
        let mut claims = SessionClaims {
            sub: "1".to_string(),
            session: codec.session_tag(Role::Merchant),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(5)).timestamp(),
        };
        assert!(codec.needs_refresh(&claims, now));

        claims.exp = (now + Duration::minutes(30)).timestamp();
        assert!(!codec.needs_refresh(&claims, now));
    }

    #[test]
    fn refresh_extends_expiry_and_keeps_identity() {
        let codec = codec();
        let tag = codec.session_tag(Role::Detonator);
        let short = codec.issue(9, &tag, Utc::now() + Duration::minutes(2)).unwrap();
        let claims = codec.parse(&short.token).unwrap();

        let refreshed = codec.refresh(&claims).unwrap();
        let refreshed_claims = codec.parse(&refreshed.token).unwrap();

        assert!(refreshed_claims.exp > claims.exp);
        assert_eq!(refreshed_claims.sub, claims.sub);
        assert_eq!(refreshed_claims.session, claims.session);
        assert_eq!(refreshed_claims.exp, refreshed.expires_at.timestamp());
    }

    #[test]
    fn bearer_formats_header_value() {
        let issued = IssuedToken {
            token: "abc".to_string(),
            expires_at: Utc::now(),
        };
        assert_eq!(issued.bearer(), "Bearer abc");
    }
}
