use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// `aud` may arrive as a single string or as an array of strings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>, // username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>, // role
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub jti: String,
}

impl Claims {
    /// Username the token was issued to
    pub fn subject(&self) -> Result<&str, TokenError> {
        match self.sub.as_deref() {
            Some(sub) if !sub.trim().is_empty() => Ok(sub),
            _ => Err(TokenError::MissingClaim("sub")),
        }
    }

    /// Role the token was issued for (first non-empty audience entry)
    pub fn role(&self) -> Result<&str, TokenError> {
        let role = match &self.aud {
            Some(Audience::One(role)) => Some(role.as_str()),
            Some(Audience::Many(roles)) => roles
                .iter()
                .map(String::as_str)
                .find(|r| !r.trim().is_empty()),
            None => None,
        };
        match role {
            Some(role) if !role.trim().is_empty() => Ok(role),
            _ => Err(TokenError::MissingClaim("aud")),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is expired")]
    Expired,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token is missing the {0} claim")]
    MissingClaim(&'static str),

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// A freshly minted token, whom it speaks for and when it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub username: String,
    pub role: String,
    pub expires_at: i64,
}

/// HS256 token codec. The secret is handed in at construction; nothing global.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            ttl: Duration::seconds(config.ttl_secs),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Create a token for `username` carrying `role` as audience
    pub fn issue(&self, username: &str, role: &str) -> Result<IssuedToken, TokenError> {
        self.issue_at(username, role, Utc::now())
    }

    /// Same as [`issue`](Self::issue) with an explicit issued-at instant
    pub fn issue_at(
        &self,
        username: &str,
        role: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let exp = issued_at + self.ttl;
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: Some(username.to_string()),
            aud: Some(Audience::One(role.to_string())),
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: exp.timestamp(),
            jti: jti.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)?;

        Ok(IssuedToken {
            token,
            jti,
            username: username.to_string(),
            role: role.to_string(),
            expires_at: exp.timestamp(),
        })
    }

    /// Check signature, issuer and expiry and return the claims.
    ///
    /// Says nothing about revocation; callers consult the ledger first.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        // aud carries the role, not an audience to match against
        validation.validate_aud = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(&JwtConfig {
            secret: secret.to_string(),
            issuer: "cerberus".to_string(),
            ttl_secs: 3600,
        })
    }

    #[test]
    fn test_issued_token_verifies_with_subject_and_role() {
        let codec = codec("a_secret_key");
        let issued = codec.issue("foobar", "USER").unwrap();

        let claims = codec.verify(&issued.token).unwrap();
        assert_eq!(claims.subject().unwrap(), "foobar");
        assert_eq!(claims.role().unwrap(), "USER");
        assert_eq!(claims.iss, "cerberus");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.jti, issued.jti);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issued = codec("").issue("foobar", "USER").unwrap();
        let err = codec("a_secret_key").verify(&issued.token).unwrap_err();
        assert!(matches!(err, TokenError::InvalidSignature));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let codec = codec("a_secret_key");
        let issued = codec
            .issue_at("foobar", "USER", Utc::now() - Duration::hours(2))
            .unwrap();
        assert!(matches!(codec.verify(&issued.token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_is_rejected() {
        let foreign = TokenCodec::new(&JwtConfig {
            secret: "a_secret_key".to_string(),
            issuer: "someone-else".to_string(),
            ttl_secs: 3600,
        });
        let issued = foreign.issue("foobar", "USER").unwrap();
        assert!(matches!(
            codec("a_secret_key").verify(&issued.token),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_two_tokens_in_same_second_differ() {
        let codec = codec("a_secret_key");
        let now = Utc::now();
        let a = codec.issue_at("foobar", "USER", now).unwrap();
        let b = codec.issue_at("foobar", "USER", now).unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_missing_and_array_audience() {
        let mut claims = Claims {
            sub: Some("foobar".to_string()),
            aud: None,
            iss: "cerberus".to_string(),
            iat: 0,
            exp: 0,
            jti: String::new(),
        };
        assert!(matches!(claims.role(), Err(TokenError::MissingClaim("aud"))));

        claims.aud = Some(Audience::Many(vec![String::new(), "ADMIN".to_string()]));
        assert_eq!(claims.role().unwrap(), "ADMIN");

        claims.sub = Some("  ".to_string());
        assert!(matches!(claims.subject(), Err(TokenError::MissingClaim("sub"))));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            codec("a_secret_key").verify("not.a.jwt"),
            Err(TokenError::Malformed(_))
        ));
    }
}
