use std::io;
use chrono::prelude::*;
use crypto::hmac::Hmac;
use crypto::mac::{Mac, MacResult};
use crypto::sha2::Sha256;
use rand::prelude::*;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use uuid::Uuid;
use crate::UserId;

pub const AUTH_HEADER: &str = "authorization";
pub const AUTH_SCHEME: &str = "Bearer";
pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 15 * 60;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const JWT_ALG: &str = "HS256";

pub type Secret = [u8; 32];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization Header")]
    MissingHeader,

    #[error("Bad Authorization header. Expected 'Authorization: Bearer <JWT>'")]
    BadHeader,

    #[error("Invalid token: {0}")]
    Malformed(&'static str),

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("The token is not yet valid (nbf)")]
    Immature,

    #[error("Only access tokens are allowed")]
    WrongTokenType,

    #[error("password hashing failed: {0}")]
    Hash(#[from] io::Error),

    #[error("token encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// payload of an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: Uuid,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(default)]
    pub fresh: bool,
}

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
}

pub fn gen_secret() -> Secret {
    let mut secret = [0u8; 32];
    let mut rng = thread_rng();
    rng.fill(&mut secret[..]);
    secret
}

fn b64(bytes: &[u8]) -> String {
    base64::encode_config(bytes, base64::URL_SAFE_NO_PAD)
}

fn unb64(segment: &str) -> Result<Vec<u8>, AuthError> {
    base64::decode_config(segment.as_bytes(), base64::URL_SAFE_NO_PAD)
        .map_err(|_| AuthError::Malformed("bad base64 segment"))
}

/// password hashing and access token issuing/validation
///
/// Tokens are HS256 JWTs signed with one server secret. Digests are
/// pbkdf2-hmac-sha256 strings in modular crypt format with a random salt.
pub struct Credentials {
    secret: Vec<u8>,
    token_ttl: chrono::Duration,
    hash_rounds: u32,
}

impl Credentials {
    pub fn new(secret: &[u8], token_ttl: chrono::Duration, hash_rounds: u32) -> Self {
        Self { secret: secret.to_vec(), token_ttl, hash_rounds }
    }

    /// credentials signing with a random secret; tokens die with the process
    pub fn ephemeral(token_ttl: chrono::Duration, hash_rounds: u32) -> Self {
        Self::new(&gen_secret()[..], token_ttl, hash_rounds)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        self.token_ttl
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(crypto::pbkdf2::pbkdf2_simple(password, self.hash_rounds)?)
    }

    /// an unreadable digest verifies as `false`
    pub fn verify_password(&self, password: &str, digest: &str) -> bool {
        match crypto::pbkdf2::pbkdf2_check(password, digest) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(error = e, "stored password digest could not be parsed");
                false
            }
        }
    }

    pub fn issue_token(&self, user_id: UserId) -> Result<String, AuthError> {
        self.issue_token_at(user_id, Utc::now())
    }

    pub fn issue_token_at(&self, user_id: UserId, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
            jti: Uuid::new_v4(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            fresh: false,
        };
        let payload = serde_json::to_vec(&claims)?;
        let signing_input = format!("{}.{}", b64(JWT_HEADER.as_bytes()), b64(&payload));
        let sig = self.sign(signing_input.as_bytes());
        Ok(format!("{}.{}", signing_input, b64(sig.code())))
    }

    pub fn identity_of(&self, token: &str) -> Result<UserId, AuthError> {
        self.identity_at(token, Utc::now())
    }

    pub fn identity_at(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, AuthError> {
        let claims = self.decode(token)?;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(AuthError::WrongTokenType)
        }
        if now.timestamp() >= claims.exp {
            return Err(AuthError::Expired)
        }
        if now.timestamp() < claims.nbf {
            return Err(AuthError::Immature)
        }

        claims.sub.parse::<UserId>()
            .map_err(|_| AuthError::Malformed("subject is not a user id"))
    }

    /// resolve the value of an `Authorization: Bearer <token>` header
    pub fn identity_from_header(&self, header: Option<&str>) -> Result<UserId, AuthError> {
        let value = header.ok_or(AuthError::MissingHeader)?;
        let mut parts = value.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(AUTH_SCHEME), Some(token), None) => self.identity_of(token),
            _ => Err(AuthError::BadHeader),
        }
    }

    /// check the signature, then parse the claims
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut segments = token.split('.');
        let (header, payload, sig) = match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(AuthError::Malformed("expected three segments")),
        };

        let header: JwtHeader = serde_json::from_slice(&unb64(header)?)
            .map_err(|_| AuthError::Malformed("bad header"))?;
        if header.alg != JWT_ALG {
            return Err(AuthError::Malformed("unsupported algorithm"))
        }

        let signing_input = &token[..token.len() - sig.len() - 1];
        // MacResult equality is a fixed-time comparison
        if MacResult::new(&unb64(sig)?) != self.sign(signing_input.as_bytes()) {
            return Err(AuthError::InvalidSignature)
        }

        serde_json::from_slice(&unb64(payload)?)
            .map_err(|_| AuthError::Malformed("bad claims"))
    }

    fn sign(&self, signing_input: &[u8]) -> MacResult {
        let mut mac = Hmac::new(Sha256::new(), &self.secret[..]);
        mac.input(signing_input);
        mac.result()
    }
}
