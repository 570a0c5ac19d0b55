//! Private-key-JWT client authentication (RFC 7523)
//!
//! eSignet authenticates confidential clients at the token endpoint with a
//! short-lived RS256 JWT signed by the client's registered key. The key
//! arrives either as PEM or as the JWK the client registered with eSignet.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};

use crate::constants::CLIENT_ASSERTION_TTL_SECS;
use crate::error::{Error, Result};

/// Claims of a client assertion. `iss` and `sub` are both the client id;
/// `aud` is the token endpoint URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
}

/// Signs client assertions with the client's RSA private key.
#[derive(Clone)]
pub struct ClientAssertionSigner {
    key: EncodingKey,
    key_id: Option<String>,
}

impl ClientAssertionSigner {
    /// Load an RSA private key in PEM form.
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(pem)
            .map_err(|e| Error::ClientAssertion(format!("invalid RSA private key: {e}")))?;
        Ok(Self { key, key_id: None })
    }

    /// Load an RSA private key from a JWK (RFC 7517). The JWK's `kid`, when
    /// present, becomes the assertion key id.
    pub fn from_jwk(jwk: &[u8]) -> Result<Self> {
        let jwk: RsaJwk = serde_json::from_slice(jwk)
            .map_err(|e| Error::ClientAssertion(format!("invalid JWK: {e}")))?;
        if jwk.kty != "RSA" {
            return Err(Error::ClientAssertion(format!(
                "unsupported JWK key type {:?}, expected \"RSA\"",
                jwk.kty
            )));
        }

        let mut primes = Vec::new();
        if let (Some(p), Some(q)) = (&jwk.p, &jwk.q) {
            primes.push(jwk_uint("p", p)?);
            primes.push(jwk_uint("q", q)?);
        }
        let key = RsaPrivateKey::from_components(
            jwk_uint("n", &jwk.n)?,
            jwk_uint("e", &jwk.e)?,
            jwk_uint("d", &jwk.d)?,
            primes,
        )
        .map_err(|e| Error::ClientAssertion(format!("invalid RSA JWK: {e}")))?;

        let pem = key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| Error::ClientAssertion(format!("encoding JWK key: {e}")))?;
        let mut signer = Self::from_rsa_pem(pem.as_bytes())?;
        signer.key_id = jwk.kid;
        Ok(signer)
    }

    /// Load key material in whichever form it is given: a JWK object or PEM.
    pub fn from_key_material(material: &[u8]) -> Result<Self> {
        if material.trim_ascii_start().starts_with(b"{") {
            Self::from_jwk(material)
        } else {
            Self::from_rsa_pem(material)
        }
    }

    /// Set the `kid` header so the provider can pick the registered key.
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Sign a fresh assertion for `client_id`, addressed to `audience`.
    pub fn sign(&self, client_id: &str, audience: &str) -> Result<String> {
        let iat = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let claims = AssertionClaims {
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            aud: audience.to_string(),
            iat,
            exp: iat + CLIENT_ASSERTION_TTL_SECS,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| Error::ClientAssertion(format!("signing failed: {e}")))
    }
}

/// RSA private key members of a JWK. Base64url big-endian integers.
#[derive(Deserialize)]
struct RsaJwk {
    kty: String,
    n: String,
    e: String,
    d: String,
    p: Option<String>,
    q: Option<String>,
    kid: Option<String>,
}

fn jwk_uint(member: &str, value: &str) -> Result<BigUint> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| Error::ClientAssertion(format!("JWK member {member} is not base64url: {e}")))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

impl fmt::Debug for ClientAssertionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAssertionSigner")
            .field("key", &"[REDACTED]")
            .field("key_id", &self.key_id)
            .finish()
    }
}
