//! Identity claims carried in eSignet ID and access tokens
//!
//! Tokens are compact JWS strings (`header.payload.signature`). Only the
//! payload segment is decoded here. The signature is NOT checked against the
//! issuer's keys, so every value in [`IdentityClaims`] is unverified input.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Structured postal address claim (OIDC Core §5.1.1).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Decoded claim set. Claims the gateway does not model (`iss`, `aud`,
/// `exp`, provider extensions) are kept in `other`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IdentityClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl IdentityClaims {
    /// Email if present, otherwise the subject identifier.
    pub fn email_or_subject(&self) -> Option<&str> {
        non_empty(self.email.as_deref()).or_else(|| non_empty(self.sub.as_deref()))
    }

    /// Full name if present, otherwise "given family" when both parts exist.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = non_empty(self.name.as_deref()) {
            return Some(name.to_string());
        }
        match (
            non_empty(self.given_name.as_deref()),
            non_empty(self.family_name.as_deref()),
        ) {
            (Some(given), Some(family)) => Some(format!("{given} {family}")),
            _ => None,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Decode the payload segment of a compact token WITHOUT verifying its
/// signature.
///
/// Fails with [`Error::MalformedToken`] unless the token has exactly three
/// dot-separated segments and the middle one is base64url-encoded JSON.
pub fn decode_unverified(token: &str) -> Result<IdentityClaims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::MalformedToken(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    }

    // Some issuers pad their segments even though JWS forbids it
    let payload = parts[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::MalformedToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::MalformedToken(format!("payload is not a JSON claim set: {e}")))
}
