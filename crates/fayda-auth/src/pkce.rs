//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the verifier, S256 challenge and CSRF state for one
//! authorization round trip. The verifier stays with the client and is
//! sent once, at token exchange; the challenge goes into the authorization
//! URL so the provider can check that both requests came from the same party.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Fill `N` bytes from the thread-local CSPRNG and encode them base64url.
///
/// `rand::rng()` is seeded from the OS entropy source and panics if that
/// source is unavailable. Missing entropy is a fatal host misconfiguration.
fn random_token<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a PKCE code verifier.
///
/// 32 random bytes encoded as URL-safe base64 without padding, which is
/// always 43 characters (the RFC 7636 minimum).
pub fn generate_code_verifier() -> String {
    random_token::<32>()
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`, always 43 characters.
pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate an opaque `state` value (16 random bytes, 22 characters).
///
/// The provider echoes it back on the redirect; the client rejects the
/// callback if it does not match the value it stored.
pub fn generate_state() -> String {
    random_token::<16>()
}

/// Ephemeral, client-held PKCE session.
///
/// Created right before redirecting the user to the provider and consumed
/// exactly once by the token exchange. Never reuse a session across
/// exchanges.
#[derive(Debug, Clone, Serialize)]
pub struct PkceSession {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
    /// OpenID Connect replay nonce, echoed inside the ID token
    pub nonce: String,
}

impl PkceSession {
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
            state: generate_state(),
            nonce: generate_state(),
        }
    }
}

/// Static parameters of the authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationParams<'a> {
    pub authorize_endpoint: &'a str,
    pub client_id: &'a str,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
    pub acr_values: &'a str,
    pub ui_locales: &'a str,
}

/// Build the full authorization URL for a PKCE session.
pub fn build_authorization_url(params: &AuthorizationParams<'_>, session: &PkceSession) -> String {
    let query = [
        ("response_type", "code"),
        ("client_id", params.client_id),
        ("redirect_uri", params.redirect_uri),
        ("scope", params.scope),
        ("code_challenge", session.code_challenge.as_str()),
        ("code_challenge_method", "S256"),
        ("state", session.state.as_str()),
        ("nonce", session.nonce.as_str()),
        ("ui_locales", params.ui_locales),
        ("acr_values", params.acr_values),
    ]
    .iter()
    .map(|(k, v)| format!("{k}={}", percent_encode(v)))
    .collect::<Vec<_>>()
    .join("&");

    format!("{}?{query}", params.authorize_endpoint)
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn percent_encode(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0xf) as usize]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ACR_VALUES, AUTHORIZE_ENDPOINT, SCOPES, UI_LOCALES};
    use std::collections::HashSet;

    fn is_base64url(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn verifier_is_43_url_safe_chars() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), 43);
        assert!(is_base64url(&verifier), "not base64url: {verifier}");
        assert_eq!(URL_SAFE_NO_PAD.decode(&verifier).unwrap().len(), 32);
    }

    #[test]
    fn state_is_16_random_bytes() {
        let state = generate_state();
        assert_eq!(state.len(), 22);
        assert!(is_base64url(&state));
        assert_eq!(URL_SAFE_NO_PAD.decode(&state).unwrap().len(), 16);
    }

    #[test]
    fn challenge_is_deterministic_and_43_chars() {
        for _ in 0..50 {
            let verifier = generate_code_verifier();
            let c1 = generate_code_challenge(&verifier);
            let c2 = generate_code_challenge(&verifier);
            assert_eq!(c1, c2);
            assert_eq!(c1.len(), 43);
            assert!(is_base64url(&c1), "not base64url: {c1}");
        }
    }

    #[test]
    fn challenge_matches_rfc7636_appendix_b() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            generate_code_challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn verifiers_and_states_do_not_collide() {
        let mut verifiers = HashSet::with_capacity(10_000);
        let mut states = HashSet::with_capacity(10_000);
        for _ in 0..10_000 {
            assert!(verifiers.insert(generate_code_verifier()));
            assert!(states.insert(generate_state()));
        }
    }

    #[test]
    fn session_challenge_binds_to_verifier() {
        let session = PkceSession::generate();
        assert_eq!(
            session.code_challenge,
            generate_code_challenge(&session.code_verifier)
        );
        assert_ne!(session.state, session.nonce);
    }

    #[test]
    fn authorization_url_contains_required_params() {
        let session = PkceSession::generate();
        let params = AuthorizationParams {
            authorize_endpoint: AUTHORIZE_ENDPOINT,
            client_id: "crXYIYg2cJiNTaw5t-peoPzCRo-3JATNfBd5A86U8t0",
            redirect_uri: "http://localhost:3000/callback",
            scope: SCOPES,
            acr_values: ACR_VALUES,
            ui_locales: UI_LOCALES,
        };
        let url = build_authorization_url(&params, &session);

        assert!(url.starts_with(&format!("{AUTHORIZE_ENDPOINT}?")));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=crXYIYg2cJiNTaw5t-peoPzCRo-3JATNfBd5A86U8t0"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback"));
        assert!(url.contains("scope=openid%20profile%20email%20phone%20address"));
        assert!(url.contains(&format!("code_challenge={}", session.code_challenge)));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={}", session.state)));
        assert!(url.contains(&format!("nonce={}", session.nonce)));
        assert!(url.contains("acr_values=mosip%3Aidp%3Aacr%3Agenerated-code%20"));
        assert!(
            !url.contains(&session.code_verifier),
            "verifier must never appear in the authorization URL"
        );
    }

    #[test]
    fn percent_encode_leaves_unreserved_untouched() {
        assert_eq!(percent_encode("aZ09-_.~"), "aZ09-_.~");
        assert_eq!(percent_encode("a b/c"), "a%20b%2Fc");
    }
}
