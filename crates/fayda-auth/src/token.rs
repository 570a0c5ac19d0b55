//! Authorization code exchange against the eSignet token endpoint
//!
//! The exchange is a single form-encoded POST with
//! `grant_type=authorization_code`. Codes are single-use, so nothing here
//! retries: a failed exchange means the caller restarts the authorization
//! step with a fresh PKCE session.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assertion::ClientAssertionSigner;
use crate::constants::CLIENT_ASSERTION_TYPE;
use crate::error::{Error, Result};

/// Description fragments eSignet uses when the verifier does not hash to
/// the challenge sent at authorization time.
const PKCE_PATTERNS: &[&str] = &["code_verifier", "code verifier", "pkce", "code_challenge"];

/// Inputs of one exchange. All four are required.
#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub code: String,
    pub code_verifier: Secret<String>,
    pub client_id: String,
    pub redirect_uri: String,
}

impl ExchangeRequest {
    /// Assemble a request from optional parts, failing with
    /// [`Error::MissingFields`] naming every absent or blank field.
    pub fn from_parts(
        code: Option<String>,
        code_verifier: Option<Secret<String>>,
        client_id: Option<String>,
        redirect_uri: Option<String>,
    ) -> Result<Self> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        if !present(&code) {
            missing.push("code");
        }
        if code_verifier.as_ref().is_none_or(|v| v.is_blank()) {
            missing.push("code_verifier");
        }
        if !present(&client_id) {
            missing.push("client_id");
        }
        if !present(&redirect_uri) {
            missing.push("redirect_uri");
        }

        match (code, code_verifier, client_id, redirect_uri) {
            (Some(code), Some(code_verifier), Some(client_id), Some(redirect_uri))
                if missing.is_empty() =>
            {
                Ok(Self {
                    code,
                    code_verifier,
                    client_id,
                    redirect_uri,
                })
            }
            _ => Err(Error::MissingFields(missing.join(", "))),
        }
    }
}

/// Successful token endpoint response.
///
/// `expires_in` is a delta in seconds from the response time.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Token carrying the identity claims: the ID token when issued,
    /// otherwise the access token.
    pub fn identity_token(&self) -> &str {
        self.id_token.as_deref().unwrap_or(&self.access_token)
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .finish()
    }
}

/// OAuth error body (RFC 6749 §5.2).
#[derive(Debug, Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Map a non-success token endpoint response to an error.
///
/// `invalid_grant` on 400/401 whose description points at the verifier is
/// a PKCE mismatch; everything else is passed through as `Upstream`.
pub fn classify_token_error(status: u16, body: &str) -> Error {
    let parsed: ProviderErrorBody = serde_json::from_str(body).unwrap_or_default();
    let error = parsed
        .error
        .unwrap_or_else(|| String::from("token_exchange_failed"));
    let description = parsed.error_description.or_else(|| {
        let trimmed = body.trim();
        (!trimmed.is_empty()).then(|| trimmed.chars().take(256).collect())
    });

    if matches!(status, 400 | 401) && error == "invalid_grant" {
        let lower = description.as_deref().unwrap_or_default().to_lowercase();
        if PKCE_PATTERNS.iter().any(|p| lower.contains(p)) {
            return Error::PkceVerificationFailed(
                description.unwrap_or_else(|| String::from("code_verifier rejected")),
            );
        }
    }

    Error::Upstream {
        status,
        error,
        description,
    }
}

/// Seam between the gateway and the identity provider.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenExchanger>`).
pub trait TokenExchanger: Send + Sync {
    /// Redeem an authorization code. Never retried by implementations.
    fn exchange<'a>(
        &'a self,
        request: &'a ExchangeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TokenResponse>> + Send + 'a>>;
}

/// HTTP client for the eSignet token endpoint.
#[derive(Debug, Clone)]
pub struct EsignetClient {
    http: reqwest::Client,
    token_endpoint: String,
    timeout: Duration,
    signer: Option<ClientAssertionSigner>,
}

impl EsignetClient {
    pub fn new(http: reqwest::Client, token_endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            token_endpoint: token_endpoint.into(),
            timeout,
            signer: None,
        }
    }

    /// Authenticate exchanges with a private-key-JWT client assertion.
    pub fn with_client_assertion(mut self, signer: ClientAssertionSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchange an authorization code for tokens.
    ///
    /// The verifier proves this caller started the flow; the provider
    /// hashes it and compares against the challenge it saw at
    /// authorization time.
    pub async fn exchange_code(&self, request: &ExchangeRequest) -> Result<TokenResponse> {
        let mut form: Vec<(&str, String)> = vec![
            ("grant_type", String::from("authorization_code")),
            ("code", request.code.clone()),
            ("client_id", request.client_id.clone()),
            ("redirect_uri", request.redirect_uri.clone()),
            ("code_verifier", request.code_verifier.expose().clone()),
        ];
        if let Some(signer) = &self.signer {
            let assertion = signer.sign(&request.client_id, &self.token_endpoint)?;
            form.push(("client_assertion_type", String::from(CLIENT_ASSERTION_TYPE)));
            form.push(("client_assertion", assertion));
        }

        debug!(
            endpoint = %self.token_endpoint,
            client_id = %request.client_id,
            client_assertion = self.signer.is_some(),
            "exchanging authorization code"
        );

        let response = self
            .http
            .post(&self.token_endpoint)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout)
                } else {
                    Error::Http(format!("token exchange request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            let err = classify_token_error(status.as_u16(), &body);
            warn!(status = status.as_u16(), error = %err, "token endpoint rejected exchange");
            return Err(err);
        }

        let tokens = response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::Protocol(format!("invalid token response: {e}")))?;

        if tokens.access_token.is_empty() {
            return Err(Error::Protocol("token response has empty access_token".into()));
        }
        Ok(tokens)
    }
}

impl TokenExchanger for EsignetClient {
    fn exchange<'a>(
        &'a self,
        request: &'a ExchangeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<TokenResponse>> + Send + 'a>> {
        Box::pin(self.exchange_code(request))
    }
}
