//! Authorization code exchange
//!
//! The exchange is a pure state machine (`handle_event`) driven by
//! `TokenExchangeService::run`, which performs the I/O implied by each
//! action:
//!
//! ```text
//! Initiated --TokensIssued--> Exchanged --ClaimsDecoded--> ClaimsExtracted --Finalized--> Succeeded
//!     |                           |
//!     `--ExchangeFailed--> Failed `--DecodeFailed--> Failed
//! ```
//!
//! No step is retried: an authorization code is single-use, so the caller
//! restarts the flow from `/authorize` on any failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use common::Secret;
use fayda_auth::{
    AuthorizationParams, ExchangeRequest, IdentityClaims, PkceSession, TokenExchanger,
    TokenResponse, build_authorization_url, decode_unverified, generate_code_challenge,
};
use kyc_ledger::{
    NewVerification, VERIFICATION_LINK_KEY, VerificationRecord, VerificationStatus,
    VerificationStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, method_not_allowed};
use crate::metrics;

/// How long a consumed verifier stays blocked.
pub const REPLAY_WINDOW: Duration = Duration::from_secs(600);

/// Exchange states.
#[derive(Debug)]
pub enum ExchangeState {
    Initiated,
    Exchanged {
        tokens: TokenResponse,
    },
    ClaimsExtracted {
        tokens: TokenResponse,
        claims: IdentityClaims,
    },
    Succeeded {
        tokens: TokenResponse,
        claims: IdentityClaims,
    },
    Failed {
        error: fayda_auth::Error,
    },
}

impl ExchangeState {
    fn name(&self) -> &'static str {
        match self {
            ExchangeState::Initiated => "initiated",
            ExchangeState::Exchanged { .. } => "exchanged",
            ExchangeState::ClaimsExtracted { .. } => "claims_extracted",
            ExchangeState::Succeeded { .. } => "succeeded",
            ExchangeState::Failed { .. } => "failed",
        }
    }
}

/// Events that drive state transitions.
#[derive(Debug)]
pub enum ExchangeEvent {
    TokensIssued(TokenResponse),
    ExchangeFailed(fayda_auth::Error),
    ClaimsDecoded(IdentityClaims),
    DecodeFailed(fayda_auth::Error),
    Finalized,
}

/// Actions the driver executes after a transition.
#[derive(Debug, PartialEq, Eq)]
pub enum ExchangeAction {
    /// Decode the identity token held by the `Exchanged` state
    DecodeClaims,
    /// Claims are in hand; finish the exchange
    Finalize,
    /// Terminal state reached
    Complete,
}

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: ExchangeState, event: ExchangeEvent) -> (ExchangeState, ExchangeAction) {
    match (state, event) {
        (ExchangeState::Initiated, ExchangeEvent::TokensIssued(tokens)) => (
            ExchangeState::Exchanged { tokens },
            ExchangeAction::DecodeClaims,
        ),

        (ExchangeState::Exchanged { tokens }, ExchangeEvent::ClaimsDecoded(claims)) => (
            ExchangeState::ClaimsExtracted { tokens, claims },
            ExchangeAction::Finalize,
        ),

        (ExchangeState::ClaimsExtracted { tokens, claims }, ExchangeEvent::Finalized) => (
            ExchangeState::Succeeded { tokens, claims },
            ExchangeAction::Complete,
        ),

        (ExchangeState::Initiated, ExchangeEvent::ExchangeFailed(error))
        | (ExchangeState::Exchanged { .. }, ExchangeEvent::DecodeFailed(error)) => {
            (ExchangeState::Failed { error }, ExchangeAction::Complete)
        }

        // Terminal states absorb everything
        (state @ (ExchangeState::Succeeded { .. } | ExchangeState::Failed { .. }), _) => {
            (state, ExchangeAction::Complete)
        }

        (state, event) => {
            let error = fayda_auth::Error::Protocol(format!(
                "unexpected {event:?} in state {}",
                state.name()
            ));
            (ExchangeState::Failed { error }, ExchangeAction::Complete)
        }
    }
}

/// Remembers consumed verifiers by their S256 digest, never the raw value.
pub struct ReplayGuard {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl ReplayGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Mark the verifier consumed. Returns false if it was already consumed
    /// within the window.
    pub async fn consume(&self, verifier: &Secret<String>) -> bool {
        let digest = generate_code_challenge(verifier.expose());
        let now = Instant::now();
        let mut seen = self.seen.lock().await;
        // Lazy cleanup while holding the lock
        seen.retain(|_, used_at| now.duration_since(*used_at) < self.window);
        if seen.contains_key(&digest) {
            return false;
        }
        seen.insert(digest, now);
        true
    }
}

/// Provider settings needed to start a flow.
#[derive(Debug, Clone)]
pub struct AuthorizeSettings {
    pub provider_id: String,
    pub authorize_endpoint: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub acr_values: String,
}

/// Drives exchanges against the identity provider.
pub struct TokenExchangeService {
    exchanger: Arc<dyn TokenExchanger>,
    replay: ReplayGuard,
    settings: AuthorizeSettings,
}

impl TokenExchangeService {
    pub fn new(exchanger: Arc<dyn TokenExchanger>, settings: AuthorizeSettings) -> Self {
        Self {
            exchanger,
            replay: ReplayGuard::new(REPLAY_WINDOW),
            settings,
        }
    }

    pub fn settings(&self) -> &AuthorizeSettings {
        &self.settings
    }

    /// Start a flow: fresh PKCE session plus the provider authorize URL.
    pub fn authorize(&self) -> (PkceSession, String) {
        let session = PkceSession::generate();
        let params = AuthorizationParams {
            authorize_endpoint: &self.settings.authorize_endpoint,
            client_id: &self.settings.client_id,
            redirect_uri: &self.settings.redirect_uri,
            scope: &self.settings.scope,
            acr_values: &self.settings.acr_values,
            ui_locales: fayda_auth::UI_LOCALES,
        };
        let url = build_authorization_url(&params, &session);
        (session, url)
    }

    /// Redeem a code and extract its (unverified) identity claims.
    pub async fn run(
        &self,
        request: &ExchangeRequest,
    ) -> Result<(TokenResponse, IdentityClaims), ApiError> {
        if !self.replay.consume(&request.code_verifier).await {
            warn!(client_id = %request.client_id, "code_verifier replayed");
            metrics::record_token_exchange("replayed");
            return Err(ApiError::Validation(
                "code_verifier has already been used".into(),
            ));
        }

        let mut state = ExchangeState::Initiated;
        let mut event = match self.exchanger.exchange(request).await {
            Ok(tokens) => ExchangeEvent::TokensIssued(tokens),
            Err(e) => ExchangeEvent::ExchangeFailed(e),
        };

        loop {
            let (next, action) = handle_event(state, event);
            debug!(state = next.name(), ?action, "exchange transition");
            state = next;

            event = match action {
                ExchangeAction::DecodeClaims => match &state {
                    ExchangeState::Exchanged { tokens } => {
                        match decode_unverified(tokens.identity_token()) {
                            Ok(claims) => ExchangeEvent::ClaimsDecoded(claims),
                            Err(e) => ExchangeEvent::DecodeFailed(e),
                        }
                    }
                    _ => ExchangeEvent::DecodeFailed(fayda_auth::Error::Protocol(
                        "no tokens to decode".into(),
                    )),
                },
                ExchangeAction::Finalize => ExchangeEvent::Finalized,
                ExchangeAction::Complete => break,
            };
        }

        match state {
            ExchangeState::Succeeded { tokens, claims } => {
                metrics::record_token_exchange("success");
                Ok((tokens, claims))
            }
            ExchangeState::Failed { error } => {
                metrics::record_token_exchange(outcome_label(&error));
                warn!(client_id = %request.client_id, error = %error, "token exchange failed");
                Err(error.into())
            }
            other => Err(ApiError::Protocol(format!(
                "exchange stopped in state {}",
                other.name()
            ))),
        }
    }
}

fn outcome_label(error: &fayda_auth::Error) -> &'static str {
    use fayda_auth::Error as E;
    match error {
        E::PkceVerificationFailed(_) => "pkce_failed",
        E::Timeout(_) => "timeout",
        E::Http(_) | E::Upstream { .. } => "upstream_error",
        E::MalformedToken(_) => "malformed_token",
        _ => "protocol_error",
    }
}

/// Shared state of the `/token` and `/authorize` routes.
#[derive(Clone)]
pub struct ExchangeRoutes {
    pub service: Option<Arc<TokenExchangeService>>,
    pub ledger: Option<Arc<dyn VerificationStore>>,
}

pub fn build_exchange_router(state: ExchangeRoutes) -> Router {
    Router::new()
        .route("/token", post(token).fallback(method_not_allowed))
        .route("/authorize", post(authorize).fallback(method_not_allowed))
        .with_state(state)
}

/// Body of `POST /token`. Every field is optional at parse time so that
/// missing ones can be reported together.
#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    code_verifier: Option<Secret<String>>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    redirect_uri: Option<String>,
    /// Links the outcome to a verification started through the SDK
    #[serde(default)]
    verification_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct TokenReply {
    access_token: String,
    token_type: String,
    expires_in: u64,
    id_token: Option<String>,
    scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification_id: Option<String>,
}

/// POST /token: redeem an authorization code.
async fn token(
    State(state): State<ExchangeRoutes>,
    payload: Result<Json<TokenBody>, JsonRejection>,
) -> Result<Json<TokenReply>, ApiError> {
    let service = state
        .service
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("identity provider"))?;
    let Json(body) = payload?;

    let request = ExchangeRequest::from_parts(
        body.code,
        body.code_verifier,
        body.client_id,
        body.redirect_uri,
    )?;

    // Resolve the linked verification before spending the single-use code
    let linked = match body.verification_id.as_deref() {
        Some(id) => {
            let ledger = state
                .ledger
                .as_ref()
                .ok_or_else(|| ApiError::not_configured("verification store"))?;
            let initiated = open_verification(ledger.as_ref(), id).await?;
            Some((ledger.clone(), initiated))
        }
        None => None,
    };

    let outcome = service.run(&request).await;

    let recorded_id = match &linked {
        Some((ledger, initiated)) => {
            let provider = &service.settings().provider_id;
            Some(record_outcome(ledger.as_ref(), initiated, provider, &outcome).await?)
        }
        None => None,
    };

    let (tokens, claims) = outcome?;
    info!(
        client_id = %request.client_id,
        subject = claims.sub.as_deref().unwrap_or(""),
        linked = recorded_id.is_some(),
        "authorization code exchanged"
    );

    Ok(Json(TokenReply {
        access_token: tokens.access_token,
        token_type: tokens.token_type,
        expires_in: tokens.expires_in,
        id_token: tokens.id_token,
        scope: tokens.scope,
        verification_id: recorded_id,
    }))
}

/// Look up the verification an exchange links to. Only a verification whose
/// history still ends in `pending` accepts an outcome.
async fn open_verification(
    ledger: &dyn VerificationStore,
    id: &str,
) -> Result<VerificationRecord, ApiError> {
    let initiated = ledger
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("verification {id} not found")))?;

    let latest = ledger
        .latest_in_history(&initiated.id, initiated.owner_id.as_deref())
        .await?;
    let current = latest.as_ref().map_or(initiated.status, |r| r.status);
    if current != VerificationStatus::Pending {
        warn!(verification_id = %id, status = %current, "exchange link to finished verification refused");
        return Err(ApiError::Conflict(format!(
            "verification {id} is already {current}"
        )));
    }
    Ok(initiated)
}

/// Append the exchange outcome to the ledger as a new record for the user
/// who started the verification.
async fn record_outcome(
    ledger: &dyn VerificationStore,
    initiated: &VerificationRecord,
    provider_id: &str,
    outcome: &Result<(TokenResponse, IdentityClaims), ApiError>,
) -> Result<String, ApiError> {
    let status = match outcome {
        Ok(_) => VerificationStatus::Success,
        Err(ApiError::PkceVerificationFailed(_) | ApiError::Validation(_)) => {
            VerificationStatus::Failed
        }
        Err(_) => VerificationStatus::Error,
    };

    let mut input = NewVerification::new(initiated.user_email.clone(), status)
        .with_api_provider(provider_id)
        .with_metadata(VERIFICATION_LINK_KEY, initiated.id.clone())
        .with_metadata("source", "token_exchange")
        .with_metadata("claims_verified", false);
    input.owner_id = initiated.owner_id.clone();

    match outcome {
        Ok((_, claims)) => {
            input = input
                .with_metadata("subject", claims.sub.clone())
                .with_metadata("name", claims.display_name());
        }
        Err(e) => {
            input.result_code = Some(e.kind().to_string());
            input = input.with_reason(e.to_string());
        }
    }

    match ledger.save(input).await {
        Ok(record) => {
            metrics::record_verification(record.status.as_str());
            Ok(record.id)
        }
        Err(e) => {
            error!(verification_id = %initiated.id, error = %e, "failed to record exchange outcome");
            Err(e.into())
        }
    }
}

/// POST /authorize: fresh PKCE session and provider authorize URL.
///
/// Nothing is stored server-side; the caller keeps the verifier and state
/// until the redirect comes back.
async fn authorize(State(state): State<ExchangeRoutes>) -> Result<Json<serde_json::Value>, ApiError> {
    let service = state
        .service
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("identity provider"))?;

    let (session, authorization_url) = service.authorize();
    debug!(state = %session.state, "authorization flow started");

    Ok(Json(json!({
        "authorization_url": authorization_url,
        "code_verifier": session.code_verifier,
        "state": session.state,
        "nonce": session.nonce,
    })))
}
