//! Request error taxonomy and its HTTP mapping
//!
//! Every handler returns `Result<_, ApiError>`. Library errors convert via
//! `From`, and the status code and JSON body are derived here and nowhere
//! else.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Upstream {
        message: String,
        status: Option<u16>,
        details: Option<String>,
    },

    #[error("{0}")]
    PkceVerificationFailed(String),

    #[error("{0}")]
    Persistence(String),

    #[error("{0}")]
    MalformedToken(String),

    #[error("{0}")]
    Protocol(String),

    #[error("{0}")]
    Configuration(String),
}

impl ApiError {
    /// Stable machine-readable kind carried in every error body.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Upstream { .. } => "upstream",
            ApiError::PkceVerificationFailed(_) => "pkce_verification_failed",
            ApiError::Persistence(_) => "persistence",
            ApiError::MalformedToken(_) => "malformed_token",
            ApiError::Protocol(_) => "protocol",
            ApiError::Configuration(_) => "configuration",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::PkceVerificationFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Persistence(_) | ApiError::MalformedToken(_) | ApiError::Protocol(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn not_configured(what: &str) -> Self {
        ApiError::Configuration(format!("{what} is not configured"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
        }

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let ApiError::Upstream {
            status: upstream_status,
            details,
            ..
        } = &self
        {
            if let Some(code) = upstream_status {
                body["upstream_status"] = json!(code);
            }
            if let Some(details) = details {
                body["details"] = json!(details);
            }
        }

        (status, Json(body)).into_response()
    }
}

impl From<fayda_auth::Error> for ApiError {
    fn from(err: fayda_auth::Error) -> Self {
        use fayda_auth::Error as E;
        match err {
            E::MissingFields(fields) => {
                ApiError::Validation(format!("missing required field(s): {fields}"))
            }
            E::Http(msg) => ApiError::Upstream {
                message: "identity provider unreachable".into(),
                status: None,
                details: Some(msg),
            },
            e @ E::Timeout(_) => ApiError::Upstream {
                message: e.to_string(),
                status: None,
                details: None,
            },
            E::Upstream {
                status,
                error,
                description,
            } => ApiError::Upstream {
                message: format!("identity provider rejected the exchange: {error}"),
                status: Some(status),
                details: description,
            },
            E::PkceVerificationFailed(msg) => ApiError::PkceVerificationFailed(format!(
                "PKCE verification failed: {msg}"
            )),
            E::Protocol(msg) => ApiError::Protocol(msg),
            E::MalformedToken(msg) => ApiError::MalformedToken(format!("malformed token: {msg}")),
            E::ClientAssertion(msg) => ApiError::Configuration(msg),
        }
    }
}

impl From<kyc_ledger::Error> for ApiError {
    fn from(err: kyc_ledger::Error) -> Self {
        use kyc_ledger::Error as E;
        match err {
            E::Validation(msg) => ApiError::Validation(msg),
            e @ E::DuplicateApiKey => ApiError::Validation(e.to_string()),
            E::Persistence(msg) | E::Parse(msg) | E::Io(msg) => {
                ApiError::Persistence(format!("failed to persist verification: {msg}"))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(format!("invalid JSON body: {}", rejection.body_text()))
    }
}

/// Fallback for unsupported methods on write-only routes.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}
