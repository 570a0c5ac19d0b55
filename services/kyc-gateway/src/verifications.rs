//! Direct record save endpoint
//!
//! `POST /verifications` appends one outcome reported by a trusted caller
//! (the hosted verification pages). It takes no API key.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use kyc_ledger::{NewVerification, VerificationStore};
use serde_json::{Value, json};
use tracing::info;

use crate::error::{ApiError, method_not_allowed};
use crate::metrics;

pub fn build_verifications_router(store: Option<Arc<dyn VerificationStore>>) -> Router {
    Router::new()
        .route("/verifications", post(save).fallback(method_not_allowed))
        .with_state(store)
}

async fn save(
    State(store): State<Option<Arc<dyn VerificationStore>>>,
    payload: Result<Json<NewVerification>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let store = store
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("verification store"))?;
    let Json(input) = payload?;

    let record = store.save(input).await?;
    metrics::record_verification(record.status.as_str());
    info!(
        verification_id = %record.id,
        status = %record.status,
        provider = %record.api_provider,
        "verification saved"
    );

    Ok(Json(json!({
        "success": true,
        "verification_id": record.id,
    })))
}
