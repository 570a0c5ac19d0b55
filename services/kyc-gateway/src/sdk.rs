//! SDK facade for third-party integrations
//!
//! Endpoints:
//! - POST /sdk/initiate     - start a verification, returns the hosted verify URL
//! - POST /sdk/status       - latest record in the history of a verification
//! - POST /sdk/list         - caller's records, newest first, paginated
//! - POST /sdk/validate     - key self-check wrapped in the success envelope
//! - POST /sdk/validate-key - key self-check, bare shape
//!
//! Every operation resolves the `apiKey` in the body before touching the
//! ledger, and callers only ever see records they own.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use common::Secret;
use kyc_ledger::{
    DeveloperProfile, ListFilter, NewVerification, VerificationRecord, VerificationStatus,
    VerificationStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::access::{ApiKeyValidator, Capability, KeyValidation};
use crate::error::{ApiError, method_not_allowed};
use crate::metrics;

pub const DEFAULT_LIST_LIMIT: usize = 10;
pub const MAX_LIST_LIMIT: usize = 100;

/// Success envelope shared by the SDK operations.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: &'static str,
    pub data: T,
}

impl<T> Envelope<T> {
    fn ok(message: &'static str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message,
            data,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyRef {
    pub id: String,
    pub name: String,
}

/// Data returned by `initiate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedVerification {
    pub verification_id: String,
    pub auth_url: String,
    pub status: VerificationStatus,
    pub created_at: u64,
    pub company: CompanyRef,
}

/// Pagination and filters for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub status: Option<VerificationStatus>,
    pub user_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerificationList {
    pub verifications: Vec<VerificationRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

pub struct SdkFacade {
    validator: ApiKeyValidator,
    records: Arc<dyn VerificationStore>,
    public_url: String,
    provider_id: String,
}

impl SdkFacade {
    pub fn new(
        validator: ApiKeyValidator,
        records: Arc<dyn VerificationStore>,
        public_url: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            records,
            public_url: public_url.into().trim_end_matches('/').to_string(),
            provider_id: provider_id.into(),
        }
    }

    /// Append a pending record owned by the caller.
    pub async fn initiate(
        &self,
        api_key: &Secret<String>,
        user_email: &str,
        redirect_url: Option<&str>,
        metadata: Map<String, Value>,
    ) -> Result<InitiatedVerification, ApiError> {
        let caller = self
            .validator
            .authorize(Some(api_key), Capability::Verify)
            .await?;
        let company_name = caller.display_name().to_string();

        let mut input = NewVerification::new(user_email, VerificationStatus::Pending)
            .owned_by(caller.id.clone())
            .with_api_provider(&self.provider_id);
        input.metadata = metadata;
        input = input
            .with_metadata("company_id", caller.id.clone())
            .with_metadata("company_name", company_name.clone())
            .with_metadata("redirect_url", redirect_url)
            .with_metadata("source", "sdk");

        let record = self.records.save(input).await?;
        metrics::record_verification(record.status.as_str());
        info!(
            verification_id = %record.id,
            company_id = %caller.id,
            "verification initiated"
        );

        Ok(InitiatedVerification {
            auth_url: format!("{}/verify/{}", self.public_url, record.id),
            verification_id: record.id,
            status: record.status,
            created_at: record.created_at,
            company: CompanyRef {
                id: caller.id,
                name: company_name,
            },
        })
    }

    /// Most recent record in the history of `verification_id`: the
    /// initiating record or the newest outcome linked to it. Other
    /// verifications for the same user are not consulted.
    pub async fn status(
        &self,
        api_key: &Secret<String>,
        verification_id: &str,
    ) -> Result<VerificationRecord, ApiError> {
        let caller = self
            .validator
            .authorize(Some(api_key), Capability::Status)
            .await?;
        let record = self.owned_record(&caller, verification_id).await?;

        let latest = self
            .records
            .latest_in_history(&record.id, Some(&caller.id))
            .await?;
        Ok(latest.unwrap_or(record))
    }

    pub async fn list(
        &self,
        api_key: &Secret<String>,
        query: ListQuery,
    ) -> Result<VerificationList, ApiError> {
        let caller = self
            .validator
            .authorize(Some(api_key), Capability::List)
            .await?;

        let limit = query
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .min(MAX_LIST_LIMIT);
        let offset = query.offset.unwrap_or(0);
        let filter = ListFilter {
            user_email: query.user_email.filter(|e| !e.trim().is_empty()),
            status: query.status,
            owner_id: Some(caller.id),
            ..ListFilter::default()
        };

        let page = self.records.list(&filter, limit, offset).await?;
        Ok(VerificationList {
            verifications: page.records,
            total: page.total,
            limit,
            offset,
        })
    }

    pub async fn validate_api_key(&self, api_key: &Secret<String>) -> KeyValidation {
        self.validator.validate(Some(api_key)).await
    }

    /// Records owned by another profile are reported as missing.
    async fn owned_record(
        &self,
        caller: &DeveloperProfile,
        verification_id: &str,
    ) -> Result<VerificationRecord, ApiError> {
        self.records
            .get(verification_id)
            .await?
            .filter(|r| r.owner_id.as_deref() == Some(caller.id.as_str()))
            .ok_or_else(|| ApiError::NotFound(format!("verification {verification_id} not found")))
    }
}

/// Build the `/sdk` router. `None` means no store is configured.
pub fn build_sdk_router(facade: Option<Arc<SdkFacade>>) -> Router {
    Router::new()
        .route("/sdk/initiate", post(initiate).fallback(method_not_allowed))
        .route("/sdk/status", post(status).fallback(method_not_allowed))
        .route("/sdk/list", post(list).fallback(method_not_allowed))
        .route("/sdk/validate", post(validate).fallback(method_not_allowed))
        .route(
            "/sdk/validate-key",
            post(validate_key).fallback(method_not_allowed),
        )
        .with_state(facade)
}

fn configured(facade: &Option<Arc<SdkFacade>>) -> Result<&SdkFacade, ApiError> {
    facade
        .as_deref()
        .ok_or_else(|| ApiError::not_configured("verification store"))
}

fn present_key(key: Option<Secret<String>>) -> Option<Secret<String>> {
    key.filter(|k| !k.is_blank())
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitiateBody {
    #[serde(default)]
    api_key: Option<Secret<String>>,
    #[serde(default)]
    user_email: Option<String>,
    #[serde(default)]
    redirect_url: Option<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

async fn initiate(
    State(facade): State<Option<Arc<SdkFacade>>>,
    payload: Result<Json<InitiateBody>, JsonRejection>,
) -> Result<Json<Envelope<InitiatedVerification>>, ApiError> {
    let facade = configured(&facade)?;
    let Json(body) = payload?;

    let (Some(api_key), Some(user_email)) = (present_key(body.api_key), present(body.user_email))
    else {
        return Err(ApiError::Validation(
            "API key and user email are required".into(),
        ));
    };

    let data = facade
        .initiate(
            &api_key,
            user_email.trim(),
            body.redirect_url.as_deref(),
            body.metadata,
        )
        .await?;
    Ok(Envelope::ok("Verification initiation completed", data))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    #[serde(default)]
    api_key: Option<Secret<String>>,
    #[serde(default)]
    verification_id: Option<String>,
}

async fn status(
    State(facade): State<Option<Arc<SdkFacade>>>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<Envelope<VerificationRecord>>, ApiError> {
    let facade = configured(&facade)?;
    let Json(body) = payload?;

    let (Some(api_key), Some(verification_id)) =
        (present_key(body.api_key), present(body.verification_id))
    else {
        return Err(ApiError::Validation(
            "API key and verification ID are required".into(),
        ));
    };

    let record = facade.status(&api_key, verification_id.trim()).await?;
    Ok(Envelope::ok("Verification status check completed", record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBody {
    #[serde(default)]
    api_key: Option<Secret<String>>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    status: Option<VerificationStatus>,
    #[serde(default)]
    user_email: Option<String>,
}

async fn list(
    State(facade): State<Option<Arc<SdkFacade>>>,
    payload: Result<Json<ListBody>, JsonRejection>,
) -> Result<Json<Envelope<VerificationList>>, ApiError> {
    let facade = configured(&facade)?;
    let Json(body) = payload?;

    let api_key = present_key(body.api_key)
        .ok_or_else(|| ApiError::Validation("API key is required".into()))?;

    let query = ListQuery {
        limit: body.limit,
        offset: body.offset,
        status: body.status,
        user_email: body.user_email,
    };
    let data = facade.list(&api_key, query).await?;
    Ok(Envelope::ok("Verifications list retrieved", data))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyBody {
    #[serde(default)]
    api_key: Option<Secret<String>>,
}

/// Uniform negative result: same body for unknown, blank or unresolvable keys.
fn invalid_key() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "Invalid API key",
            "valid": false,
            "plan": "",
            "permissions": [],
        })),
    )
        .into_response()
}

async fn check_key(
    facade: &Option<Arc<SdkFacade>>,
    payload: Result<Json<KeyBody>, JsonRejection>,
) -> Result<KeyValidation, ApiError> {
    let facade = configured(facade)?;
    let Json(body) = payload?;
    let api_key = present_key(body.api_key)
        .ok_or_else(|| ApiError::Validation("API key is required".into()))?;
    Ok(facade.validate_api_key(&api_key).await)
}

async fn validate(
    State(facade): State<Option<Arc<SdkFacade>>>,
    payload: Result<Json<KeyBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let result = check_key(&facade, payload).await?;
    if !result.valid {
        return Ok(invalid_key());
    }
    Ok(Envelope::ok("API key validation completed", result).into_response())
}

async fn validate_key(
    State(facade): State<Option<Arc<SdkFacade>>>,
    payload: Result<Json<KeyBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let result = check_key(&facade, payload).await?;
    if !result.valid {
        return Ok(invalid_key());
    }
    Ok(Json(result).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessPolicy;
    use axum::body::Body;
    use axum::http::Request;
    use kyc_ledger::{FileLedger, PlanType, ProfileDirectory, Role};
    use std::collections::HashMap;
    use tower::ServiceExt;

    const ACME_KEY: &str = "fp_live_acme";
    const GLOBEX_KEY: &str = "fp_live_globex";

    fn profile(id: &str, company: &str, key: &str, plan: PlanType) -> DeveloperProfile {
        DeveloperProfile {
            id: id.into(),
            email: format!("dev@{id}.et"),
            name: Some("Dawit".into()),
            company_name: Some(company.into()),
            role: Role::Company,
            plan_type: plan,
            api_key: key.into(),
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        ledger: Arc<FileLedger>,
        app: Router,
    }

    async fn harness_with_policy(policy: AccessPolicy) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(
            FileLedger::open(dir.path().join("verifications.jsonl"))
                .await
                .unwrap(),
        );
        let profiles = ProfileDirectory::open(dir.path().join("profiles.json"))
            .await
            .unwrap();
        profiles
            .add(profile("acme", "Acme", ACME_KEY, PlanType::Developer))
            .await
            .unwrap();
        profiles
            .add(profile("globex", "Globex", GLOBEX_KEY, PlanType::Business))
            .await
            .unwrap();

        let facade = SdkFacade::new(
            ApiKeyValidator::new(Arc::new(profiles), policy),
            ledger.clone(),
            "https://pass.example/",
            "fayda",
        );
        Harness {
            _dir: dir,
            ledger,
            app: build_sdk_router(Some(Arc::new(facade))),
        }
    }

    async fn harness() -> Harness {
        harness_with_policy(AccessPolicy::default()).await
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn initiate_creates_pending_record() {
        let h = harness().await;
        let (status, json) = post_json(
            &h.app,
            "/sdk/initiate",
            json!({
                "apiKey": ACME_KEY,
                "userEmail": "abebe@example.et",
                "redirectUrl": "https://shop.example/done",
                "metadata": {"order": "A-17"},
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Verification initiation completed");
        let data = &json["data"];
        let id = data["verificationId"].as_str().unwrap();
        assert!(id.starts_with("vr_"));
        assert_eq!(data["authUrl"], format!("https://pass.example/verify/{id}"));
        assert_eq!(data["status"], "pending");
        assert_eq!(data["company"]["id"], "acme");
        assert_eq!(data["company"]["name"], "Acme");

        let record = h.ledger.get(id).await.unwrap().unwrap();
        assert_eq!(record.owner_id.as_deref(), Some("acme"));
        assert_eq!(record.api_provider, "fayda");
        assert_eq!(record.metadata["source"], "sdk");
        assert_eq!(record.metadata["company_name"], "Acme");
        assert_eq!(record.metadata["redirect_url"], "https://shop.example/done");
        assert_eq!(record.metadata["order"], "A-17");
    }

    #[tokio::test]
    async fn initiate_without_key_or_email_writes_nothing() {
        let h = harness().await;

        for body in [
            json!({"userEmail": "abebe@example.et"}),
            json!({"apiKey": "", "userEmail": "abebe@example.et"}),
            json!({"apiKey": ACME_KEY}),
        ] {
            let (status, json) = post_json(&h.app, "/sdk/initiate", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(json["error"], "API key and user email are required");
        }
        assert!(h.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn initiate_with_unknown_key_is_401_and_writes_nothing() {
        let h = harness().await;
        let (status, json) = post_json(
            &h.app,
            "/sdk/initiate",
            json!({"apiKey": "fp_live_acmf", "userEmail": "abebe@example.et"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["kind"], "unauthorized");
        assert!(h.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn status_returns_latest_linked_outcome() {
        let h = harness().await;
        let (_, json) = post_json(
            &h.app,
            "/sdk/initiate",
            json!({"apiKey": ACME_KEY, "userEmail": "abebe@example.et"}),
        )
        .await;
        let id = json["data"]["verificationId"].as_str().unwrap().to_string();

        h.ledger
            .save(
                NewVerification::new("abebe@example.et", VerificationStatus::Success)
                    .owned_by("acme")
                    .with_metadata(kyc_ledger::VERIFICATION_LINK_KEY, id.clone()),
            )
            .await
            .unwrap();
        // Another company's record for the same user is not part of this history
        h.ledger
            .save(
                NewVerification::new("abebe@example.et", VerificationStatus::Failed)
                    .owned_by("globex")
                    .with_metadata(kyc_ledger::VERIFICATION_LINK_KEY, id.clone()),
            )
            .await
            .unwrap();

        let (status, json) = post_json(
            &h.app,
            "/sdk/status",
            json!({"apiKey": ACME_KEY, "verificationId": id}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Verification status check completed");
        assert_eq!(json["data"]["status"], "success");
        assert_eq!(json["data"]["user_email"], "abebe@example.et");
    }

    #[tokio::test]
    async fn status_is_scoped_to_one_verification_of_a_user() {
        let h = harness().await;
        let initiate = || {
            post_json(
                &h.app,
                "/sdk/initiate",
                json!({"apiKey": ACME_KEY, "userEmail": "abebe@example.et"}),
            )
        };
        let (_, json) = initiate().await;
        let first = json["data"]["verificationId"].as_str().unwrap().to_string();
        h.ledger
            .save(
                NewVerification::new("abebe@example.et", VerificationStatus::Success)
                    .owned_by("acme")
                    .with_metadata(kyc_ledger::VERIFICATION_LINK_KEY, first.clone()),
            )
            .await
            .unwrap();
        let (_, json) = initiate().await;
        let second = json["data"]["verificationId"].as_str().unwrap().to_string();
        assert_ne!(first, second);

        let (status, json) = post_json(
            &h.app,
            "/sdk/status",
            json!({"apiKey": ACME_KEY, "verificationId": first}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "success");
        assert_eq!(json["data"]["metadata"]["verification_id"], first.as_str());

        let (_, json) = post_json(
            &h.app,
            "/sdk/status",
            json!({"apiKey": ACME_KEY, "verificationId": second}),
        )
        .await;
        assert_eq!(json["data"]["status"], "pending");
        assert_eq!(json["data"]["id"], second.as_str());
    }

    #[tokio::test]
    async fn status_hides_other_owners_records() {
        let h = harness().await;
        let (_, json) = post_json(
            &h.app,
            "/sdk/initiate",
            json!({"apiKey": ACME_KEY, "userEmail": "abebe@example.et"}),
        )
        .await;
        let id = json["data"]["verificationId"].as_str().unwrap().to_string();

        let (status, _) = post_json(
            &h.app,
            "/sdk/status",
            json!({"apiKey": GLOBEX_KEY, "verificationId": id}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = post_json(
            &h.app,
            "/sdk/status",
            json!({"apiKey": ACME_KEY, "verificationId": "vr_unknown"}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_requires_both_fields() {
        let h = harness().await;
        let (status, json) = post_json(&h.app, "/sdk/status", json!({"apiKey": ACME_KEY})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "API key and verification ID are required");
    }

    #[tokio::test]
    async fn list_is_scoped_filtered_and_paginated() {
        let h = harness().await;
        for (email, status, owner) in [
            ("a@example.et", VerificationStatus::Pending, "acme"),
            ("b@example.et", VerificationStatus::Success, "acme"),
            ("c@example.et", VerificationStatus::Success, "acme"),
            ("d@example.et", VerificationStatus::Success, "globex"),
        ] {
            h.ledger
                .save(NewVerification::new(email, status).owned_by(owner))
                .await
                .unwrap();
        }

        let (status, json) = post_json(&h.app, "/sdk/list", json!({"apiKey": ACME_KEY})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Verifications list retrieved");
        assert_eq!(json["data"]["total"], 3);
        assert_eq!(json["data"]["limit"], DEFAULT_LIST_LIMIT);
        assert_eq!(json["data"]["offset"], 0);
        let emails: Vec<&str> = json["data"]["verifications"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["user_email"].as_str().unwrap())
            .collect();
        assert_eq!(emails, ["c@example.et", "b@example.et", "a@example.et"]);

        let (_, json) = post_json(
            &h.app,
            "/sdk/list",
            json!({"apiKey": ACME_KEY, "status": "success", "limit": 1, "offset": 1}),
        )
        .await;
        assert_eq!(json["data"]["total"], 2);
        assert_eq!(json["data"]["verifications"][0]["user_email"], "b@example.et");

        let (_, json) = post_json(
            &h.app,
            "/sdk/list",
            json!({"apiKey": ACME_KEY, "userEmail": "A@EXAMPLE.ET", "limit": 500}),
        )
        .await;
        assert_eq!(json["data"]["total"], 1);
        assert_eq!(json["data"]["limit"], MAX_LIST_LIMIT);
    }

    #[tokio::test]
    async fn list_denied_when_plan_lacks_capability() {
        let mut plans = HashMap::new();
        plans.insert(PlanType::Developer, vec![Capability::Verify]);
        let h = harness_with_policy(AccessPolicy::new(plans)).await;

        let (status, json) = post_json(&h.app, "/sdk/list", json!({"apiKey": ACME_KEY})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json["error"].as_str().unwrap().contains("list"));
    }

    #[tokio::test]
    async fn validate_key_shapes() {
        let h = harness().await;

        let (status, json) =
            post_json(&h.app, "/sdk/validate-key", json!({"apiKey": GLOBEX_KEY})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["valid"], true);
        assert_eq!(json["plan"], "business");
        assert_eq!(
            json["permissions"],
            json!(["verify", "status", "list", "usage-stats"])
        );
        assert_eq!(json["company"]["name"], "Globex");
        assert!(json["company"].get("api_key").is_none());

        let (status, json) = post_json(&h.app, "/sdk/validate", json!({"apiKey": GLOBEX_KEY})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "API key validation completed");
        assert_eq!(json["data"]["valid"], true);
    }

    #[tokio::test]
    async fn invalid_key_is_uniform_401() {
        let h = harness().await;
        for uri in ["/sdk/validate", "/sdk/validate-key"] {
            let (status, json) = post_json(&h.app, uri, json!({"apiKey": "fp_live_nope"})).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(
                json,
                json!({"error": "Invalid API key", "valid": false, "plan": "", "permissions": []})
            );
        }

        let (status, json) = post_json(&h.app, "/sdk/validate-key", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "API key is required");
    }

    #[tokio::test]
    async fn unconfigured_store_is_503() {
        let app = build_sdk_router(None);
        let (status, json) = post_json(&app, "/sdk/list", json!({"apiKey": ACME_KEY})).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["kind"], "configuration");
    }

    #[tokio::test]
    async fn get_is_405() {
        let h = harness().await;
        let response = h
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/sdk/initiate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
