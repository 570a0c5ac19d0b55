//! Verification record model

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `type` tag applied when the caller does not supply one
pub const DEFAULT_VERIFICATION_TYPE: &str = "KYC";

/// `api_provider` applied when the caller does not supply one
pub const DEFAULT_API_PROVIDER: &str = "fayda";

/// Metadata key linking a record to the verification it continues
pub const VERIFICATION_LINK_KEY: &str = "verification_id";

/// Upper bound for provider confidence scores (providers report either
/// `0..=1` or `0..=100`).
const MAX_SCORE: f64 = 100.0;

/// Outcome of one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Success,
    #[serde(alias = "failure")]
    Failed,
    Error,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Success => "success",
            VerificationStatus::Failed => "failed",
            VerificationStatus::Error => "error",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry of the ledger.
///
/// `created_at` is unix milliseconds, set once at insertion and never
/// earlier than the record inserted before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub id: String,
    pub user_email: String,
    pub status: VerificationStatus,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub api_provider: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Developer profile that created the record through the SDK
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub created_at: u64,
}

impl VerificationRecord {
    /// Id of the verification this record continues, if it is linked.
    pub fn linked_verification(&self) -> Option<&str> {
        self.metadata
            .get(VERIFICATION_LINK_KEY)
            .and_then(serde_json::Value::as_str)
    }
}

/// Input of `save`. Only `user_email` and `status` are required.
///
/// Deserializes straight from the `POST /verifications` body. `owner_id`
/// cannot be set from a request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVerification {
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub status: Option<VerificationStatus>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub liveness_score: Option<f64>,
    #[serde(default)]
    pub result_code: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub api_provider: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    pub owner_id: Option<String>,
}

impl NewVerification {
    pub fn new(user_email: impl Into<String>, status: VerificationStatus) -> Self {
        Self {
            user_email: Some(user_email.into()),
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn owned_by(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_api_provider(mut self, provider: impl Into<String>) -> Self {
        self.api_provider = Some(provider.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Check required fields and score ranges, then build the record.
    pub(crate) fn into_record(self, id: String, created_at: u64) -> Result<VerificationRecord> {
        let user_email = self
            .user_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        let (user_email, status) = match (user_email, self.status) {
            (Some(email), Some(status)) => (email, status),
            (None, Some(_)) => return Err(Error::Validation("user_email is required".into())),
            (Some(_), None) => return Err(Error::Validation("status is required".into())),
            (None, None) => {
                return Err(Error::Validation(
                    "user_email and status are required".into(),
                ));
            }
        };

        check_score("match_score", self.match_score)?;
        check_score("liveness_score", self.liveness_score)?;

        Ok(VerificationRecord {
            id,
            user_email,
            status,
            kind: non_blank(self.kind).unwrap_or_else(|| DEFAULT_VERIFICATION_TYPE.to_string()),
            match_score: self.match_score,
            liveness_score: self.liveness_score,
            result_code: self.result_code,
            reason: self.reason,
            api_provider: non_blank(self.api_provider)
                .unwrap_or_else(|| DEFAULT_API_PROVIDER.to_string()),
            metadata: self.metadata,
            owner_id: self.owner_id,
            created_at,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn check_score(field: &str, score: Option<f64>) -> Result<()> {
    match score {
        Some(s) if !s.is_finite() || !(0.0..=MAX_SCORE).contains(&s) => Err(Error::Validation(
            format!("{field} must be between 0 and {MAX_SCORE}, got {s}"),
        )),
        _ => Ok(()),
    }
}

/// Filter for `list`. `None` fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub user_email: Option<String>,
    pub status: Option<VerificationStatus>,
    pub owner_id: Option<String>,
    /// History of one verification: the initiating record plus every record
    /// linked to it through `metadata.verification_id`.
    pub verification_id: Option<String>,
}

impl ListFilter {
    pub fn matches(&self, record: &VerificationRecord) -> bool {
        if let Some(id) = &self.verification_id {
            if record.id != *id && record.linked_verification() != Some(id.as_str()) {
                return false;
            }
        }
        if let Some(email) = &self.user_email {
            if !record.user_email.eq_ignore_ascii_case(email.trim()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if let Some(owner) = &self.owner_id {
            if record.owner_id.as_deref() != Some(owner.as_str()) {
                return false;
            }
        }
        true
    }
}

/// One page of records, newest first, plus the total matching the filter.
#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
    pub records: Vec<VerificationRecord>,
    pub total: usize,
}
