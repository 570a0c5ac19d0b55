//! API key validation and plan-based access policy
//!
//! A key either resolves to exactly one developer profile or it is invalid.
//! Unknown keys, blank keys and store failures all produce the same negative
//! result so callers cannot tell a malformed key from an unknown one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use common::Secret;
use kyc_ledger::{DeveloperProfile, PlanType, ProfileStore, Role};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;

/// Operation an API key may be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Verify,
    Status,
    List,
    UsageStats,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Verify,
        Capability::Status,
        Capability::List,
        Capability::UsageStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Verify => "verify",
            Capability::Status => "status",
            Capability::List => "list",
            Capability::UsageStats => "usage-stats",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plan tier to capability mapping. Plans missing from the table get no
/// capabilities.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    plans: HashMap<PlanType, Vec<Capability>>,
}

impl AccessPolicy {
    pub fn new(plans: HashMap<PlanType, Vec<Capability>>) -> Self {
        Self { plans }
    }

    pub fn capabilities(&self, plan: PlanType) -> &[Capability] {
        self.plans.get(&plan).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn allows(&self, plan: PlanType, capability: Capability) -> bool {
        self.capabilities(plan).contains(&capability)
    }

    /// Every plan gets every capability.
    pub fn default_plans() -> HashMap<PlanType, Vec<Capability>> {
        [PlanType::Developer, PlanType::Business]
            .into_iter()
            .map(|plan| (plan, Capability::ALL.to_vec()))
            .collect()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(Self::default_plans())
    }
}

/// Profile projection returned to SDK callers. Never includes the key.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub plan_type: PlanType,
}

impl From<&DeveloperProfile> for CompanyInfo {
    fn from(profile: &DeveloperProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.display_name().to_string(),
            email: profile.email.clone(),
            role: profile.role,
            plan_type: profile.plan_type,
        }
    }
}

/// Outcome of validating a key.
#[derive(Debug, Clone, Serialize)]
pub struct KeyValidation {
    pub valid: bool,
    pub plan: String,
    pub permissions: Vec<Capability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyInfo>,
}

impl KeyValidation {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            plan: String::new(),
            permissions: Vec::new(),
            company: None,
        }
    }
}

pub struct ApiKeyValidator {
    profiles: Arc<dyn ProfileStore>,
    policy: AccessPolicy,
}

impl ApiKeyValidator {
    pub fn new(profiles: Arc<dyn ProfileStore>, policy: AccessPolicy) -> Self {
        Self { profiles, policy }
    }

    async fn lookup(&self, api_key: Option<&Secret<String>>) -> Option<DeveloperProfile> {
        let key = api_key.filter(|k| !k.is_blank())?;
        match self.profiles.find_by_api_key(key.expose()).await {
            Ok(found) => {
                if found.is_none() {
                    debug!("API key not recognised");
                }
                found
            }
            Err(e) => {
                warn!(error = %e, "profile lookup failed, treating key as invalid");
                None
            }
        }
    }

    /// Self-check shape for `validate-key`.
    pub async fn validate(&self, api_key: Option<&Secret<String>>) -> KeyValidation {
        match self.lookup(api_key).await {
            Some(profile) => KeyValidation {
                valid: true,
                plan: profile.plan_type.to_string(),
                permissions: self.policy.capabilities(profile.plan_type).to_vec(),
                company: Some(CompanyInfo::from(&profile)),
            },
            None => KeyValidation::invalid(),
        }
    }

    /// Resolve the calling profile and require `capability`.
    pub async fn authorize(
        &self,
        api_key: Option<&Secret<String>>,
        capability: Capability,
    ) -> Result<DeveloperProfile, ApiError> {
        let profile = self
            .lookup(api_key)
            .await
            .ok_or_else(|| ApiError::Unauthorized("Invalid API key".into()))?;

        if !self.policy.allows(profile.plan_type, capability) {
            warn!(
                profile_id = %profile.id,
                plan = %profile.plan_type,
                capability = %capability,
                "capability not granted by plan"
            );
            return Err(ApiError::Unauthorized(format!(
                "API key is not permitted to {capability}"
            )));
        }

        Ok(profile)
    }
}
