//! Developer profiles and API key lookup

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{Error, Result};
use crate::persist::{load_or_init, write_atomic};
use crate::store::{ProfileStore, StoreFuture};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Developer,
    Company,
}

/// Subscription plan. Keys the capability table in the gateway config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Developer,
    Business,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Developer => "developer",
            PlanType::Business => "business",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account that integrates through the SDK.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DeveloperProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    pub role: Role,
    pub plan_type: PlanType,
    pub api_key: String,
}

impl DeveloperProfile {
    /// Company name, falling back to the personal name, then the email.
    pub fn display_name(&self) -> &str {
        non_empty(self.company_name.as_deref())
            .or_else(|| non_empty(self.name.as_deref()))
            .unwrap_or(&self.email)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl fmt::Debug for DeveloperProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeveloperProfile")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("company_name", &self.company_name)
            .field("role", &self.role)
            .field("plan_type", &self.plan_type)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Profiles persisted to a JSON array, looked up by exact API key.
pub struct ProfileDirectory {
    path: PathBuf,
    profiles: RwLock<Vec<DeveloperProfile>>,
}

impl ProfileDirectory {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let profiles: Vec<DeveloperProfile> = load_or_init(&path).await?;
        info!(path = %path.display(), profiles = profiles.len(), "profile directory loaded");
        Ok(Self {
            path,
            profiles: RwLock::new(profiles),
        })
    }

    /// Register a profile. API keys must be non-empty and unique.
    pub async fn add(&self, profile: DeveloperProfile) -> Result<()> {
        if profile.api_key.trim().is_empty() {
            return Err(Error::Validation("api_key must not be empty".into()));
        }

        let mut profiles = self.profiles.write().await;
        if profiles.iter().any(|p| p.api_key == profile.api_key) {
            return Err(Error::DuplicateApiKey);
        }

        let id = profile.id.clone();
        profiles.push(profile);
        if let Err(e) = write_atomic(&self.path, &*profiles).await {
            profiles.pop();
            return Err(e);
        }

        info!(profile_id = %id, "developer profile added");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }
}

impl ProfileStore for ProfileDirectory {
    fn find_by_api_key<'a>(
        &'a self,
        api_key: &'a str,
    ) -> StoreFuture<'a, Option<DeveloperProfile>> {
        Box::pin(async move {
            if api_key.is_empty() {
                return Ok(None);
            }
            let profiles = self.profiles.read().await;
            Ok(profiles.iter().find(|p| p.api_key == api_key).cloned())
        })
    }
}
