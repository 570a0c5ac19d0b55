//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client signing key is loaded from FAYDA_PRIVATE_KEY (or its older
//! name PRIVATE_KEY) as base64 of a PEM key or a JWK, or from
//! private_key_file, never stored in the TOML directly to avoid leaking
//! secrets.
//!
//! `[provider]` and `[store]` are optional. When either is absent the
//! gateway still starts, and the endpoints that need it answer 503.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use kyc_ledger::PlanType;
use serde::Deserialize;

use crate::access::{AccessPolicy, Capability};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub access: AccessConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Base URL of the hosted verification pages (`{public_url}/verify/{id}`)
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Upper bound for one token endpoint round trip
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// eSignet client registration
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    /// Recorded as `api_provider` on SDK-created records
    #[serde(default = "default_provider_id")]
    pub id: String,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_acr_values")]
    pub acr_values: String,
    /// `kid` header of client assertions
    #[serde(default)]
    pub key_id: Option<String>,
    /// Path to a PEM or JWK RSA key for private_key_jwt (alternative to FAYDA_PRIVATE_KEY)
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,
    #[serde(skip)]
    pub private_key: Option<Secret<String>>,
}

/// Durable store location
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl StoreConfig {
    pub fn verifications_path(&self) -> PathBuf {
        self.data_dir.join("verifications.jsonl")
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.data_dir.join("profiles.json")
    }
}

/// Plan tier to capability table
#[derive(Debug, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_plans")]
    pub plans: HashMap<PlanType, Vec<Capability>>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            plans: default_plans(),
        }
    }
}

impl AccessConfig {
    pub fn policy(&self) -> AccessPolicy {
        AccessPolicy::new(self.plans.clone())
    }
}

fn default_public_url() -> String {
    "http://localhost:3000".into()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    1000
}

fn default_provider_id() -> String {
    kyc_ledger::DEFAULT_API_PROVIDER.into()
}

fn default_authorize_endpoint() -> String {
    fayda_auth::AUTHORIZE_ENDPOINT.into()
}

fn default_token_endpoint() -> String {
    fayda_auth::TOKEN_ENDPOINT.into()
}

fn default_scope() -> String {
    fayda_auth::SCOPES.into()
}

fn default_acr_values() -> String {
    fayda_auth::ACR_VALUES.into()
}

fn default_plans() -> HashMap<PlanType, Vec<Capability>> {
    AccessPolicy::default_plans()
}

fn require_http_url(field: &str, value: &str) -> common::Result<()> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )));
    }
    Ok(())
}

/// Env vars holding the base64 client key, in precedence order.
const PRIVATE_KEY_VARS: [&str; 2] = ["FAYDA_PRIVATE_KEY", "PRIVATE_KEY"];

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Private key resolution order:
    /// 1. FAYDA_PRIVATE_KEY env var, then PRIVATE_KEY (base64 of a PEM key or JWK)
    /// 2. private_key_file path from config
    ///
    /// The key text is kept as given; the signer detects its format.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        require_http_url("server.public_url", &config.server.public_url)?;

        if config.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if let Some(provider) = config.provider.as_mut() {
            require_http_url("provider.authorize_endpoint", &provider.authorize_endpoint)?;
            require_http_url("provider.token_endpoint", &provider.token_endpoint)?;
            if provider.client_id.trim().is_empty() {
                return Err(common::Error::Config(
                    "provider.client_id must not be empty".into(),
                ));
            }

            // Env var takes precedence over file
            let from_env = PRIVATE_KEY_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok().map(|value| (*var, value)));
            if let Some((var, encoded)) = from_env {
                let key = STANDARD.decode(encoded.trim()).map_err(|e| {
                    common::Error::Encoding(format!("{var} is not base64: {e}"))
                })?;
                let key = String::from_utf8(key).map_err(|e| {
                    common::Error::Encoding(format!("{var} is not UTF-8 PEM or JWK: {e}"))
                })?;
                provider.private_key = Some(Secret::new(key));
            } else if let Some(ref key_file) = provider.private_key_file {
                let pem = std::fs::read_to_string(key_file).map_err(|e| {
                    common::Error::Config(format!(
                        "failed to read private_key_file {}: {e}",
                        key_file.display()
                    ))
                })?;
                if !pem.trim().is_empty() {
                    provider.private_key = Some(Secret::new(pem));
                }
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("kyc-gateway.toml")
    }
}
