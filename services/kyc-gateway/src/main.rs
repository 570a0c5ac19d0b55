//! FaydaPass KYC Gateway
//!
//! Single-binary Rust service that:
//! 1. Issues PKCE sessions and eSignet authorization URLs
//! 2. Redeems authorization codes and extracts identity claims
//! 3. Gates the SDK surface behind developer API keys
//! 4. Appends verification outcomes to a durable ledger

mod access;
mod config;
mod error;
mod exchange;
mod metrics;
mod sdk;
mod verifications;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use fayda_auth::{ClientAssertionSigner, EsignetClient};
use kyc_ledger::{FileLedger, ProfileDirectory, VerificationStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::access::ApiKeyValidator;
use crate::config::{Config, ProviderConfig, StoreConfig};
use crate::exchange::{AuthorizeSettings, ExchangeRoutes, TokenExchangeService};
use crate::sdk::SdkFacade;

const SERVICE_NAME: &str = "faydapass-kyc-gateway";

/// Time allowed for in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state. Optional parts are `None` when their config
/// section is absent.
#[derive(Clone)]
struct AppState {
    exchange: ExchangeRoutes,
    sdk: Option<Arc<SdkFacade>>,
    store: Option<Arc<dyn VerificationStore>>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state.clone())
        .merge(exchange::build_exchange_router(state.exchange))
        .merge(sdk::build_sdk_router(state.sdk))
        .merge(verifications::build_verifications_router(state.store))
        .layer(middleware::from_fn(track_request))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting {SERVICE_NAME}");
    warn!(
        "ID token signatures are NOT verified; identity claims are recorded as unverified \
         (claims_verified=false) and must not be treated as authenticated identity"
    );

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus = metrics::install_recorder();

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        public_url = %config.server.public_url,
        provider_configured = config.provider.is_some(),
        store_configured = config.store.is_some(),
        "configuration loaded"
    );

    let timeout = Duration::from_secs(config.server.timeout_secs);
    let service = match &config.provider {
        Some(provider) => Some(Arc::new(build_exchange_service(provider, timeout)?)),
        None => {
            warn!("no [provider] section; /token and /authorize will answer 503");
            None
        }
    };

    let (store, sdk) = match &config.store {
        Some(store_config) => {
            let (ledger, profiles) = open_stores(store_config).await?;
            let provider_id = config
                .provider
                .as_ref()
                .map(|p| p.id.clone())
                .unwrap_or_else(|| kyc_ledger::DEFAULT_API_PROVIDER.to_string());
            let validator = ApiKeyValidator::new(profiles, config.access.policy());
            let facade = SdkFacade::new(
                validator,
                ledger.clone(),
                config.server.public_url.clone(),
                provider_id,
            );
            let store: Arc<dyn VerificationStore> = ledger;
            (Some(store), Some(Arc::new(facade)))
        }
        None => {
            warn!("no [store] section; /sdk and /verifications will answer 503");
            (None, None)
        }
    };

    let state = AppState {
        exchange: ExchangeRoutes {
            service,
            ledger: store.clone(),
        },
        sdk,
        store,
        started_at: Instant::now(),
        prometheus,
    };

    let app = build_router(state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timeout starts when the shutdown signal fires, not when the
    // server starts
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Token endpoint client plus flow settings for one provider registration.
fn build_exchange_service(
    provider: &ProviderConfig,
    timeout: Duration,
) -> Result<TokenExchangeService> {
    let mut client = EsignetClient::new(
        reqwest::Client::new(),
        provider.token_endpoint.clone(),
        timeout,
    );

    if let Some(key) = &provider.private_key {
        let mut signer = ClientAssertionSigner::from_key_material(key.expose().as_bytes())
            .context("invalid client signing key")?;
        if let Some(key_id) = &provider.key_id {
            signer = signer.with_key_id(key_id.clone());
        }
        client = client.with_client_assertion(signer);
        info!("private_key_jwt client authentication enabled");
    } else {
        info!("no client signing key configured; exchanges rely on PKCE alone");
    }

    let settings = AuthorizeSettings {
        provider_id: provider.id.clone(),
        authorize_endpoint: provider.authorize_endpoint.clone(),
        client_id: provider.client_id.clone(),
        redirect_uri: provider.redirect_uri.clone(),
        scope: provider.scope.clone(),
        acr_values: provider.acr_values.clone(),
    };
    Ok(TokenExchangeService::new(Arc::new(client), settings))
}

async fn open_stores(
    store: &StoreConfig,
) -> Result<(Arc<FileLedger>, Arc<ProfileDirectory>)> {
    tokio::fs::create_dir_all(&store.data_dir)
        .await
        .with_context(|| format!("failed to create {}", store.data_dir.display()))?;

    let ledger_path = store.verifications_path();
    let ledger = FileLedger::open(&ledger_path)
        .await
        .with_context(|| format!("failed to open ledger {}", ledger_path.display()))?;

    let profiles_path = store.profiles_path();
    let profiles = ProfileDirectory::open(&profiles_path)
        .await
        .with_context(|| format!("failed to open profiles {}", profiles_path.display()))?;

    Ok((Arc::new(ledger), Arc::new(profiles)))
}

/// Per-request span, request id header and request metrics.
async fn track_request(request: Request, next: Next) -> Response {
    // Route template keeps label cardinality bounded
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| String::from("unmatched"));
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        route = %route
    );

    let start = Instant::now();
    let mut response = next.run(request).instrument(span).await;
    metrics::record_request(
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Returns 200 when provider and store are both configured, 503 otherwise.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let provider_configured = state.exchange.service.is_some();
    let store_configured = state.store.is_some();
    let healthy = provider_configured && store_configured;
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": timestamp,
        "provider_configured": provider_configured,
        "store_configured": store_configured,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });

    (
        status_code,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
