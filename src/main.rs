// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Community Guard Service
//!
//! Serves the access-control core over HTTP:
//!
//! - `POST /endpoints/validate`: check a user-supplied external endpoint
//! - `POST /reports`: rate-limited report intake
//! - `POST /cron/tick`: entry point for scheduled jobs (bearer secret)
//! - `POST /admin/quotas/reset`: clear a quota window (elevated accounts)
//! - `GET /metrics`: Prometheus security event counters
//!
//! ## Configuration
//!
//! Environment variables, optionally from a `.env` file:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `CRON_SECRET`: Shared secret for scheduled jobs (unset rejects them all)
//! - `REGISTERED_ENDPOINTS`: Comma-separated registry of external services
//! - `COUNTER_STORE_URL`: SurrealDB endpoint shared by all instances
//!   (default: ws://127.0.0.1:8000; in-memory stores are refused)
//! - `COUNTER_STORE_NAMESPACE`, `COUNTER_STORE_DATABASE`: Counter location
//!   (default: community / guard)
//! - `COUNTER_STORE_USER`, `COUNTER_STORE_PASSWORD`: Root credentials, if any
//! - `METRICS_ENABLED`: Expose the metrics endpoint (default: true)
//! - `METRICS_PATH`: Metrics endpoint path (default: /metrics)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use community_guard::{
    config::Config,
    db::SurrealCounterStore,
    events::LogOnlySink,
    handlers::{router, AppState},
    identity::NoSessions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    config.validate()?;
    info!(
        bind_addr = %config.bind_addr,
        counter_store = %config.store.url,
        registered_endpoints = config.endpoints.registered.len(),
        cron_configured = config.cron.secret.is_some(),
        metrics_enabled = config.metrics.enabled,
        "Starting community guard"
    );
    if config.cron.secret.is_none() {
        warn!("CRON_SECRET is not set; all scheduled callers will be rejected");
    }

    let store = SurrealCounterStore::connect(&config.store).await?;

    // Sessions come from the embedding application; standalone, every
    // caller is identified by network address.
    let state = Arc::new(AppState::new(
        &config,
        Arc::new(NoSessions),
        Arc::new(store),
        Arc::new(LogOnlySink),
    )?);

    let app = router(state, &config.metrics)?.layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
