//! SSO assertion broker server
//!
//! A SAML 2.0 Service Provider built with Axum: accepts assertions
//! from one IdP, establishes browser sessions, and exposes asserted
//! identities through a short-lived pollable cache.

mod config;
mod logging;
mod openapi;

use authgate_saml::{
    sso_router, BrowserSessions, IdentityCache, InMemoryRequestLedger, SamlAssertionValidator,
    SamlClient, SsoState,
};
use config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.log_filter);

    if let Err(e) = config.saml.validate() {
        tracing::error!("Invalid SAML configuration: {e}");
        std::process::exit(1);
    }

    let saml_config = Arc::new(config.saml.clone());

    let cache = Arc::new(IdentityCache::with_expiry(
        chrono::Duration::seconds(config.cache_write_expiry_secs),
        chrono::Duration::seconds(config.cache_read_expiry_secs),
    ));
    let sessions = Arc::new(BrowserSessions::new());
    let ledger = Arc::new(InMemoryRequestLedger::new());

    let state = SsoState {
        config: saml_config.clone(),
        client: SamlClient::new(saml_config.clone()),
        cache: cache.clone(),
        sessions: sessions.clone(),
        ledger: ledger.clone(),
        validator: Arc::new(SamlAssertionValidator::new(saml_config)),
        ledger_ttl_seconds: config.ledger_ttl_secs,
        secure_cookies: config.secure_cookies(),
    };

    // Periodic sweep of the identity cache, the browser sessions, and
    // the pending-request ledger, independent of request traffic.
    {
        let sweep_cache = cache.clone();
        let sweep_sessions = sessions.clone();
        let sweep_ledger = ledger.clone();
        let interval = Duration::from_secs(config.cache_sweep_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let evicted = sweep_cache.sweep().await;
                if evicted > 0 {
                    tracing::info!(evicted, "Swept expired identity cache entries");
                }

                let stale = sweep_sessions.sweep().await;
                if stale > 0 {
                    tracing::info!(evicted = stale, "Swept expired browser sessions");
                }

                match sweep_ledger.cleanup_expired().await {
                    Ok(count) if count > 0 => {
                        tracing::info!(deleted = count, "Cleaned up expired pending requests");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to clean up pending requests");
                    }
                }
            }
        });
    }

    let app = sso_router(state)
        .merge(openapi::swagger_routes())
        .layer(TraceLayer::new_for_http());

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!(%addr, entity_id = %config.saml.sp_entity_id, "Server listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {e}");
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
