//! Pending-request ledger for in-flight login attempts.
//!
//! Every SP-initiated login stores its `AuthnRequest` ID here so the SSO
//! callback can correlate the IdP's `InResponseTo`. Login attempts may be
//! abandoned mid-redirect, so entries must self-expire after a bounded
//! window or the ledger grows without limit.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Default TTL for pending login requests (5 minutes).
pub const DEFAULT_LEDGER_TTL_SECONDS: i64 = 300;

/// An in-flight login request awaiting its assertion.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// The `AuthnRequest` ID sent to the IdP.
    pub request_id: String,
    /// RelayState carried through the flow (the caller's original target).
    pub relay_state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(request_id: String, relay_state: Option<String>) -> Self {
        Self::with_ttl(request_id, relay_state, DEFAULT_LEDGER_TTL_SECONDS)
    }

    pub fn with_ttl(request_id: String, relay_state: Option<String>, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            request_id,
            relay_state,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Ledger errors.
///
/// Absence is not an error: a `take` miss means the login attempt was
/// orphaned or expired, which the caller reports as a validation failure.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger storage error: {0}")]
    StorageError(String),
}

/// Create/take contract for pending login requests.
#[async_trait]
pub trait RequestLedger: Send + Sync {
    /// Record a new in-flight login request.
    async fn create(&self, request: PendingRequest) -> Result<(), LedgerError>;

    /// Consume the request with the given ID, if present and unexpired.
    async fn take(&self, request_id: &str) -> Result<Option<PendingRequest>, LedgerError>;

    /// Remove expired entries; returns the number deleted.
    async fn cleanup_expired(&self) -> Result<u64, LedgerError>;
}

/// In-memory ledger for single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryRequestLedger {
    requests: RwLock<HashMap<String, PendingRequest>>,
}

impl InMemoryRequestLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestLedger for InMemoryRequestLedger {
    async fn create(&self, request: PendingRequest) -> Result<(), LedgerError> {
        let mut requests = self.requests.write().await;
        tracing::debug!(
            request_id = %request.request_id,
            expires_at = %request.expires_at,
            "Pending login request recorded"
        );
        requests.insert(request.request_id.clone(), request);
        Ok(())
    }

    async fn take(&self, request_id: &str) -> Result<Option<PendingRequest>, LedgerError> {
        let mut requests = self.requests.write().await;
        match requests.remove(request_id) {
            Some(request) if request.is_expired() => {
                tracing::debug!(request_id = %request_id, "Pending login request expired");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn cleanup_expired(&self) -> Result<u64, LedgerError> {
        let mut requests = self.requests.write().await;
        let before = requests.len();
        requests.retain(|_, request| !request.is_expired());
        let deleted = (before - requests.len()) as u64;
        if deleted > 0 {
            tracing::debug!(deleted = deleted, "Cleaned up orphaned login requests");
        }
        Ok(deleted)
    }
}
