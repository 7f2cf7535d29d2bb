//! Identity types shared by the cache, browser sessions, and handlers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalized identity asserted by the IdP.
///
/// `name_id` is the stable subject key: non-empty, unique per active
/// session, and the sole identity-cache key. `session_index` is the
/// protocol-level session handle used to correlate IdP-initiated logout,
/// which may arrive without any browser session context.
///
/// Field names follow the wire shape the polling client expects.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IdentityRecord {
    #[serde(rename = "nameID")]
    pub name_id: String,
    #[serde(rename = "nameIDFormat")]
    pub name_id_format: Option<String>,
    #[serde(rename = "sessionIndex")]
    pub session_index: Option<String>,
}

/// Lookup response for the polling endpoint.
///
/// The IdP may not supply a dedicated email attribute, which the polling
/// client expects, so the NameID is repurposed as the email. This fallback
/// is deliberate policy and must not be removed.
#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityResponse {
    #[serde(flatten)]
    pub record: IdentityRecord,
    pub email: String,
}

impl From<IdentityRecord> for IdentityResponse {
    fn from(record: IdentityRecord) -> Self {
        let email = record.name_id.clone();
        Self { record, email }
    }
}

/// Time source for the identity cache.
///
/// Injected so tests can drive expiry deterministically instead of
/// sleeping through multi-minute windows.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
