//! Session state: the identity cache, browser sessions, and cookies.

pub mod browser;
pub mod cache;
pub mod cookies;
pub mod types;

pub use browser::BrowserSessions;
pub use cache::{
    IdentityCache, DEFAULT_READ_EXPIRY_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
    DEFAULT_WRITE_EXPIRY_SECS,
};
pub use types::{Clock, IdentityRecord, IdentityResponse, SystemClock};
