//! # Quota Gate Module
//!
//! Pre-flight quota checking for verification attempts. The gate calls the
//! limits-check endpoint immediately before every preview or verify request
//! and never caches the answer, since quota can change underneath us (other
//! tabs, server-side resets).
//!
//! The gate fails OPEN: an unreachable endpoint or a malformed body yields
//! `allowed = true` with no remaining-count information. The backend is the
//! authoritative enforcer; this check only exists to spare the user a wasted
//! upload when the answer is already known to be no.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::TicketApi;

/// Caller classification returned by the limits-check endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Unauthenticated caller identified only by device fingerprint
    #[default]
    Guest,
    /// Registered account on the free tier
    FreeUser,
    /// Paying account
    Premium,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::Guest => write!(f, "guest"),
            UserType::FreeUser => write!(f, "free_user"),
            UserType::Premium => write!(f, "premium"),
        }
    }
}

/// Result of a limits-check call.
///
/// Fetched fresh before every preview/verify attempt. `remaining` and
/// `weekly_limit` are absent when the gate failed open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub allowed: bool,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub remaining: Option<i64>,
    #[serde(default)]
    pub weekly_limit: Option<i64>,
    #[serde(default)]
    pub reset_time_formatted: Option<String>,
}

impl QuotaStatus {
    /// Fail-open status used when the limits-check endpoint cannot answer
    fn open() -> Self {
        Self {
            allowed: true,
            user_type: UserType::Guest,
            remaining: None,
            weekly_limit: None,
            reset_time_formatted: None,
        }
    }
}

/// Client-side quota gate in front of the expensive OCR/verify endpoints
pub struct QuotaGate;

impl QuotaGate {
    /// Check the caller's quota before spending backend OCR budget.
    ///
    /// Always performs a fresh network call; never caches. Transport errors
    /// and malformed bodies fail open.
    pub async fn check<A: TicketApi>(api: &A, fingerprint: Option<&str>) -> QuotaStatus {
        match api.limits_check(fingerprint).await {
            Ok(body) => Self::interpret(body),
            Err(failure) => {
                warn!(failure = %failure, "Limits check unreachable, failing open");
                QuotaStatus::open()
            }
        }
    }

    /// Interpret a raw limits-check body, failing open on malformed data
    pub fn interpret(body: serde_json::Value) -> QuotaStatus {
        match serde_json::from_value::<QuotaStatus>(body) {
            Ok(status) => {
                debug!(
                    allowed = status.allowed,
                    user_type = %status.user_type,
                    remaining = ?status.remaining,
                    "Limits check result"
                );
                status
            }
            Err(err) => {
                warn!(error = %err, "Malformed limits-check body, failing open");
                QuotaStatus::open()
            }
        }
    }
}
