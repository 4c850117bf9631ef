//! # Failure Classifier Module
//!
//! Maps raw network outcomes into the closed error taxonomy and picks the
//! recovery path for each. This is the only place in the crate that
//! interprets HTTP statuses or server message strings; callers must not
//! introduce ad hoc matching elsewhere, so failure behavior stays centrally
//! auditable.
//!
//! The classification table is ordered; the first match wins:
//!
//! | Condition                          | Classification      |
//! |------------------------------------|---------------------|
//! | HTTP 402                           | QuotaExceeded       |
//! | HTTP 429                           | RateLimited         |
//! | "No official draw results…" msg    | DrawDateUnresolved  |
//! | unreadable-numbers messages        | NumbersUnreadable   |
//! | non-JSON response                  | ServerError         |
//! | transport/network exception        | NetworkError        |

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::api::ApiFailure;
use crate::errors::TicketError;
use crate::quota::UserType;

const DRAW_DATE_MESSAGE: &str = "No official draw results found for date";

const NUMBERS_MESSAGES: [&str; 3] = [
    "No valid lottery numbers found",
    "No lottery numbers detected",
    "All detected numbers were invalid",
];

lazy_static! {
    static ref DATE_IN_MESSAGE: Regex =
        Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("Invalid date extraction pattern");
}

/// Recovery path for a classified failure.
///
/// Every path returns the session to an interactive state; none is a dead
/// end, and network-phase recoveries keep the held image so retry is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Quota modal with a user-type-specific call to action
    ShowQuotaModal { cta: QuotaCta },
    /// Retry-later message, no modal
    RetryLater,
    /// Open the manual-date form, optionally pre-filled
    EnterDateManually { suggested_date: Option<NaiveDate> },
    /// Open the manual-play form (up to 5 plays)
    EnterNumbersManually,
    /// Generic server error with the raw status
    ShowServerError { status: u16 },
    /// Retryable network error
    RetryNetwork,
    /// Pick a different image
    ReselectImage,
}

/// Call to action shown in the quota modal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaCta {
    /// Guests are offered registration, not upgrade
    Register,
    /// Free users are offered the premium upgrade
    Upgrade,
    /// Premium users can only wait for the weekly reset
    WaitForReset,
}

/// Classify a raw API failure into the closed taxonomy. First match wins.
pub fn classify(failure: &ApiFailure) -> TicketError {
    match failure {
        ApiFailure::Http { status: 402, body } => TicketError::QuotaExceeded {
            user_type: user_type_from_body(body),
        },
        ApiFailure::Http { status: 429, .. } => TicketError::RateLimited,
        ApiFailure::Http { status, body } => match message_from_body(body) {
            Some(message) if message.contains(DRAW_DATE_MESSAGE) => {
                TicketError::DrawDateUnresolved {
                    suggested_date: extract_date(&message),
                }
            }
            Some(message) if NUMBERS_MESSAGES.iter().any(|m| message.contains(m)) => {
                TicketError::NumbersUnreadable {
                    detected_count: body
                        .get("detected_count")
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0) as usize,
                    validation_errors: validation_errors_from_body(body),
                }
            }
            _ => TicketError::ServerError { status: *status },
        },
        ApiFailure::BadBody { status } => TicketError::ServerError { status: *status },
        ApiFailure::Transport { message } => TicketError::NetworkError {
            message: message.clone(),
        },
    }
}

/// Pick the recovery path for a classified error
pub fn recovery_for(error: &TicketError) -> RecoveryAction {
    match error {
        TicketError::InvalidFileType { .. } | TicketError::ImageOptimizationFailed { .. } => {
            RecoveryAction::ReselectImage
        }
        TicketError::QuotaExceeded { user_type } => RecoveryAction::ShowQuotaModal {
            cta: match user_type {
                UserType::Guest => QuotaCta::Register,
                UserType::FreeUser => QuotaCta::Upgrade,
                UserType::Premium => QuotaCta::WaitForReset,
            },
        },
        TicketError::RateLimited => RecoveryAction::RetryLater,
        TicketError::DrawDateUnresolved { suggested_date } => RecoveryAction::EnterDateManually {
            suggested_date: *suggested_date,
        },
        TicketError::NumbersUnreadable { .. } => RecoveryAction::EnterNumbersManually,
        TicketError::ServerError { status } => RecoveryAction::ShowServerError { status: *status },
        TicketError::NetworkError { .. } => RecoveryAction::RetryNetwork,
    }
}

/// Pull the caller classification out of a 402 body.
///
/// The limit info may arrive nested (`limit_info.user_type`) or flat
/// (`user_type`); unknown or missing values default to guest.
fn user_type_from_body(body: &serde_json::Value) -> UserType {
    let raw = body
        .get("limit_info")
        .and_then(|info| info.get("user_type"))
        .or_else(|| body.get("user_type"))
        .and_then(|v| v.as_str());
    match raw {
        Some("premium") => UserType::Premium,
        Some("free_user") => UserType::FreeUser,
        _ => UserType::Guest,
    }
}

fn message_from_body(body: &serde_json::Value) -> Option<String> {
    body.get("error")
        .or_else(|| body.get("message"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn validation_errors_from_body(body: &serde_json::Value) -> Vec<String> {
    body.get("validation_errors")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn extract_date(message: &str) -> Option<NaiveDate> {
    DATE_IN_MESSAGE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_402_guest_classifies_quota_exceeded() {
        let failure = ApiFailure::Http {
            status: 402,
            body: json!({ "limit_info": { "user_type": "guest", "remaining": 0 } }),
        };

        let error = classify(&failure);
        assert_eq!(
            error,
            TicketError::QuotaExceeded {
                user_type: UserType::Guest
            }
        );
        // Guests get offered registration, not upgrade.
        assert_eq!(
            recovery_for(&error),
            RecoveryAction::ShowQuotaModal {
                cta: QuotaCta::Register
            }
        );
    }

    #[test]
    fn test_402_free_user_offers_upgrade() {
        let failure = ApiFailure::Http {
            status: 402,
            body: json!({ "user_type": "free_user" }),
        };

        let error = classify(&failure);
        assert_eq!(
            recovery_for(&error),
            RecoveryAction::ShowQuotaModal {
                cta: QuotaCta::Upgrade
            }
        );
    }

    #[test]
    fn test_402_without_user_type_defaults_to_guest() {
        let failure = ApiFailure::Http {
            status: 402,
            body: json!({}),
        };

        assert_eq!(
            classify(&failure),
            TicketError::QuotaExceeded {
                user_type: UserType::Guest
            }
        );
    }

    #[test]
    fn test_429_classifies_rate_limited() {
        let failure = ApiFailure::Http {
            status: 429,
            body: json!({ "error": "slow down" }),
        };

        let error = classify(&failure);
        assert_eq!(error, TicketError::RateLimited);
        assert_eq!(recovery_for(&error), RecoveryAction::RetryLater);
    }

    #[test]
    fn test_draw_date_message_classifies_and_extracts_date() {
        let failure = ApiFailure::Http {
            status: 422,
            body: json!({ "error": "No official draw results found for date 2025-08-02" }),
        };

        let error = classify(&failure);
        let expected_date = NaiveDate::from_ymd_opt(2025, 8, 2).unwrap();
        assert_eq!(
            error,
            TicketError::DrawDateUnresolved {
                suggested_date: Some(expected_date)
            }
        );
        assert_eq!(
            recovery_for(&error),
            RecoveryAction::EnterDateManually {
                suggested_date: Some(expected_date)
            }
        );
    }

    #[test]
    fn test_draw_date_message_without_date_still_classifies() {
        let failure = ApiFailure::Http {
            status: 422,
            body: json!({ "error": "No official draw results found for date unknown" }),
        };

        assert_eq!(
            classify(&failure),
            TicketError::DrawDateUnresolved {
                suggested_date: None
            }
        );
    }

    #[test]
    fn test_numbers_messages_classify_unreadable() {
        for message in [
            "No valid lottery numbers found",
            "No lottery numbers detected",
            "All detected numbers were invalid",
        ] {
            let failure = ApiFailure::Http {
                status: 422,
                body: json!({
                    "error": message,
                    "detected_count": 2,
                    "validation_errors": ["play 1: duplicate numbers"]
                }),
            };

            let error = classify(&failure);
            assert_eq!(
                error,
                TicketError::NumbersUnreadable {
                    detected_count: 2,
                    validation_errors: vec!["play 1: duplicate numbers".to_string()],
                }
            );
            assert_eq!(recovery_for(&error), RecoveryAction::EnterNumbersManually);
        }
    }

    #[test]
    fn test_unrecognized_json_error_is_server_error() {
        let failure = ApiFailure::Http {
            status: 500,
            body: json!({ "error": "database on fire" }),
        };

        let error = classify(&failure);
        assert_eq!(error, TicketError::ServerError { status: 500 });
        assert_eq!(
            recovery_for(&error),
            RecoveryAction::ShowServerError { status: 500 }
        );
    }

    #[test]
    fn test_non_json_response_is_server_error_with_raw_status() {
        let failure = ApiFailure::BadBody { status: 502 };
        assert_eq!(classify(&failure), TicketError::ServerError { status: 502 });
    }

    #[test]
    fn test_transport_failure_is_network_error() {
        let failure = ApiFailure::Transport {
            message: "connection refused".to_string(),
        };

        let error = classify(&failure);
        assert_eq!(
            error,
            TicketError::NetworkError {
                message: "connection refused".to_string()
            }
        );
        assert_eq!(recovery_for(&error), RecoveryAction::RetryNetwork);
    }

    #[test]
    fn test_status_rules_win_over_message_rules() {
        // A 402 carrying a draw-date message must still classify as quota:
        // the table is ordered, first match wins.
        let failure = ApiFailure::Http {
            status: 402,
            body: json!({ "error": "No official draw results found for date 2025-08-02" }),
        };

        assert!(matches!(
            classify(&failure),
            TicketError::QuotaExceeded { .. }
        ));
    }
}
