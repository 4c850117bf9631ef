//! Scenario tests for the verification pipeline's pure policies, exercised
//! through the public API: compression decisions, quota interpretation and
//! failure classification.

use serde_json::json;

use ticket_check::api::ApiFailure;
use ticket_check::classifier::{self, QuotaCta, RecoveryAction};
use ticket_check::compression;
use ticket_check::errors::TicketError;
use ticket_check::quota::{QuotaGate, UserType};

const MB: u64 = 1024 * 1024;

#[test]
fn test_desktop_assets_are_never_reencoded() {
    for size in [1, 3 * MB, 50 * MB] {
        for width in [320, 1280, 2600, 8000] {
            let decision = compression::decide(size, Some(width), false);
            assert!(
                !decision.should_compress,
                "desktop {}B width {} must pass through",
                size, width
            );
        }
    }
}

#[test]
fn test_mobile_assets_at_threshold_pass_through() {
    let decision = compression::decide(2 * MB, Some(4000), true);
    assert!(!decision.should_compress);
}

#[test]
fn test_nine_mb_mobile_3000px_scenario() {
    // 9 MB, mobile, width 3000: quality 0.80 and target width
    // max(1280, floor(3000 * 0.7)) = 2100.
    let decision = compression::decide(9 * MB, Some(3000), true);
    assert!(decision.should_compress);
    assert_eq!(decision.jpeg_quality, 80);
    assert_eq!(decision.target_width, Some(2100));
}

#[test]
fn test_limits_check_interpretation_is_idempotent() {
    let body = json!({
        "allowed": true,
        "user_type": "free_user",
        "remaining": 2,
        "weekly_limit": 3
    });

    let first = QuotaGate::interpret(body.clone());
    let second = QuotaGate::interpret(body);
    assert_eq!(first, second);
    assert_eq!(first.remaining, Some(2));
}

#[test]
fn test_preview_402_guest_offers_registration_not_upgrade() {
    let failure = ApiFailure::Http {
        status: 402,
        body: json!({ "limit_info": { "user_type": "guest" } }),
    };

    let error = classifier::classify(&failure);
    assert_eq!(
        error,
        TicketError::QuotaExceeded {
            user_type: UserType::Guest
        }
    );
    assert_eq!(
        classifier::recovery_for(&error),
        RecoveryAction::ShowQuotaModal {
            cta: QuotaCta::Register
        }
    );
}

#[test]
fn test_unresolved_draw_date_prefills_manual_form() {
    let failure = ApiFailure::Http {
        status: 422,
        body: json!({ "error": "No official draw results found for date 2025-08-02" }),
    };

    let error = classifier::classify(&failure);
    match classifier::recovery_for(&error) {
        RecoveryAction::EnterDateManually { suggested_date } => {
            assert_eq!(
                suggested_date,
                chrono::NaiveDate::from_ymd_opt(2025, 8, 2)
            );
        }
        other => panic!("Expected EnterDateManually, got {:?}", other),
    }
}
