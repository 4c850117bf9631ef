//! # Verification Error Types
//!
//! This module defines the closed error taxonomy for the ticket verification
//! workflow. Every failure a verification attempt can surface to the UI layer
//! is one of these variants; all interpretation of raw network outcomes into
//! this taxonomy happens in [`crate::classifier`].

use std::fmt;

use chrono::NaiveDate;

use crate::quota::UserType;

/// Closed error taxonomy for the verification workflow.
///
/// Every variant is locally recoverable by user action (reselect the image,
/// enter a date or numbers manually, register/upgrade, retry later). None is
/// fatal to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum TicketError {
    /// Selected file is not an image
    InvalidFileType { mime: String },
    /// Image decode or re-encode failed during compression
    ImageOptimizationFailed { message: String },
    /// Weekly verification quota exhausted (HTTP 402)
    QuotaExceeded { user_type: UserType },
    /// Too many requests in a short window (HTTP 429)
    RateLimited,
    /// Server could not resolve the draw date from the ticket
    DrawDateUnresolved { suggested_date: Option<NaiveDate> },
    /// OCR found no usable play numbers on the ticket
    NumbersUnreadable {
        detected_count: usize,
        validation_errors: Vec<String>,
    },
    /// Non-JSON or otherwise unusable server response
    ServerError { status: u16 },
    /// Transport-level failure (connection refused, timeout, DNS)
    NetworkError { message: String },
}

impl fmt::Display for TicketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketError::InvalidFileType { mime } => {
                write!(f, "[FILE_TYPE] Selected file is not an image: {}", mime)
            }
            TicketError::ImageOptimizationFailed { message } => {
                write!(f, "[IMG_OPT] Image optimization failed: {}", message)
            }
            TicketError::QuotaExceeded { user_type } => {
                write!(f, "[QUOTA] Verification quota exceeded for {}", user_type)
            }
            TicketError::RateLimited => {
                write!(f, "[RATE_LIMIT] Too many requests, retry later")
            }
            TicketError::DrawDateUnresolved { suggested_date } => match suggested_date {
                Some(date) => write!(f, "[DRAW_DATE] No official results for date {}", date),
                None => write!(f, "[DRAW_DATE] Draw date could not be resolved"),
            },
            TicketError::NumbersUnreadable { detected_count, .. } => {
                write!(
                    f,
                    "[NUMBERS] No valid lottery numbers readable ({} detected)",
                    detected_count
                )
            }
            TicketError::ServerError { status } => {
                write!(
                    f,
                    "[SERVER] Server returned an unusable response (HTTP {})",
                    status
                )
            }
            TicketError::NetworkError { message } => {
                write!(f, "[NETWORK] Network request failed: {}", message)
            }
        }
    }
}

impl std::error::Error for TicketError {}

impl From<anyhow::Error> for TicketError {
    fn from(err: anyhow::Error) -> Self {
        TicketError::NetworkError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for convenience
pub type TicketResult<T> = Result<T, TicketError>;

/// Standardized error logging utilities for consistent error reporting
pub mod error_logging {
    use tracing::{error, warn};

    /// Log network/communication errors with endpoint context
    pub fn log_network_error(
        error: &impl std::fmt::Display,
        operation: &str,
        endpoint: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            endpoint = ?endpoint,
            "Network operation failed"
        );
    }

    /// Log image pipeline errors with size context
    pub fn log_image_error(
        error: &impl std::fmt::Display,
        operation: &str,
        byte_length: Option<u64>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            byte_length = ?byte_length,
            "Image processing failed"
        );
    }

    /// Log a classified verification failure with its recovery path
    pub fn log_classified_failure(
        error: &impl std::fmt::Display,
        operation: &str,
        recovery: &impl std::fmt::Debug,
    ) {
        warn!(
            error = %error,
            operation = %operation,
            recovery = ?recovery,
            "Verification attempt failed"
        );
    }
}
