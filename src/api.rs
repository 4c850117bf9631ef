//! # Verification API Module
//!
//! Wire types and HTTP client for the four verification endpoints:
//! `/limits-check`, `/preview`, `/verify` and `/verify-manual`.
//!
//! Every response is JSON-or-error: a non-JSON content type (or a body that
//! does not decode) is reported as a structured [`ApiFailure`], never a parse
//! panic. Raw failures carry enough context for the classifier; nothing here
//! interprets them.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::acquire::ImageAsset;
use crate::config::VerifierConfig;
use crate::errors::error_logging;

pub const LIMITS_CHECK_PATH: &str = "/limits-check";
pub const PREVIEW_PATH: &str = "/preview";
pub const VERIFY_PATH: &str = "/verify";
pub const VERIFY_MANUAL_PATH: &str = "/verify-manual";

/// Header carrying the device fingerprint JSON on multipart calls
pub const FINGERPRINT_HEADER: &str = "x-device-fingerprint";

/// One play line detected by the preview OCR pass.
///
/// A play with out-of-range or duplicate numbers arrives with
/// `is_valid = false` but is still surfaced to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPlay {
    pub play_label: String,
    pub main_numbers: Vec<u8>,
    pub powerball: u8,
    #[serde(default)]
    pub is_valid: bool,
}

/// Successful preview response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub detected_plays: Vec<DetectedPlay>,
    pub confidence: f64,
    #[serde(default)]
    pub draw_date_detected: Option<String>,
}

/// Per-play prize result from an authoritative verify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayResult {
    pub line: u32,
    pub main_matches: u8,
    pub powerball_match: bool,
    #[serde(default)]
    pub prize_tier: Option<String>,
    pub prize_amount: f64,
}

/// Authoritative verification result against official draw data.
///
/// Immutable once attached to a completed session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub draw_date: NaiveDate,
    pub official_numbers: Vec<u8>,
    pub official_powerball: u8,
    pub total_plays: usize,
    pub per_play_results: Vec<PlayResult>,
    pub is_winner: bool,
    pub total_prize_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct VerifyResponse {
    ticket_verification: VerificationOutcome,
}

/// One manually entered play line for `/verify-manual`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualPlay {
    pub line: u32,
    pub main_numbers: Vec<u8>,
    pub powerball: u8,
}

#[derive(Debug, Serialize)]
struct ManualVerifyRequest<'a> {
    plays: &'a [ManualPlay],
    draw_date: NaiveDate,
}

/// Raw, uninterpreted failure of an API call.
///
/// The classifier in [`crate::classifier`] is the only consumer; callers
/// never match on this directly.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFailure {
    /// Non-success HTTP status with a JSON body
    Http {
        status: u16,
        body: serde_json::Value,
    },
    /// Response body was not JSON, or did not decode to the expected shape
    BadBody { status: u16 },
    /// Transport-level failure (connect, DNS, timeout)
    Transport { message: String },
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiFailure::Http { status, .. } => write!(f, "HTTP {}", status),
            ApiFailure::BadBody { status } => write!(f, "unusable body (HTTP {})", status),
            ApiFailure::Transport { message } => write!(f, "transport error: {}", message),
        }
    }
}

impl std::error::Error for ApiFailure {}

/// The four verification endpoints, abstracted so the session state machine
/// is testable without a server.
pub trait TicketApi: Send + Sync {
    /// POST /limits-check with an optional fingerprint blob
    fn limits_check(
        &self,
        fingerprint: Option<&str>,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, ApiFailure>> + Send;

    /// POST /preview, the low-cost OCR pass over the ticket image
    fn preview(
        &self,
        image: &ImageAsset,
        fingerprint: Option<&str>,
    ) -> impl std::future::Future<Output = Result<PreviewResponse, ApiFailure>> + Send;

    /// POST /verify, the authoritative pass with prize computation
    fn verify(
        &self,
        image: &ImageAsset,
        manual_date: Option<NaiveDate>,
        fingerprint: Option<&str>,
    ) -> impl std::future::Future<Output = Result<VerificationOutcome, ApiFailure>> + Send;

    /// POST /verify-manual, verifying user-entered plays against a draw date
    fn verify_manual(
        &self,
        plays: &[ManualPlay],
        draw_date: NaiveDate,
        fingerprint: Option<&str>,
    ) -> impl std::future::Future<Output = Result<VerificationOutcome, ApiFailure>> + Send;
}

/// Reqwest-backed implementation of [`TicketApi`]
pub struct HttpTicketApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTicketApi {
    /// Build the client with the configured timeout.
    ///
    /// A request that outlives the timeout surfaces as a transport failure,
    /// which the classifier maps to a retryable network error.
    pub fn new(config: &VerifierConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn multipart_form(
        image: &ImageAsset,
        manual_date: Option<NaiveDate>,
    ) -> Result<reqwest::multipart::Form, ApiFailure> {
        let part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name("ticket.jpg")
            .mime_str(&image.mime)
            .map_err(|e| ApiFailure::Transport {
                message: format!("invalid mime for upload: {}", e),
            })?;
        let mut form = reqwest::multipart::Form::new().part("image", part);
        if let Some(date) = manual_date {
            form = form.text("manual_date", date.to_string());
        }
        Ok(form)
    }

    fn apply_fingerprint(
        request: reqwest::RequestBuilder,
        fingerprint: Option<&str>,
    ) -> reqwest::RequestBuilder {
        match fingerprint {
            Some(blob) => request.header(FINGERPRINT_HEADER, blob),
            None => request,
        }
    }

    /// Execute a request and apply the JSON-or-error rule.
    async fn execute(
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<serde_json::Value, ApiFailure> {
        let response = request.send().await.map_err(|e| {
            let failure = ApiFailure::Transport {
                message: e.to_string(),
            };
            error_logging::log_network_error(&failure, "send_request", Some(endpoint));
            failure
        })?;

        let status = response.status().as_u16();
        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false);

        if !is_json {
            return Err(ApiFailure::BadBody { status });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|_| ApiFailure::BadBody { status })?;

        if !(200..300).contains(&status) {
            return Err(ApiFailure::Http { status, body });
        }

        debug!(endpoint = %endpoint, status = status, "API call succeeded");
        Ok(body)
    }

    fn decode<T: serde::de::DeserializeOwned>(
        body: serde_json::Value,
    ) -> Result<T, ApiFailure> {
        serde_json::from_value(body).map_err(|_| ApiFailure::BadBody { status: 200 })
    }
}

impl TicketApi for HttpTicketApi {
    async fn limits_check(
        &self,
        fingerprint: Option<&str>,
    ) -> Result<serde_json::Value, ApiFailure> {
        let body = match fingerprint {
            Some(blob) => serde_json::json!({ "fingerprint": blob }),
            None => serde_json::json!({}),
        };
        let request = self.client.post(self.url(LIMITS_CHECK_PATH)).json(&body);
        Self::execute(request, LIMITS_CHECK_PATH).await
    }

    async fn preview(
        &self,
        image: &ImageAsset,
        fingerprint: Option<&str>,
    ) -> Result<PreviewResponse, ApiFailure> {
        let form = Self::multipart_form(image, None)?;
        let request = Self::apply_fingerprint(
            self.client.post(self.url(PREVIEW_PATH)).multipart(form),
            fingerprint,
        );
        let body = Self::execute(request, PREVIEW_PATH).await?;
        Self::decode(body)
    }

    async fn verify(
        &self,
        image: &ImageAsset,
        manual_date: Option<NaiveDate>,
        fingerprint: Option<&str>,
    ) -> Result<VerificationOutcome, ApiFailure> {
        let form = Self::multipart_form(image, manual_date)?;
        let request = Self::apply_fingerprint(
            self.client.post(self.url(VERIFY_PATH)).multipart(form),
            fingerprint,
        );
        let body = Self::execute(request, VERIFY_PATH).await?;
        Self::decode::<VerifyResponse>(body).map(|r| r.ticket_verification)
    }

    async fn verify_manual(
        &self,
        plays: &[ManualPlay],
        draw_date: NaiveDate,
        fingerprint: Option<&str>,
    ) -> Result<VerificationOutcome, ApiFailure> {
        let payload = ManualVerifyRequest { plays, draw_date };
        let request = Self::apply_fingerprint(
            self.client
                .post(self.url(VERIFY_MANUAL_PATH))
                .json(&payload),
            fingerprint,
        );
        let body = Self::execute(request, VERIFY_MANUAL_PATH).await?;
        Self::decode::<VerifyResponse>(body).map(|r| r.ticket_verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preview_response_decodes_wire_shape() {
        let body = json!({
            "detected_plays": [
                { "play_label": "A", "main_numbers": [5, 12, 23, 41, 69], "powerball": 7, "is_valid": true },
                { "play_label": "B", "main_numbers": [1, 1, 2, 3, 4], "powerball": 30, "is_valid": false }
            ],
            "confidence": 0.91,
            "draw_date_detected": "2025-08-02"
        });

        let parsed: PreviewResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.detected_plays.len(), 2);
        assert!(parsed.detected_plays[0].is_valid);
        assert!(!parsed.detected_plays[1].is_valid);
        assert_eq!(parsed.draw_date_detected.as_deref(), Some("2025-08-02"));
    }

    #[test]
    fn test_verify_response_decodes_wire_shape() {
        let body = json!({
            "ticket_verification": {
                "draw_date": "2025-08-02",
                "official_numbers": [5, 12, 23, 41, 69],
                "official_powerball": 7,
                "total_plays": 1,
                "per_play_results": [
                    { "line": 1, "main_matches": 5, "powerball_match": true, "prize_tier": "jackpot", "prize_amount": 100000000.0 }
                ],
                "is_winner": true,
                "total_prize_amount": 100000000.0
            }
        });

        let parsed: VerifyResponse = serde_json::from_value(body).unwrap();
        let outcome = parsed.ticket_verification;
        assert!(outcome.is_winner);
        assert_eq!(outcome.per_play_results[0].main_matches, 5);
        assert_eq!(
            outcome.draw_date,
            NaiveDate::from_ymd_opt(2025, 8, 2).unwrap()
        );
    }

    #[test]
    fn test_manual_verify_request_serializes_wire_shape() {
        let plays = vec![ManualPlay {
            line: 1,
            main_numbers: vec![5, 12, 23, 41, 69],
            powerball: 7,
        }];
        let payload = ManualVerifyRequest {
            plays: &plays,
            draw_date: NaiveDate::from_ymd_opt(2025, 8, 2).unwrap(),
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["draw_date"], "2025-08-02");
        assert_eq!(value["plays"][0]["line"], 1);
        assert_eq!(value["plays"][0]["main_numbers"][4], 69);
        assert_eq!(value["plays"][0]["powerball"], 7);
    }
}
