//! # Verification Session Module
//!
//! The state machine orchestrating Preview → (optional corrections) →
//! Verify. The session owns the selected image and a monotonically
//! increasing attempt token; every asynchronous operation captures the token
//! at dispatch and applies its result only while that token is still
//! current. A superseded result is dropped unconditionally and silently: it
//! was overtaken, not failed.
//!
//! All state mutation happens under one mutex acquisition, so the
//! check-then-set on the token is atomic: no await ever sits between the
//! check and the mutation. Results are therefore applied in token order of
//! applicability, not completion order.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::acquire::{self, ImageAsset, ImageSource};
use crate::api::{DetectedPlay, ManualPlay, TicketApi, VerificationOutcome};
use crate::classifier::{self, RecoveryAction};
use crate::compression;
use crate::errors::{error_logging, TicketError, TicketResult};
use crate::fingerprint::FingerprintProvider;
use crate::quota::QuotaGate;
use crate::validation;

/// Strictly increasing attempt identifier. Results carrying an old token are
/// never applied.
pub type AttemptToken = u64;

/// Session state snapshot, always tagged with the attempt token that
/// produced it. The UI never observes two tokens' data simultaneously.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle {
        token: AttemptToken,
    },
    ImageSelected {
        token: AttemptToken,
    },
    Compressing {
        token: AttemptToken,
    },
    ImageReady {
        token: AttemptToken,
    },
    PreviewPending {
        token: AttemptToken,
    },
    PreviewReady {
        token: AttemptToken,
        plays: Vec<DetectedPlay>,
        confidence: f64,
        draw_date_detected: Option<String>,
    },
    VerifyPending {
        token: AttemptToken,
    },
    VerifySucceeded {
        token: AttemptToken,
        outcome: VerificationOutcome,
    },
    VerifyNeedsManualDate {
        token: AttemptToken,
        suggested_date: Option<NaiveDate>,
    },
    VerifyNeedsManualNumbers {
        token: AttemptToken,
        detected_count: usize,
        validation_errors: Vec<String>,
    },
    /// Error-displaying state; the held image survives so retry is cheap
    AttemptFailed {
        token: AttemptToken,
        error: TicketError,
        recovery: RecoveryAction,
    },
}

impl SessionState {
    /// The attempt token that produced this state
    pub fn token(&self) -> AttemptToken {
        match self {
            SessionState::Idle { token }
            | SessionState::ImageSelected { token }
            | SessionState::Compressing { token }
            | SessionState::ImageReady { token }
            | SessionState::PreviewPending { token }
            | SessionState::PreviewReady { token, .. }
            | SessionState::VerifyPending { token }
            | SessionState::VerifySucceeded { token, .. }
            | SessionState::VerifyNeedsManualDate { token, .. }
            | SessionState::VerifyNeedsManualNumbers { token, .. }
            | SessionState::AttemptFailed { token, .. } => *token,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SessionState::Idle { .. } => "idle",
            SessionState::ImageSelected { .. } => "image_selected",
            SessionState::Compressing { .. } => "compressing",
            SessionState::ImageReady { .. } => "image_ready",
            SessionState::PreviewPending { .. } => "preview_pending",
            SessionState::PreviewReady { .. } => "preview_ready",
            SessionState::VerifyPending { .. } => "verify_pending",
            SessionState::VerifySucceeded { .. } => "verify_succeeded",
            SessionState::VerifyNeedsManualDate { .. } => "verify_needs_manual_date",
            SessionState::VerifyNeedsManualNumbers { .. } => "verify_needs_manual_numbers",
            SessionState::AttemptFailed { .. } => "attempt_failed",
        }
    }
}

/// Receives a read-only state snapshot on every applied transition.
///
/// The session exposes nothing else to the rendering layer; rendering stays
/// host-agnostic.
pub trait Presenter: Send + Sync {
    fn present(&self, state: &SessionState);
}

/// Presenter that discards snapshots
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPresenter;

impl Presenter for NoopPresenter {
    fn present(&self, _state: &SessionState) {}
}

/// Presenter that logs transitions through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn present(&self, state: &SessionState) {
        info!(token = state.token(), state = state.name(), "Session state");
    }
}

struct Inner {
    current_token: AttemptToken,
    state: SessionState,
    image: Option<ImageAsset>,
}

/// The verification workflow state machine.
///
/// One instance per client surface; the image/token pair is exclusively
/// owned here. Cross-tab quota arbitration is the server's problem.
pub struct VerificationSession<A: TicketApi, F: FingerprintProvider> {
    api: A,
    fingerprint: F,
    is_mobile: bool,
    presenter: Arc<dyn Presenter>,
    inner: Mutex<Inner>,
}

impl<A: TicketApi, F: FingerprintProvider> VerificationSession<A, F> {
    pub fn new(api: A, fingerprint: F, is_mobile: bool, presenter: Arc<dyn Presenter>) -> Self {
        Self {
            api,
            fingerprint,
            is_mobile,
            presenter,
            inner: Mutex::new(Inner {
                current_token: 0,
                state: SessionState::Idle { token: 0 },
                image: None,
            }),
        }
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    /// The image the session currently holds, if any
    pub fn held_image(&self) -> Option<ImageAsset> {
        self.inner.lock().image.clone()
    }

    /// Select a new ticket image.
    ///
    /// Allocates a fresh attempt token, so completions of any in-flight
    /// operations from earlier attempts become unapplicable. The previous
    /// image is replaced wholesale.
    pub fn select_image(
        &self,
        source: ImageSource,
        mime: &str,
        bytes: Vec<u8>,
    ) -> TicketResult<AttemptToken> {
        let asset = match acquire::select(source, mime, bytes) {
            Ok(asset) => asset,
            Err(error) => {
                let token = self.inner.lock().current_token;
                self.apply_error(token, error.clone());
                return Err(error);
            }
        };

        let state = {
            let mut inner = self.inner.lock();
            inner.current_token += 1;
            let token = inner.current_token;
            inner.image = Some(asset);
            inner.state = SessionState::ImageSelected { token };
            inner.state.clone()
        };
        let token = state.token();
        self.presenter.present(&state);
        Ok(token)
    }

    /// Run the adaptive compression policy over the held image.
    ///
    /// On failure the attempt aborts before any network call; the raw asset
    /// is never silently uploaded in its place.
    pub fn prepare_image(&self) -> TicketResult<()> {
        let (token, asset) = {
            let mut inner = self.inner.lock();
            let token = inner.current_token;
            let asset = match inner.image.clone() {
                Some(asset) => asset,
                None => return Err(no_image_error()),
            };
            inner.state = SessionState::Compressing { token };
            (token, asset)
        };
        self.presenter.present(&SessionState::Compressing { token });

        match compression::maybe_compress(asset, self.is_mobile) {
            Ok(prepared) => {
                let state = {
                    let mut inner = self.inner.lock();
                    if inner.current_token != token {
                        debug!(token, "Dropping superseded compression result");
                        return Ok(());
                    }
                    inner.image = Some(prepared);
                    inner.state = SessionState::ImageReady { token };
                    inner.state.clone()
                };
                self.presenter.present(&state);
                Ok(())
            }
            Err(error) => {
                error_logging::log_image_error(&error, "prepare_image", None);
                self.apply_error(token, error.clone());
                Err(error)
            }
        }
    }

    /// Low-cost OCR preview of the held image.
    ///
    /// Quota is checked fresh immediately before the call. A completion for
    /// a superseded token is dropped and reported as `Ok(())`.
    pub async fn preview(&self) -> TicketResult<()> {
        let (token, image) = self.begin_pending(PendingKind::Preview)?;
        let fingerprint = self.fingerprint.fingerprint();

        if let Some(error) = self.gate_quota(fingerprint.as_deref()).await {
            return self.finish_with_error(token, error);
        }

        match self.api.preview(&image, fingerprint.as_deref()).await {
            Ok(response) => {
                let applied = self.apply_if_current(token, || SessionState::PreviewReady {
                    token,
                    plays: response.detected_plays,
                    confidence: response.confidence,
                    draw_date_detected: response.draw_date_detected,
                });
                if !applied {
                    debug!(token, "Dropping superseded preview response");
                }
                Ok(())
            }
            Err(failure) => self.finish_with_error(token, classifier::classify(&failure)),
        }
    }

    /// Authoritative verification of the held image, optionally with an
    /// explicit draw date (the manual-date resubmission path).
    pub async fn verify(&self, manual_date: Option<NaiveDate>) -> TicketResult<()> {
        let (token, image) = self.begin_pending(PendingKind::Verify)?;
        let fingerprint = self.fingerprint.fingerprint();

        if let Some(error) = self.gate_quota(fingerprint.as_deref()).await {
            return self.finish_with_error(token, error);
        }

        match self
            .api
            .verify(&image, manual_date, fingerprint.as_deref())
            .await
        {
            Ok(outcome) => {
                let applied = self.apply_if_current(token, || SessionState::VerifySucceeded {
                    token,
                    outcome,
                });
                if !applied {
                    debug!(token, "Dropping superseded verify response");
                }
                Ok(())
            }
            Err(failure) => self.finish_with_error(token, classifier::classify(&failure)),
        }
    }

    /// Verify manually entered plays against an explicit draw date.
    ///
    /// Invalid input is rejected client-side before any quota is spent; the
    /// manual-numbers form state carries every problem found.
    pub async fn verify_manual(
        &self,
        plays: Vec<ManualPlay>,
        draw_date: NaiveDate,
    ) -> TicketResult<()> {
        if let Err(problems) = validation::validate_manual_plays(&plays) {
            let error = TicketError::NumbersUnreadable {
                detected_count: plays.len(),
                validation_errors: problems,
            };
            let token = self.inner.lock().current_token;
            self.apply_error(token, error.clone());
            return Err(error);
        }

        let token = {
            let mut inner = self.inner.lock();
            let token = inner.current_token;
            inner.state = SessionState::VerifyPending { token };
            token
        };
        self.presenter.present(&SessionState::VerifyPending { token });

        let fingerprint = self.fingerprint.fingerprint();
        if let Some(error) = self.gate_quota(fingerprint.as_deref()).await {
            return self.finish_with_error(token, error);
        }

        match self
            .api
            .verify_manual(&plays, draw_date, fingerprint.as_deref())
            .await
        {
            Ok(outcome) => {
                let applied = self.apply_if_current(token, || SessionState::VerifySucceeded {
                    token,
                    outcome,
                });
                if !applied {
                    debug!(token, "Dropping superseded manual verify response");
                }
                Ok(())
            }
            Err(failure) => self.finish_with_error(token, classifier::classify(&failure)),
        }
    }

    /// Discard the held image and return to idle under a fresh token
    pub fn reset(&self) {
        let state = {
            let mut inner = self.inner.lock();
            inner.current_token += 1;
            inner.image = None;
            inner.state = SessionState::Idle {
                token: inner.current_token,
            };
            inner.state.clone()
        };
        self.presenter.present(&state);
    }

    /// Capture the current token, grab the image and enter a pending state,
    /// all under one lock acquisition.
    fn begin_pending(&self, kind: PendingKind) -> TicketResult<(AttemptToken, ImageAsset)> {
        let (token, image, state) = {
            let mut inner = self.inner.lock();
            let token = inner.current_token;
            let image = match inner.image.clone() {
                Some(image) => image,
                None => return Err(no_image_error()),
            };
            inner.state = match kind {
                PendingKind::Preview => SessionState::PreviewPending { token },
                PendingKind::Verify => SessionState::VerifyPending { token },
            };
            (token, image, inner.state.clone())
        };
        self.presenter.present(&state);
        Ok((token, image))
    }

    /// Run the quota gate; `Some(error)` means the attempt must not proceed
    async fn gate_quota(&self, fingerprint: Option<&str>) -> Option<TicketError> {
        let status = QuotaGate::check(&self.api, fingerprint).await;
        if status.allowed {
            None
        } else {
            Some(TicketError::QuotaExceeded {
                user_type: status.user_type,
            })
        }
    }

    /// Apply a state iff the captured token is still current. The check and
    /// the mutation share one lock acquisition.
    fn apply_if_current<S>(&self, token: AttemptToken, make_state: S) -> bool
    where
        S: FnOnce() -> SessionState,
    {
        let state = {
            let mut inner = self.inner.lock();
            if inner.current_token != token {
                return false;
            }
            inner.state = make_state();
            inner.state.clone()
        };
        self.presenter.present(&state);
        true
    }

    /// Route a classified error into its display state. The held image is
    /// never discarded here. Returns whether the error was applied (a stale
    /// token means the failure was superseded, not surfaced).
    fn apply_error(&self, token: AttemptToken, error: TicketError) -> bool {
        let recovery = classifier::recovery_for(&error);
        let applied = self.apply_if_current(token, || match &error {
            TicketError::DrawDateUnresolved { suggested_date } => {
                SessionState::VerifyNeedsManualDate {
                    token,
                    suggested_date: *suggested_date,
                }
            }
            TicketError::NumbersUnreadable {
                detected_count,
                validation_errors,
            } => SessionState::VerifyNeedsManualNumbers {
                token,
                detected_count: *detected_count,
                validation_errors: validation_errors.clone(),
            },
            _ => SessionState::AttemptFailed {
                token,
                error: error.clone(),
                recovery: recovery.clone(),
            },
        });

        if applied {
            error_logging::log_classified_failure(&error, "verification_attempt", &recovery);
        } else {
            debug!(token, "Dropping superseded failure");
        }
        applied
    }

    /// Apply an error for this token, or swallow it if the attempt was
    /// superseded (a stale failure is not a failure).
    fn finish_with_error(&self, token: AttemptToken, error: TicketError) -> TicketResult<()> {
        if self.apply_error(token, error.clone()) {
            Err(error)
        } else {
            Ok(())
        }
    }
}

enum PendingKind {
    Preview,
    Verify,
}

fn no_image_error() -> TicketError {
    TicketError::InvalidFileType {
        mime: "(no image selected)".to_string(),
    }
}
