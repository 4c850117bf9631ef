//! # Ticket Check
//!
//! A host-agnostic ticket verification engine: acquires and adaptively
//! compresses a lottery ticket image, gates every attempt behind a fresh
//! quota check, drives the two-phase preview/verify network interaction and
//! guarantees that only the most recent attempt's responses are ever
//! rendered.

pub mod acquire;
pub mod api;
pub mod classifier;
pub mod compression;
pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod quota;
pub mod session;
pub mod validation;

// Re-export the types most hosts need
pub use acquire::{ImageAsset, ImageSource};
pub use api::{DetectedPlay, HttpTicketApi, ManualPlay, TicketApi, VerificationOutcome};
pub use errors::{TicketError, TicketResult};
pub use session::{AttemptToken, Presenter, SessionState, VerificationSession};
