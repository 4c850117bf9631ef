//! # Device Fingerprint Module
//!
//! Best-effort device identity used to rate-limit unauthenticated callers.
//! The blob is opaque to this crate (the hashing lives with the host); all we
//! guarantee is that a provider may be asynchronously initialized and may
//! never become ready, and that verification proceeds either way.

use std::sync::Arc;

use parking_lot::Mutex;

/// Supplies the opaque device identity blob, when available.
///
/// Injected into the session rather than reached for ambiently, so hosts
/// without a fingerprint capability plug in [`NoFingerprint`].
pub trait FingerprintProvider: Send + Sync {
    /// The current fingerprint JSON blob; `None` while (or forever if)
    /// initialization has not completed.
    fn fingerprint(&self) -> Option<String>;
}

/// Provider for hosts with no fingerprint capability
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFingerprint;

impl FingerprintProvider for NoFingerprint {
    fn fingerprint(&self) -> Option<String> {
        None
    }
}

/// Provider with a blob known at construction time
#[derive(Debug, Clone)]
pub struct StaticFingerprint {
    blob: String,
}

impl StaticFingerprint {
    pub fn new(blob: impl Into<String>) -> Self {
        Self { blob: blob.into() }
    }
}

impl FingerprintProvider for StaticFingerprint {
    fn fingerprint(&self) -> Option<String> {
        Some(self.blob.clone())
    }
}

/// Provider whose blob arrives later, from a host-side initialization task.
///
/// Reads before `set_ready` observe `None`; verification is never blocked
/// waiting for the fingerprint.
#[derive(Debug, Clone, Default)]
pub struct SharedFingerprint {
    slot: Arc<Mutex<Option<String>>>,
}

impl SharedFingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the blob once host-side initialization completes
    pub fn set_ready(&self, blob: impl Into<String>) {
        *self.slot.lock() = Some(blob.into());
    }
}

impl FingerprintProvider for SharedFingerprint {
    fn fingerprint(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}
