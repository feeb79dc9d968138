//! Capture-Provider Schnittstelle

use super::constraints::MediaConstraints;
use super::stream::{MediaStream, TrackKind};
use async_trait::async_trait;
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Fehler beim Anfordern eines Capture-Streams
///
/// `name()` liefert den Fehlernamen, der dem Benutzer angezeigt wird.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission to capture media was denied")]
    NotAllowed,

    #[error("No {0} capture device found")]
    NotFound(TrackKind),

    #[error("Could not start {kind} source: {reason}")]
    NotReadable { kind: TrackKind, reason: String },

    #[error("No {kind} device satisfies constraint {constraint}")]
    Overconstrained { kind: TrackKind, constraint: String },

    #[error("Capture was aborted: {0}")]
    Aborted(String),

    #[error("At least one of audio and video must be requested")]
    InvalidConstraints,
}

impl CaptureError {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureError::NotAllowed => "NotAllowedError",
            CaptureError::NotFound(_) => "NotFoundError",
            CaptureError::NotReadable { .. } => "NotReadableError",
            CaptureError::Overconstrained { .. } => "OverconstrainedError",
            CaptureError::Aborted(_) => "AbortError",
            CaptureError::InvalidConstraints => "TypeError",
        }
    }
}

// ============================================================================
// CAPTURE PROVIDER
// ============================================================================

/// Liefert Audio/Video Streams von Capture-Geräten
#[async_trait]
pub trait CaptureProvider: Send + Sync {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names() {
        assert_eq!(CaptureError::NotAllowed.name(), "NotAllowedError");
        assert_eq!(CaptureError::NotFound(TrackKind::Video).name(), "NotFoundError");
        assert_eq!(
            CaptureError::Overconstrained {
                kind: TrackKind::Audio,
                constraint: "deviceId".into()
            }
            .name(),
            "OverconstrainedError"
        );
        assert_eq!(
            CaptureError::NotFound(TrackKind::Audio).to_string(),
            "No audio capture device found"
        );
    }
}
