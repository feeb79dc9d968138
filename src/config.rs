//! Konfiguration
//!
//! Alle Werte haben Defaults und können über Umgebungsvariablen
//! überschrieben werden.

use crate::call_engine::OfferOptions;
use crate::media::MediaConstraints;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Bevorzugtes Mikrofon für den zweiten Capture (pc2)
pub const DEFAULT_PC2_AUDIO_DEVICE: &str =
    "8620bb8c0696c2d00a98942c0daf12b9d67f3b2cbe28935ad821546dc35274e4";

/// Bevorzugte Kamera für den zweiten Capture (pc2)
pub const DEFAULT_PC2_VIDEO_DEVICE: &str =
    "d908772b8f452e648580187544209535e73d5e24411f698b5ca8b9e025141db5";

pub const DEFAULT_EVENT_CAPACITY: usize = 100;

pub const ENV_ICE_SERVERS: &str = "LOOPBACK_ICE_SERVERS";
pub const ENV_PC2_AUDIO_DEVICE: &str = "LOOPBACK_PC2_AUDIO_DEVICE";
pub const ENV_PC2_VIDEO_DEVICE: &str = "LOOPBACK_PC2_VIDEO_DEVICE";
pub const ENV_EVENT_CAPACITY: &str = "LOOPBACK_EVENT_CAPACITY";

// ============================================================================
// CALL CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallConfig {
    /// STUN/TURN URLs. Leer bedeutet nur Host-Candidates.
    pub ice_servers: Vec<String>,
    /// Optionen für jedes erzeugte Offer
    pub offer_options: OfferOptions,
    /// Constraints für den zweiten Capture (pc2)
    pub second_capture: MediaConstraints,
    /// Kapazität des Event-Broadcast-Kanals
    pub event_capacity: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            offer_options: OfferOptions::default(),
            second_capture: MediaConstraints::with_devices(
                DEFAULT_PC2_AUDIO_DEVICE,
                DEFAULT_PC2_VIDEO_DEVICE,
            ),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CallConfig {
    /// Liest die Konfiguration aus den Umgebungsvariablen
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(servers) = lookup(ENV_ICE_SERVERS) {
            config.ice_servers = parse_list(&servers);
        }

        let audio = lookup(ENV_PC2_AUDIO_DEVICE).unwrap_or_else(|| DEFAULT_PC2_AUDIO_DEVICE.to_string());
        let video = lookup(ENV_PC2_VIDEO_DEVICE).unwrap_or_else(|| DEFAULT_PC2_VIDEO_DEVICE.to_string());
        config.second_capture = MediaConstraints::with_devices(audio, video);

        if let Some(raw) = lookup(ENV_EVENT_CAPACITY) {
            match raw.trim().parse::<usize>() {
                Ok(capacity) if capacity > 0 => config.event_capacity = capacity,
                _ => tracing::warn!(
                    "Ignoring invalid {}={:?}, using {}",
                    ENV_EVENT_CAPACITY,
                    raw,
                    DEFAULT_EVENT_CAPACITY
                ),
            }
        }

        config
    }
}

/// Komma-getrennte Liste, leere Einträge werden verworfen
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
