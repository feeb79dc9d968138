//! Host-Mikrofone als Capture-Geräte
//!
//! Verwendet cpal nur zur Geräteauflistung. Die Tracks dieser Geräte senden
//! weiterhin Platzhalter-Frames.

use super::stream::TrackKind;
use super::synthetic::CaptureDevice;
use cpal::traits::{DeviceTrait, HostTrait};

/// Listet alle Audio-Eingabegeräte des Hosts auf
///
/// Die Geräte-ID ist der Gerätename, wie ihn cpal meldet.
pub fn host_audio_devices() -> Vec<CaptureDevice> {
    let host = cpal::default_host();

    let devices = match host.input_devices() {
        Ok(devices) => devices,
        Err(e) => {
            tracing::warn!("Could not enumerate host audio devices: {}", e);
            return Vec::new();
        }
    };

    devices
        .filter_map(|d| d.name().ok())
        .map(|name| CaptureDevice::new(TrackKind::Audio, name.clone(), name))
        .collect()
}
