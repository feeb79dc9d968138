//! Synthetische Capture-Geräte
//!
//! Stellt Kamera- und Mikrofon-Geräte bereit, deren Tracks Platzhalter-Frames
//! in ihre webrtc-rs Local Tracks schreiben. Damit fließen RTP-Pakete über
//! die Verbindung, ohne dass echte Hardware oder ein Encoder nötig ist.

use super::capture::{CaptureError, CaptureProvider};
use super::constraints::{DeviceSelector, MediaConstraints};
use super::stream::{MediaStream, MediaTrack, TrackKind};
use crate::config::CallConfig;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use webrtc::media::Sample;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Opus-Frame für 20ms Stille
const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Minimaler VP8 Key-Frame Header (16x16)
const VP8_KEYFRAME: [u8; 10] = [0x50, 0x42, 0x00, 0x9d, 0x01, 0x2a, 0x10, 0x00, 0x10, 0x00];

const AUDIO_FRAME_INTERVAL: Duration = Duration::from_millis(20);
const VIDEO_FRAME_INTERVAL: Duration = Duration::from_millis(33);

// ============================================================================
// CAPTURE DEVICE
// ============================================================================

/// Ein Capture-Gerät
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureDevice {
    pub id: String,
    pub label: String,
    pub kind: TrackKind,
}

impl CaptureDevice {
    pub fn new(kind: TrackKind, id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
        }
    }
}

// ============================================================================
// SYNTHETIC CAPTURE
// ============================================================================

/// Capture-Provider mit synthetischen Geräten
pub struct SyntheticCapture {
    devices: RwLock<Vec<CaptureDevice>>,
    permission_granted: AtomicBool,
}

impl SyntheticCapture {
    /// Standard-Geräte: ein Mikrofon und eine Kamera
    pub fn new() -> Self {
        Self::with_devices(vec![
            CaptureDevice::new(TrackKind::Audio, "default", "Synthetic Microphone"),
            CaptureDevice::new(TrackKind::Video, "default", "Synthetic Camera"),
        ])
    }

    pub fn with_devices(devices: Vec<CaptureDevice>) -> Self {
        Self {
            devices: RwLock::new(devices),
            permission_granted: AtomicBool::new(true),
        }
    }

    /// Standard-Geräte plus die in der Konfiguration genannten Geräte für pc2
    pub fn from_config(config: &CallConfig) -> Self {
        let capture = Self::new();
        let second = &config.second_capture;

        if let Some(id) = second.audio.as_ref().and_then(DeviceSelector::device_id) {
            capture.add_device(CaptureDevice::new(TrackKind::Audio, id, "Synthetic Microphone 2"));
        }
        if let Some(id) = second.video.as_ref().and_then(DeviceSelector::device_id) {
            capture.add_device(CaptureDevice::new(TrackKind::Video, id, "Synthetic Camera 2"));
        }

        #[cfg(feature = "host-audio")]
        for device in super::host::host_audio_devices() {
            capture.add_device(device);
        }

        capture
    }

    pub fn add_device(&self, device: CaptureDevice) {
        let mut devices = self.devices.write();
        if !devices.iter().any(|d| d.kind == device.kind && d.id == device.id) {
            tracing::debug!("Registered {} device {} ({})", device.kind, device.id, device.label);
            devices.push(device);
        }
    }

    pub fn devices(&self) -> Vec<CaptureDevice> {
        self.devices.read().clone()
    }

    /// Simuliert, dass der Benutzer den Zugriff verweigert
    pub fn deny_permission(&self) {
        self.permission_granted.store(false, Ordering::SeqCst);
    }

    pub fn grant_permission(&self) {
        self.permission_granted.store(true, Ordering::SeqCst);
    }

    /// Wählt ein Gerät passend zum Selector
    fn select(&self, kind: TrackKind, selector: &DeviceSelector) -> Result<CaptureDevice, CaptureError> {
        let devices = self.devices.read();
        let mut of_kind = devices.iter().filter(|d| d.kind == kind);

        let found = match selector {
            DeviceSelector::Any => of_kind.next(),
            DeviceSelector::Ideal(id) => {
                let candidates: Vec<_> = of_kind.collect();
                candidates
                    .iter()
                    .find(|d| &d.id == id)
                    .or_else(|| candidates.first())
                    .copied()
            }
            DeviceSelector::Exact(id) => {
                return of_kind.find(|d| &d.id == id).cloned().ok_or_else(|| {
                    CaptureError::Overconstrained {
                        kind,
                        constraint: "deviceId".to_string(),
                    }
                })
            }
        };

        found.cloned().ok_or(CaptureError::NotFound(kind))
    }
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureProvider for SyntheticCapture {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        if constraints.is_empty() {
            return Err(CaptureError::InvalidConstraints);
        }
        if !self.permission_granted.load(Ordering::SeqCst) {
            return Err(CaptureError::NotAllowed);
        }

        // Erst alle Geräte auswählen, damit bei Fehlern nichts gestartet wird
        let mut selected = Vec::new();
        if let Some(selector) = &constraints.audio {
            selected.push(self.select(TrackKind::Audio, selector)?);
        }
        if let Some(selector) = &constraints.video {
            selected.push(self.select(TrackKind::Video, selector)?);
        }

        let mut stream = MediaStream::new();
        for device in selected {
            let track = stream.add_track(device.kind, device.label.clone(), device.id.clone());
            spawn_frame_pump(track);
        }

        tracing::debug!(
            "Captured stream {} with {} track(s)",
            stream.id(),
            stream.tracks().len()
        );
        Ok(stream)
    }
}

/// Schreibt Platzhalter-Frames in den Track, bis er gestoppt wird
fn spawn_frame_pump(track: &MediaTrack) {
    let sample_track = track.sample_track();
    let mut stopped = track.stop_signal();
    let (payload, interval) = match track.kind() {
        TrackKind::Audio => (Bytes::from_static(&OPUS_SILENCE), AUDIO_FRAME_INTERVAL),
        TrackKind::Video => (Bytes::from_static(&VP8_KEYFRAME), VIDEO_FRAME_INTERVAL),
    };

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            if *stopped.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = Sample {
                        data: payload.clone(),
                        duration: interval,
                        ..Default::default()
                    };
                    if let Err(e) = sample_track.write_sample(&sample).await {
                        tracing::trace!("Dropped placeholder frame: {}", e);
                    }
                }
                changed = stopped.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cameras() -> SyntheticCapture {
        SyntheticCapture::with_devices(vec![
            CaptureDevice::new(TrackKind::Audio, "mic-1", "Mic 1"),
            CaptureDevice::new(TrackKind::Video, "cam-1", "Cam 1"),
            CaptureDevice::new(TrackKind::Video, "cam-2", "Cam 2"),
        ])
    }

    #[tokio::test]
    async fn test_audio_video_capture() {
        let capture = SyntheticCapture::new();
        let stream = capture
            .get_user_media(&MediaConstraints::audio_video())
            .await
            .unwrap();

        assert_eq!(stream.audio_tracks().count(), 1);
        assert_eq!(stream.video_tracks().count(), 1);
        assert_eq!(stream.tracks()[0].label(), "Synthetic Microphone");
        stream.stop();
    }

    #[tokio::test]
    async fn test_ideal_device_falls_back() {
        let capture = two_cameras();

        let preferred = capture
            .get_user_media(&MediaConstraints::with_devices("mic-1", "cam-2"))
            .await
            .unwrap();
        assert_eq!(preferred.video_tracks().next().unwrap().device_id(), "cam-2");

        // Unbekannte ID: erstes Gerät der Art
        let fallback = capture
            .get_user_media(&MediaConstraints::with_devices("nope", "nope"))
            .await
            .unwrap();
        assert_eq!(fallback.audio_tracks().next().unwrap().device_id(), "mic-1");
        assert_eq!(fallback.video_tracks().next().unwrap().device_id(), "cam-1");
    }

    #[tokio::test]
    async fn test_exact_device_is_overconstrained() {
        let capture = two_cameras();
        let constraints = MediaConstraints {
            audio: None,
            video: Some(DeviceSelector::Exact("cam-9".into())),
        };

        let err = capture.get_user_media(&constraints).await.unwrap_err();
        assert_eq!(err.name(), "OverconstrainedError");
    }

    #[tokio::test]
    async fn test_missing_kind_is_not_found() {
        let capture = SyntheticCapture::with_devices(vec![CaptureDevice::new(
            TrackKind::Audio,
            "mic-1",
            "Mic 1",
        )]);

        let err = capture
            .get_user_media(&MediaConstraints::audio_video())
            .await
            .unwrap_err();
        assert_eq!(err, CaptureError::NotFound(TrackKind::Video));
    }

    #[tokio::test]
    async fn test_denied_and_empty_requests() {
        let capture = SyntheticCapture::new();
        assert_eq!(
            capture
                .get_user_media(&MediaConstraints::default())
                .await
                .unwrap_err(),
            CaptureError::InvalidConstraints
        );

        capture.deny_permission();
        let err = capture
            .get_user_media(&MediaConstraints::audio_video())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "NotAllowedError");

        capture.grant_permission();
        assert!(capture
            .get_user_media(&MediaConstraints::audio_video())
            .await
            .is_ok());
    }

    #[test]
    fn test_from_config_registers_second_devices() {
        let config = CallConfig::default();
        let capture = SyntheticCapture::from_config(&config);
        let devices = capture.devices();

        let video_ids: Vec<_> = devices
            .iter()
            .filter(|d| d.kind == TrackKind::Video)
            .map(|d| d.id.as_str())
            .collect();
        assert!(video_ids.contains(&"default"));
        assert!(video_ids.contains(&crate::config::DEFAULT_PC2_VIDEO_DEVICE));

        // Doppelte Registrierung wird ignoriert
        let before = capture.devices().len();
        capture.add_device(CaptureDevice::new(TrackKind::Video, "default", "again"));
        assert_eq!(capture.devices().len(), before);
    }
}
