//! Media Streams und Tracks
//!
//! Ein `MediaStream` bündelt die Tracks eines einzelnen Capture-Vorgangs.
//! Jeder Track trägt einen webrtc-rs Local Track, der an eine Peer
//! Connection angehängt werden kann.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

// ============================================================================
// TRACK KIND
// ============================================================================

/// Art eines Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }

    /// Codec, mit dem Tracks dieser Art gesendet werden
    fn codec(&self) -> RTCRtpCodecCapability {
        match self {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MEDIA TRACK
// ============================================================================

/// Ein einzelner Audio- oder Video-Track
///
/// Klone teilen sich den Stop-Zustand: wird ein Klon gestoppt, gelten alle
/// als gestoppt.
#[derive(Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    label: String,
    device_id: String,
    local: Arc<TrackLocalStaticSample>,
    stopped: Arc<watch::Sender<bool>>,
}

impl MediaTrack {
    fn new(kind: TrackKind, label: String, device_id: String, stream_id: &str) -> Self {
        let id = Uuid::new_v4().to_string();
        let local = Arc::new(TrackLocalStaticSample::new(
            kind.codec(),
            id.clone(),
            stream_id.to_owned(),
        ));
        let (stopped, _) = watch::channel(false);

        Self {
            id,
            kind,
            label,
            device_id,
            local,
            stopped: Arc::new(stopped),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    /// Anzeigename des Geräts, z.B. "Synthetic Camera"
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Stoppt den Track. Mehrfaches Stoppen ist wirkungslos.
    pub fn stop(&self) {
        if !self.stopped.send_replace(true) {
            tracing::debug!("Stopped {} track {} ({})", self.kind, self.id, self.label);
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Receiver, der beim Stoppen des Tracks `true` liefert
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stopped.subscribe()
    }

    /// Local Track zum Anhängen an eine Peer Connection
    pub fn local_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        Arc::clone(&self.local) as Arc<dyn TrackLocal + Send + Sync>
    }

    pub(crate) fn sample_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.local)
    }

    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            id: self.id.clone(),
            kind: self.kind,
            label: self.label.clone(),
        }
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("device_id", &self.device_id)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

// ============================================================================
// MEDIA STREAM
// ============================================================================

/// Stream aus einem Capture-Vorgang (Audio + Video)
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    /// Erstellt einen leeren Stream mit neuer ID
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fügt einen neuen Track hinzu, der zu diesem Stream gehört
    pub fn add_track(
        &mut self,
        kind: TrackKind,
        label: impl Into<String>,
        device_id: impl Into<String>,
    ) -> &MediaTrack {
        let track = MediaTrack::new(kind, label.into(), device_id.into(), &self.id);
        self.tracks.push(track);
        &self.tracks[self.tracks.len() - 1]
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Audio)
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind == TrackKind::Video)
    }

    /// Stoppt alle Tracks des Streams
    pub fn stop(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn all_stopped(&self) -> bool {
        self.tracks.iter().all(MediaTrack::is_stopped)
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            id: self.id.clone(),
            tracks: self.tracks.iter().map(MediaTrack::info).collect(),
        }
    }
}

impl Default for MediaStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialisierbare Zusammenfassung eines Streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub id: String,
    pub tracks: Vec<TrackInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub id: String,
    pub kind: TrackKind,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn av_stream() -> MediaStream {
        let mut stream = MediaStream::new();
        stream.add_track(TrackKind::Audio, "Mic", "mic-1");
        stream.add_track(TrackKind::Video, "Cam", "cam-1");
        stream
    }

    #[test]
    fn test_tracks_by_kind() {
        let stream = av_stream();

        assert_eq!(stream.tracks().len(), 2);
        assert_eq!(stream.audio_tracks().count(), 1);
        assert_eq!(stream.video_tracks().next().map(|t| t.label()), Some("Cam"));
    }

    #[test]
    fn test_stop_is_shared_and_idempotent() {
        let stream = av_stream();
        let copy = stream.clone();
        assert!(!copy.all_stopped());

        stream.stop();
        stream.stop();

        // Klone sehen denselben Zustand
        assert!(copy.all_stopped());
    }

    #[test]
    fn test_stop_signal_observes_stop() {
        let stream = av_stream();
        let track = &stream.tracks()[0];
        let signal = track.stop_signal();
        assert!(!*signal.borrow());

        track.stop();
        assert!(*signal.borrow());
        assert!(track.is_stopped());
        assert!(!stream.tracks()[1].is_stopped());
    }

    #[test]
    fn test_info_lists_tracks_in_order() {
        let stream = av_stream();
        let info = stream.info();

        assert_eq!(info.id, stream.id());
        let kinds: Vec<_> = info.tracks.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TrackKind::Audio, TrackKind::Video]);
    }
}
