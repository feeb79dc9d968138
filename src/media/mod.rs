//! Media Module - Capture-Geräte und Media Streams
//!
//! Dieses Modul verwaltet:
//! - Media Streams und ihre Audio/Video Tracks
//! - Capture Constraints (Geräteauswahl pro Track-Art)
//! - Den Capture-Provider (synthetische Geräte, optional Host-Mikrofone)

mod capture;
mod constraints;
#[cfg(feature = "host-audio")]
mod host;
mod stream;
mod synthetic;

pub use capture::{CaptureError, CaptureProvider};
pub use constraints::{DeviceSelector, MediaConstraints};
#[cfg(feature = "host-audio")]
pub use host::host_audio_devices;
pub use stream::{MediaStream, MediaTrack, StreamInfo, TrackInfo, TrackKind};
pub use synthetic::{CaptureDevice, SyntheticCapture};
