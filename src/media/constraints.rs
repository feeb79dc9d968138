//! Capture Constraints
//!
//! Beschreibt, welche Track-Arten angefordert werden und welches Gerät
//! pro Art gewählt werden soll.

use serde::{Deserialize, Serialize};

/// Geräteauswahl für eine Track-Art
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "deviceId")]
pub enum DeviceSelector {
    /// Irgendein Gerät der passenden Art
    #[default]
    Any,
    /// Bevorzugtes Gerät, fällt auf ein anderes Gerät zurück
    Ideal(String),
    /// Genau dieses Gerät, sonst schlägt der Capture fehl
    Exact(String),
}

impl DeviceSelector {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            DeviceSelector::Any => None,
            DeviceSelector::Ideal(id) | DeviceSelector::Exact(id) => Some(id),
        }
    }
}

/// Constraints für eine Capture-Anfrage
///
/// `None` bedeutet, dass diese Track-Art nicht angefordert wird.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub audio: Option<DeviceSelector>,
    pub video: Option<DeviceSelector>,
}

impl MediaConstraints {
    /// Audio und Video von beliebigen Geräten
    pub fn audio_video() -> Self {
        Self {
            audio: Some(DeviceSelector::Any),
            video: Some(DeviceSelector::Any),
        }
    }

    /// Audio und Video mit bevorzugten Geräte-IDs
    pub fn with_devices(audio_device: impl Into<String>, video_device: impl Into<String>) -> Self {
        Self {
            audio: Some(DeviceSelector::Ideal(audio_device.into())),
            video: Some(DeviceSelector::Ideal(video_device.into())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_none() && self.video.is_none()
    }
}
