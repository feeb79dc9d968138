//! Call State und Events

use super::peer::{IceCandidate, IceConnectionState, PeerName};
use crate::media::StreamInfo;
use crate::ui::{Controls, VideoSlot};
use serde::Serialize;
use std::fmt;

// ============================================================================
// CALL STATE
// ============================================================================

/// Aktueller Status der Demo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CallState {
    /// Kein Stream, kein Anruf
    Idle,
    /// Capture angefordert; `ready` sobald der pc1 Stream vorliegt
    Capturing { ready: bool },
    /// Beide Verbindungen existieren
    InCall {
        #[serde(rename = "secondCaptureRequested")]
        second_capture_requested: bool,
    },
}

impl CallState {
    pub fn name(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Capturing { .. } => "capturing",
            CallState::InCall { .. } => "in-call",
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// CALL EVENTS
// ============================================================================

/// Events die vom CallOrchestrator ausgelöst werden
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CallEvent {
    StateChanged {
        state: CallState,
    },
    ControlsChanged {
        controls: Controls,
    },
    /// Lokaler Stream wird in einem Slot angezeigt
    LocalStreamShown {
        slot: VideoSlot,
        stream: StreamInfo,
    },
    /// Remote Stream wird in einem Slot angezeigt
    RemoteStreamShown {
        slot: VideoSlot,
        #[serde(rename = "streamId")]
        stream_id: String,
    },
    SlotCleared {
        slot: VideoSlot,
    },
    /// Blockierender Hinweis an den Benutzer
    Alert {
        message: String,
    },
    /// Candidate von `from` wurde an die andere Verbindung weitergereicht
    IceCandidate {
        from: PeerName,
        candidate: Option<IceCandidate>,
        added: bool,
    },
    IceStateChanged {
        peer: PeerName,
        state: IceConnectionState,
    },
    /// Descriptor-Austausch mit `offerer` als Anbieter ist abgeschlossen
    Negotiated {
        offerer: PeerName,
        answered: bool,
    },
    /// Zeit vom Anrufstart bis zum ersten Remote Video
    SetupTime {
        millis: f64,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_json() {
        let json = serde_json::to_value(CallState::InCall {
            second_capture_requested: true,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "state": "inCall", "secondCaptureRequested": true })
        );
        assert_eq!(CallState::Capturing { ready: false }.to_string(), "capturing");
    }

    #[test]
    fn test_event_json_tag() {
        let json = serde_json::to_value(CallEvent::IceCandidate {
            from: PeerName::Pc1,
            candidate: None,
            added: true,
        })
        .unwrap();
        assert_eq!(json["type"], "iceCandidate");
        assert_eq!(json["from"], "pc1");
        assert!(json["candidate"].is_null());
    }
}
