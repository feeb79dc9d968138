//! UI Module - Buttons, Video-Slots und Konsole
//!
//! Die Buttons werden nicht mehr direkt an- und ausgeschaltet, sondern aus
//! dem `CallState` abgeleitet.

pub mod console;
pub mod demo;

use crate::call_engine::{CallState, PeerName};
use serde::Serialize;
use std::fmt;

// ============================================================================
// CONTROLS
// ============================================================================

/// Aktivierungszustand der vier Buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub start: bool,
    pub call: bool,
    pub second_video: bool,
    pub hangup: bool,
}

impl Controls {
    pub fn for_state(state: &CallState) -> Self {
        match *state {
            CallState::Idle => Self {
                start: true,
                ..Default::default()
            },
            CallState::Capturing { ready } => Self {
                call: ready,
                ..Default::default()
            },
            CallState::InCall {
                second_capture_requested,
            } => Self {
                second_video: !second_capture_requested,
                hangup: true,
                ..Default::default()
            },
        }
    }
}

impl fmt::Display for Controls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = |enabled: bool| if enabled { "+" } else { "-" };
        write!(
            f,
            "[{}start] [{}call] [{}pc2video] [{}hangup]",
            mark(self.start),
            mark(self.call),
            mark(self.second_video),
            mark(self.hangup)
        )
    }
}

// ============================================================================
// VIDEO SLOTS
// ============================================================================

/// Anzeigefläche für einen Stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoSlot {
    Pc1Local,
    Pc1Remote,
    Pc2Local,
    Pc2Remote,
}

impl VideoSlot {
    pub const ALL: [VideoSlot; 4] = [
        VideoSlot::Pc1Local,
        VideoSlot::Pc1Remote,
        VideoSlot::Pc2Local,
        VideoSlot::Pc2Remote,
    ];

    pub fn local(peer: PeerName) -> Self {
        match peer {
            PeerName::Pc1 => VideoSlot::Pc1Local,
            PeerName::Pc2 => VideoSlot::Pc2Local,
        }
    }

    pub fn remote(peer: PeerName) -> Self {
        match peer {
            PeerName::Pc1 => VideoSlot::Pc1Remote,
            PeerName::Pc2 => VideoSlot::Pc2Remote,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoSlot::Pc1Local => "pc1-local",
            VideoSlot::Pc1Remote => "pc1-remote",
            VideoSlot::Pc2Local => "pc2-local",
            VideoSlot::Pc2Remote => "pc2-remote",
        }
    }
}

impl fmt::Display for VideoSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_follow_state() {
        let idle = Controls::for_state(&CallState::Idle);
        assert!(idle.start && !idle.call && !idle.second_video && !idle.hangup);

        let pending = Controls::for_state(&CallState::Capturing { ready: false });
        assert_eq!(pending, Controls::default());

        let ready = Controls::for_state(&CallState::Capturing { ready: true });
        assert!(ready.call && !ready.start);

        let in_call = Controls::for_state(&CallState::InCall {
            second_capture_requested: false,
        });
        assert!(in_call.hangup && in_call.second_video && !in_call.call);

        let requested = Controls::for_state(&CallState::InCall {
            second_capture_requested: true,
        });
        assert!(requested.hangup && !requested.second_video);
    }

    #[test]
    fn test_slots() {
        assert_eq!(VideoSlot::remote(PeerName::Pc2), VideoSlot::Pc2Remote);
        assert_eq!(VideoSlot::local(PeerName::Pc1).to_string(), "pc1-local");
        assert_eq!(
            serde_json::to_value(VideoSlot::Pc1Remote).unwrap(),
            serde_json::json!("pc1-remote")
        );
    }

    #[test]
    fn test_controls_display() {
        let controls = Controls::for_state(&CallState::Idle);
        assert_eq!(
            controls.to_string(),
            "[+start] [-call] [-pc2video] [-hangup]"
        );
    }
}
