//! Call Engine Module - zwei lokale Peer Connections
//!
//! Dieses Modul verwaltet:
//! - Zustand und Buttons der Demo
//! - Offer/Answer zwischen pc1 und pc2
//! - Weiterreichen der ICE Candidates
//! - Die webrtc-rs Anbindung

mod engine;
mod negotiation;
mod peer;
mod session;
mod state;
mod webrtc_peer;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{CallEngineError, CallOrchestrator};
pub use negotiation::Exchange;
pub use peer::{
    IceCandidate, IceConnectionState, OfferOptions, PeerConnection, PeerConnectionFactory,
    PeerError, PeerEvent, PeerEvents, PeerName, SdpKind, SessionDescription,
};
pub use state::{CallEvent, CallState};
pub use webrtc_peer::{WebRtcPeer, WebRtcPeerFactory};
