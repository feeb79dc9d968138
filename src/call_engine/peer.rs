//! Peer Connection Schnittstelle
//!
//! Beschreibt die Echtzeit-Verbindung als Black Box: Descriptor- und
//! Candidate-Aufrufe plus ein Event-Stream pro Verbindung.

use crate::media::{MediaStream, TrackKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("WebRTC error: {0}")]
    WebRtc(String),

    #[error("Invalid SDP: {0}")]
    InvalidSdp(String),

    #[error("Peer connection is closed")]
    Closed,
}

// ============================================================================
// PEER NAME
// ============================================================================

/// Rolle einer der beiden lokalen Verbindungen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerName {
    Pc1,
    Pc2,
}

impl PeerName {
    /// Die jeweils andere Verbindung
    pub fn other(self) -> Self {
        match self {
            PeerName::Pc1 => PeerName::Pc2,
            PeerName::Pc2 => PeerName::Pc1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeerName::Pc1 => "pc1",
            PeerName::Pc2 => "pc2",
        }
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DESCRIPTORS & CANDIDATES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Offer oder Answer, wird unverändert an die andere Seite weitergereicht
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE Candidate im JSON-Format der Gegenseite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            ..Default::default()
        }
    }
}

/// Optionen für `create_offer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferOptions {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
}

impl Default for OfferOptions {
    fn default() -> Self {
        Self {
            offer_to_receive_audio: true,
            offer_to_receive_video: true,
        }
    }
}

/// ICE Verbindungsstatus einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for IceConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IceConnectionState::New => "new",
            IceConnectionState::Checking => "checking",
            IceConnectionState::Connected => "connected",
            IceConnectionState::Completed => "completed",
            IceConnectionState::Disconnected => "disconnected",
            IceConnectionState::Failed => "failed",
            IceConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

// ============================================================================
// PEER EVENTS
// ============================================================================

/// Events, die eine Verbindung asynchron auslöst
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Neuer lokaler Candidate; `None` markiert das Ende des Gatherings
    IceCandidate(Option<IceCandidate>),
    /// Ein Track eines Remote-Streams ist angekommen
    RemoteTrack {
        stream_id: String,
        track_id: String,
        kind: TrackKind,
    },
    IceConnectionState(IceConnectionState),
}

pub type PeerEvents = mpsc::UnboundedReceiver<PeerEvent>;

// ============================================================================
// TRAITS
// ============================================================================

/// Eine Echtzeit-Verbindung
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn name(&self) -> PeerName;

    async fn add_stream(&self, stream: &MediaStream) -> Result<(), PeerError>;

    async fn create_offer(&self, options: &OfferOptions) -> Result<SessionDescription, PeerError>;

    async fn create_answer(&self) -> Result<SessionDescription, PeerError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), PeerError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), PeerError>;

    async fn add_ice_candidate(&self, candidate: Option<IceCandidate>) -> Result<(), PeerError>;

    async fn close(&self) -> Result<(), PeerError>;
}

/// Erzeugt Verbindungen samt ihrem Event-Stream
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(&self, name: PeerName)
        -> Result<(Arc<dyn PeerConnection>, PeerEvents), PeerError>;
}
