//! webrtc-rs Peer Connections
//!
//! Implementiert die Peer Connection Schnittstelle auf `RTCPeerConnection`.
//! Die Callbacks von webrtc-rs werden in einen Event-Kanal pro Verbindung
//! übersetzt.

use super::peer::{
    IceCandidate, IceConnectionState, OfferOptions, PeerConnection, PeerConnectionFactory,
    PeerError, PeerEvent, PeerEvents, PeerName, SdpKind, SessionDescription,
};
use crate::media::{MediaStream, TrackKind};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

fn webrtc_err(e: webrtc::Error) -> PeerError {
    PeerError::WebRtc(e.to_string())
}

// ============================================================================
// CONVERSIONS
// ============================================================================

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription, PeerError> {
    let parsed = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
    };
    parsed.map_err(|e| PeerError::InvalidSdp(e.to_string()))
}

fn from_rtc_description(desc: RTCSessionDescription) -> Result<SessionDescription, PeerError> {
    match desc.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(desc.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(desc.sdp)),
        other => Err(PeerError::InvalidSdp(format!(
            "unexpected description type {}",
            other
        ))),
    }
}

impl From<RTCIceCandidateInit> for IceCandidate {
    fn from(init: RTCIceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
            username_fragment: init.username_fragment,
        }
    }
}

impl From<IceCandidate> for RTCIceCandidateInit {
    fn from(candidate: IceCandidate) -> Self {
        Self {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        }
    }
}

fn ice_state(state: RTCIceConnectionState) -> Option<IceConnectionState> {
    match state {
        RTCIceConnectionState::New => Some(IceConnectionState::New),
        RTCIceConnectionState::Checking => Some(IceConnectionState::Checking),
        RTCIceConnectionState::Connected => Some(IceConnectionState::Connected),
        RTCIceConnectionState::Completed => Some(IceConnectionState::Completed),
        RTCIceConnectionState::Disconnected => Some(IceConnectionState::Disconnected),
        RTCIceConnectionState::Failed => Some(IceConnectionState::Failed),
        RTCIceConnectionState::Closed => Some(IceConnectionState::Closed),
        _ => None,
    }
}

fn track_kind(kind: RTPCodecType) -> Option<TrackKind> {
    match kind {
        RTPCodecType::Audio => Some(TrackKind::Audio),
        RTPCodecType::Video => Some(TrackKind::Video),
        _ => None,
    }
}

// ============================================================================
// FACTORY
// ============================================================================

/// Erzeugt webrtc-rs Peer Connections mit gemeinsamer API-Instanz
pub struct WebRtcPeerFactory {
    api: API,
    config: RTCConfiguration,
}

impl WebRtcPeerFactory {
    /// `ice_servers` leer bedeutet: nur Host-Candidates
    pub fn new(ice_servers: &[String]) -> Result<Self, PeerError> {
        // Media Engine mit Standard-Codecs (Opus, VP8, ...)
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs().map_err(webrtc_err)?;

        // Interceptors für RTCP, NACK etc.
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(webrtc_err)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: ice_servers.to_vec(),
                ..Default::default()
            }]
        };

        Ok(Self {
            api,
            config: RTCConfiguration {
                ice_servers,
                ..Default::default()
            },
        })
    }
}

#[async_trait]
impl PeerConnectionFactory for WebRtcPeerFactory {
    async fn create(
        &self,
        name: PeerName,
    ) -> Result<(Arc<dyn PeerConnection>, PeerEvents), PeerError> {
        let pc = Arc::new(
            self.api
                .new_peer_connection(self.config.clone())
                .await
                .map_err(webrtc_err)?,
        );

        let (peer, events) = WebRtcPeer::attach(name, pc);
        Ok((Arc::new(peer) as Arc<dyn PeerConnection>, events))
    }
}

// ============================================================================
// PEER
// ============================================================================

pub struct WebRtcPeer {
    name: PeerName,
    pc: Arc<RTCPeerConnection>,
}

impl WebRtcPeer {
    /// Registriert die Event Handler und liefert den Event-Stream
    pub fn attach(name: PeerName, pc: Arc<RTCPeerConnection>) -> (Self, PeerEvents) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        // ICE Candidate Handler
        let tx = event_tx.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let event = match candidate {
                Some(c) => match c.to_json() {
                    Ok(init) => Some(PeerEvent::IceCandidate(Some(init.into()))),
                    Err(e) => {
                        tracing::warn!("{} could not serialize ICE candidate: {}", name, e);
                        None
                    }
                },
                None => Some(PeerEvent::IceCandidate(None)),
            };
            if let Some(event) = event {
                let _ = tx.send(event);
            }
            Box::pin(async {})
        }));

        // Track Handler (Remote Streams)
        let tx = event_tx.clone();
        pc.on_track(Box::new(move |track, _, _| {
            if let Some(kind) = track_kind(track.kind()) {
                let _ = tx.send(PeerEvent::RemoteTrack {
                    stream_id: track.stream_id().to_string(),
                    track_id: track.id().to_string(),
                    kind,
                });
            }
            drain_remote_track(name, track);
            Box::pin(async {})
        }));

        // ICE Connection State Handler
        let tx = event_tx;
        pc.on_ice_connection_state_change(Box::new(move |s: RTCIceConnectionState| {
            if let Some(state) = ice_state(s) {
                let _ = tx.send(PeerEvent::IceConnectionState(state));
            }
            Box::pin(async {})
        }));

        pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
            tracing::debug!("{} peer connection state: {}", name, s);
            Box::pin(async {})
        }));

        (Self { name, pc }, event_rx)
    }

    /// Fügt einen recvonly Transceiver hinzu, falls für `kind` noch keiner existiert
    async fn ensure_receiver(&self, kind: RTPCodecType) -> Result<(), PeerError> {
        let transceivers = self.pc.get_transceivers().await;
        if transceivers.iter().any(|t| t.kind() == kind) {
            return Ok(());
        }

        self.pc
            .add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(webrtc_err)?;
        Ok(())
    }
}

/// Liest eingehende RTP-Pakete eines Remote Tracks, bis der Track endet
fn drain_remote_track(name: PeerName, track: Arc<TrackRemote>) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];
        let mut packets = 0u64;
        while track.read(&mut buf).await.is_ok() {
            packets += 1;
            if packets == 1 {
                tracing::debug!("{} first RTP packet on remote {} track", name, track.kind());
            }
        }
        tracing::debug!("{} remote track ended after {} packets", name, packets);
    });
}

#[async_trait]
impl PeerConnection for WebRtcPeer {
    fn name(&self) -> PeerName {
        self.name
    }

    async fn add_stream(&self, stream: &MediaStream) -> Result<(), PeerError> {
        for track in stream.tracks() {
            let sender = self
                .pc
                .add_track(track.local_track())
                .await
                .map_err(webrtc_err)?;

            // RTCP lesen, damit die Interceptors arbeiten können
            tokio::spawn(async move {
                let mut rtcp_buf = vec![0u8; 1500];
                while let Ok((_, _)) = sender.read(&mut rtcp_buf).await {}
            });
        }
        Ok(())
    }

    async fn create_offer(&self, options: &OfferOptions) -> Result<SessionDescription, PeerError> {
        if options.offer_to_receive_audio {
            self.ensure_receiver(RTPCodecType::Audio).await?;
        }
        if options.offer_to_receive_video {
            self.ensure_receiver(RTPCodecType::Video).await?;
        }

        let offer = self.pc.create_offer(None).await.map_err(webrtc_err)?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        let answer = self.pc.create_answer(None).await.map_err(webrtc_err)?;
        from_rtc_description(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), PeerError> {
        self.pc
            .set_local_description(to_rtc_description(desc)?)
            .await
            .map_err(webrtc_err)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), PeerError> {
        self.pc
            .set_remote_description(to_rtc_description(desc)?)
            .await
            .map_err(webrtc_err)
    }

    async fn add_ice_candidate(&self, candidate: Option<IceCandidate>) -> Result<(), PeerError> {
        // Leerer Candidate signalisiert das Ende der Candidates
        let init = candidate.map(RTCIceCandidateInit::from).unwrap_or_default();
        self.pc.add_ice_candidate(init).await.map_err(webrtc_err)
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.pc.close().await.map_err(webrtc_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_conversion_keeps_fields() {
        let candidate = IceCandidate {
            candidate: "candidate:1 1 udp 2130706431 192.168.1.2 50000 typ host".into(),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: Some("abcd".into()),
        };

        let init = RTCIceCandidateInit::from(candidate.clone());
        assert_eq!(init.sdp_mid.as_deref(), Some("0"));
        assert_eq!(IceCandidate::from(init), candidate);
    }

    #[test]
    fn test_ice_state_mapping() {
        assert_eq!(
            ice_state(RTCIceConnectionState::Connected),
            Some(IceConnectionState::Connected)
        );
        assert_eq!(
            ice_state(RTCIceConnectionState::Failed),
            Some(IceConnectionState::Failed)
        );
        assert_eq!(ice_state(RTCIceConnectionState::Unspecified), None);
    }

    #[test]
    fn test_invalid_sdp_is_rejected() {
        let err = to_rtc_description(SessionDescription::offer("not sdp")).unwrap_err();
        assert!(matches!(err, PeerError::InvalidSdp(_)));
    }

    #[tokio::test]
    async fn test_offer_carries_receive_sections() {
        let factory = WebRtcPeerFactory::new(&[]).unwrap();
        let (pc1, _events) = factory.create(PeerName::Pc1).await.unwrap();

        let offer = pc1.create_offer(&OfferOptions::default()).await.unwrap();
        assert_eq!(offer.kind, SdpKind::Offer);
        assert!(offer.sdp.contains("m=audio"));
        assert!(offer.sdp.contains("m=video"));

        pc1.close().await.unwrap();
    }
}
