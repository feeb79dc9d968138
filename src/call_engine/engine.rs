//! Call Orchestrator
//!
//! Verbindet die vier UI-Aktionen mit den Capture- und Verbindungs-Providern
//! und reicht Descriptors und Candidates zwischen pc1 und pc2 weiter.

use super::negotiation::{negotiate, Exchange};
use super::peer::{
    IceCandidate, PeerConnection, PeerConnectionFactory, PeerError, PeerEvent, PeerEvents,
    PeerName,
};
use super::session::Session;
use super::state::{CallEvent, CallState};
use crate::config::CallConfig;
use crate::media::{CaptureError, CaptureProvider, MediaConstraints, MediaStream, TrackKind};
use crate::ui::{Controls, VideoSlot};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallEngineError {
    #[error("Cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: CallState,
    },

    #[error("getUserMedia() error: {}", .0.name())]
    Capture(#[from] CaptureError),

    #[error("Peer connection error: {0}")]
    Peer(#[from] PeerError),

    #[error("No local stream captured")]
    NoLocalStream,

    #[error("Call was hung up while {0} was pending")]
    Superseded(&'static str),
}

// ============================================================================
// CALL ORCHESTRATOR
// ============================================================================

/// Steuert die beiden lokalen Verbindungen
pub struct CallOrchestrator {
    session: Arc<Mutex<Session>>,
    capture: Arc<dyn CaptureProvider>,
    factory: Arc<dyn PeerConnectionFactory>,
    config: CallConfig,
    event_tx: broadcast::Sender<CallEvent>,
    negotiations: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CallOrchestrator {
    /// Erstellt einen neuen Orchestrator im Zustand `Idle`
    pub fn new(
        config: CallConfig,
        capture: Arc<dyn CaptureProvider>,
        factory: Arc<dyn PeerConnectionFactory>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            session: Arc::new(Mutex::new(Session::new())),
            capture,
            factory,
            config,
            event_tx,
            negotiations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.event_tx.subscribe()
    }

    pub fn state(&self) -> CallState {
        self.session.lock().state
    }

    pub fn controls(&self) -> Controls {
        Controls::for_state(&self.state())
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    /// Lokaler Stream einer Verbindung (Klon teilt den Stop-Zustand)
    pub fn local_stream(&self, peer: PeerName) -> Option<MediaStream> {
        self.session.lock().stream(peer).cloned()
    }

    pub fn has_peer(&self, peer: PeerName) -> bool {
        self.session.lock().peer(peer).is_some()
    }

    /// Wartet, bis alle laufenden Descriptor-Austausche beendet sind
    pub async fn wait_for_negotiations(&self) {
        loop {
            let pending: Vec<_> = std::mem::take(&mut *self.negotiations.lock());
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                let _ = handle.await;
            }
        }
    }

    // ========================================================================
    // UI ACTIONS
    // ========================================================================

    /// "Start": fordert den Audio/Video Stream für pc1 an
    pub async fn start_capture(&self) -> Result<(), CallEngineError> {
        let epoch = {
            let mut session = self.session.lock();
            if session.state != CallState::Idle {
                return Err(CallEngineError::InvalidState {
                    action: "start capture",
                    state: session.state,
                });
            }
            session.state = CallState::Capturing { ready: false };
            session.epoch
        };
        self.publish_state();

        tracing::info!("Requesting pc1 local stream");
        let result = self
            .capture
            .get_user_media(&MediaConstraints::audio_video())
            .await;

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                let current = {
                    let mut session = self.session.lock();
                    let current = session.epoch == epoch;
                    if current {
                        session.state = CallState::Idle;
                    }
                    current
                };
                if !current {
                    tracing::debug!("pc1 capture failed after hangup: {}", e);
                    return Err(CallEngineError::Superseded("capture"));
                }

                tracing::error!("pc1 capture failed: {}", e);
                self.alert(format!("getUserMedia() error: {}", e.name()));
                self.publish_state();
                return Err(e.into());
            }
        };

        let info = stream.info();
        {
            let mut session = self.session.lock();
            if session.epoch != epoch {
                drop(session);
                tracing::warn!("Capture finished after hangup, releasing stream {}", info.id);
                stream.stop();
                return Err(CallEngineError::Superseded("capture"));
            }
            session.pc1_stream = Some(stream);
            session.state = CallState::Capturing { ready: true };
        }

        tracing::info!("Received pc1 local stream");
        self.emit(CallEvent::LocalStreamShown {
            slot: VideoSlot::Pc1Local,
            stream: info,
        });
        self.publish_state();
        Ok(())
    }

    /// "Call": erstellt pc1 und pc2 und startet Offer/Answer
    pub async fn start_call(&self) -> Result<(), CallEngineError> {
        let (stream, epoch) = {
            let mut session = self.session.lock();
            if session.state != (CallState::Capturing { ready: true }) {
                return Err(CallEngineError::InvalidState {
                    action: "start call",
                    state: session.state,
                });
            }
            let stream = session
                .pc1_stream
                .clone()
                .ok_or(CallEngineError::NoLocalStream)?;

            // Zustand sofort wechseln, damit ein zweiter Klick abgewiesen wird
            session.state = CallState::InCall {
                second_capture_requested: false,
            };
            session.call_started = Some(Instant::now());
            (stream, session.epoch)
        };
        self.publish_state();

        tracing::info!("Starting call");
        if let Some(track) = stream.video_tracks().next() {
            tracing::info!("Using video device: {}", track.label());
        }
        if let Some(track) = stream.audio_tracks().next() {
            tracing::info!("Using audio device: {}", track.label());
        }

        let (pc1, pc1_events) = match self.factory.create(PeerName::Pc1).await {
            Ok(created) => created,
            Err(e) => return Err(self.abort_call(epoch, Vec::new(), e).await),
        };
        tracing::info!("Created local peer connection object pc1");

        let (pc2, pc2_events) = match self.factory.create(PeerName::Pc2).await {
            Ok(created) => created,
            Err(e) => return Err(self.abort_call(epoch, vec![pc1], e).await),
        };
        tracing::info!("Created remote peer connection object pc2");

        let current = {
            let mut session = self.session.lock();
            let current = session.epoch == epoch;
            if current {
                session.pc1 = Some(Arc::clone(&pc1));
                session.pc2 = Some(Arc::clone(&pc2));
                let forwarders = [
                    self.spawn_forwarder(PeerName::Pc1, pc1_events, epoch),
                    self.spawn_forwarder(PeerName::Pc2, pc2_events, epoch),
                ];
                session.forwarders.extend(forwarders);
            }
            current
        };
        if !current {
            close_all(vec![pc1, pc2]).await;
            return Err(CallEngineError::Superseded("call setup"));
        }

        if let Err(e) = pc1.add_stream(&stream).await {
            tracing::error!("Failed to add local stream to pc1: {}", e);
            self.emit(CallEvent::Error {
                message: e.to_string(),
            });
            return Err(e.into());
        }
        tracing::info!("Added local stream to pc1");

        self.spawn_negotiation(pc1, pc2, Exchange::OfferAnswer, epoch);
        Ok(())
    }

    /// "pc2 Video": zweiter Capture, angehängt an pc2, Offer von pc2
    ///
    /// Für dieses Offer wird keine Answer erzeugt.
    pub async fn start_second_capture(&self) -> Result<(), CallEngineError> {
        let epoch = {
            let mut session = self.session.lock();
            if session.state
                != (CallState::InCall {
                    second_capture_requested: false,
                })
            {
                return Err(CallEngineError::InvalidState {
                    action: "start second capture",
                    state: session.state,
                });
            }
            session.state = CallState::InCall {
                second_capture_requested: true,
            };
            session.epoch
        };
        self.publish_state();

        tracing::info!("Requesting pc2 local stream");
        let stream = match self.capture.get_user_media(&self.config.second_capture).await {
            Ok(stream) => stream,
            Err(e) => {
                if self.session.lock().epoch != epoch {
                    tracing::debug!("pc2 capture failed after hangup: {}", e);
                    return Err(CallEngineError::Superseded("second capture"));
                }
                tracing::error!("pc2 capture failed: {}", e);
                self.alert(format!("getUserMedia() error: {}", e.name()));
                return Err(e.into());
            }
        };

        let info = stream.info();
        let (pc1, pc2) = {
            let mut session = self.session.lock();
            let peers = session.pc1.clone().zip(session.pc2.clone());
            match peers {
                Some(peers) if session.epoch == epoch => {
                    session.pc2_stream = Some(stream.clone());
                    peers
                }
                _ => {
                    drop(session);
                    tracing::warn!("Capture finished after hangup, releasing stream {}", info.id);
                    stream.stop();
                    return Err(CallEngineError::Superseded("second capture"));
                }
            }
        };

        tracing::info!("Received pc2 local stream");
        self.emit(CallEvent::LocalStreamShown {
            slot: VideoSlot::Pc2Local,
            stream: info,
        });

        if let Err(e) = pc2.add_stream(&stream).await {
            tracing::error!("Failed to add local stream to pc2: {}", e);
            self.emit(CallEvent::Error {
                message: e.to_string(),
            });
            return Err(e.into());
        }
        tracing::info!("Added local stream to pc2");

        self.spawn_negotiation(pc2, pc1, Exchange::OfferOnly, epoch);
        Ok(())
    }

    /// "Hangup": schließt beide Verbindungen und stoppt alle Tracks
    ///
    /// Ohne aktiven Anruf passiert nichts außer dem Zurücksetzen der Buttons.
    pub async fn hangup(&self) {
        let released = self.session.lock().release();
        self.publish_state();

        if released.is_empty() {
            tracing::debug!("Hangup without active call");
            return;
        }

        tracing::info!("Ending call");
        for slot in VideoSlot::ALL {
            self.emit(CallEvent::SlotCleared { slot });
        }

        for forwarder in released.forwarders {
            forwarder.abort();
        }
        close_all(released.peers).await;
        for stream in released.streams {
            stream.stop();
        }
    }

    // ========================================================================
    // PRIVATE METHODS
    // ========================================================================

    /// Rollback nach fehlgeschlagener Erstellung einer Verbindung
    async fn abort_call(
        &self,
        epoch: u64,
        created: Vec<Arc<dyn PeerConnection>>,
        error: PeerError,
    ) -> CallEngineError {
        tracing::error!("Failed to create peer connection: {}", error);
        close_all(created).await;

        let reverted = {
            let mut session = self.session.lock();
            let current = session.epoch == epoch;
            if current {
                session.state = CallState::Capturing { ready: true };
                session.call_started = None;
            }
            current
        };
        if reverted {
            self.publish_state();
        }

        self.emit(CallEvent::Error {
            message: error.to_string(),
        });
        error.into()
    }

    /// Startet den Austausch; das Ergebnis wird verworfen, wenn inzwischen
    /// aufgelegt wurde
    fn spawn_negotiation(
        &self,
        offerer: Arc<dyn PeerConnection>,
        answerer: Arc<dyn PeerConnection>,
        exchange: Exchange,
        epoch: u64,
    ) {
        let options = self.config.offer_options;
        let event_tx = self.event_tx.clone();
        let session = Arc::clone(&self.session);

        let handle = tokio::spawn(async move {
            let offerer_name = offerer.name();
            let result = negotiate(offerer, answerer, options, exchange).await;

            if session.lock().epoch != epoch {
                tracing::debug!(
                    "Discarding {} negotiation result after hangup: {:?}",
                    offerer_name,
                    result
                );
                return;
            }

            match result {
                Ok(()) => {
                    let _ = event_tx.send(CallEvent::Negotiated {
                        offerer: offerer_name,
                        answered: exchange == Exchange::OfferAnswer,
                    });
                }
                Err(e) => {
                    let _ = event_tx.send(CallEvent::Error {
                        message: format!("{} negotiation failed: {}", offerer_name, e),
                    });
                }
            }
        });
        let mut negotiations = self.negotiations.lock();
        negotiations.retain(|h| !h.is_finished());
        negotiations.push(handle);
    }

    /// Verarbeitet die Events einer Verbindung der Reihe nach
    fn spawn_forwarder(&self, name: PeerName, mut events: PeerEvents, epoch: u64) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    PeerEvent::IceCandidate(candidate) => {
                        forward_candidate(&session, &event_tx, name, epoch, candidate).await;
                    }
                    PeerEvent::RemoteTrack {
                        stream_id,
                        track_id,
                        kind,
                    } => {
                        tracing::debug!(
                            "{} remote {} track {} on stream {}",
                            name,
                            kind,
                            track_id,
                            stream_id
                        );
                        show_remote_stream(&session, &event_tx, name, epoch, stream_id, kind);
                    }
                    PeerEvent::IceConnectionState(state) => {
                        tracing::info!("{} ICE state: {}", name, state);
                        let _ = event_tx.send(CallEvent::IceStateChanged { peer: name, state });
                    }
                }
            }
            tracing::debug!("{} event stream closed", name);
        })
    }

    fn publish_state(&self) {
        let state = self.state();
        self.emit(CallEvent::StateChanged { state });
        self.emit(CallEvent::ControlsChanged {
            controls: Controls::for_state(&state),
        });
    }

    fn alert(&self, message: String) {
        self.emit(CallEvent::Alert { message });
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl std::fmt::Debug for CallOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOrchestrator")
            .field("state", &self.state())
            .field("controls", &self.controls())
            .finish()
    }
}

// ============================================================================
// EVENT HANDLING
// ============================================================================

/// Reicht einen Candidate an die andere Verbindung weiter
async fn forward_candidate(
    session: &Mutex<Session>,
    event_tx: &broadcast::Sender<CallEvent>,
    from: PeerName,
    epoch: u64,
    candidate: Option<IceCandidate>,
) {
    let other = {
        let session = session.lock();
        if session.epoch != epoch {
            return;
        }
        session.peer(from.other())
    };
    let Some(other) = other else {
        tracing::debug!("{} ICE candidate dropped, no peer to receive it", from);
        return;
    };

    tracing::info!(
        "{} ICE candidate: {}",
        from,
        candidate.as_ref().map_or("(null)", |c| c.candidate.as_str())
    );

    let added = match other.add_ice_candidate(candidate.clone()).await {
        Ok(()) => {
            tracing::info!("{} addIceCandidate success", from);
            true
        }
        Err(e) => {
            tracing::warn!("{} failed to add ICE Candidate: {}", from, e);
            false
        }
    };

    let _ = event_tx.send(CallEvent::IceCandidate {
        from,
        candidate,
        added,
    });
}

/// Zeigt einen Remote Stream beim ersten Track an
fn show_remote_stream(
    session: &Mutex<Session>,
    event_tx: &broadcast::Sender<CallEvent>,
    peer: PeerName,
    epoch: u64,
    stream_id: String,
    kind: TrackKind,
) {
    let (first, setup_time) = {
        let mut session = session.lock();
        if session.epoch != epoch {
            return;
        }
        let first = session.rendered.insert((peer, stream_id.clone()));
        let setup_time = if kind == TrackKind::Video {
            session.call_started.take().map(|started| started.elapsed())
        } else {
            None
        };
        (first, setup_time)
    };

    if first {
        tracing::info!("{} received remote stream", peer);
        let _ = event_tx.send(CallEvent::RemoteStreamShown {
            slot: VideoSlot::remote(peer),
            stream_id,
        });
    }

    if let Some(elapsed) = setup_time {
        let millis = elapsed.as_secs_f64() * 1000.0;
        tracing::info!("Setup time: {:.3}ms", millis);
        let _ = event_tx.send(CallEvent::SetupTime { millis });
    }
}

async fn close_all(peers: Vec<Arc<dyn PeerConnection>>) {
    for pc in peers {
        if let Err(e) = pc.close().await {
            tracing::warn!("Failed to close {}: {}", pc.name(), e);
        }
    }
}
