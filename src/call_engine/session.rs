//! Session - besitzt beide Verbindungen und beide Streams

use super::peer::{PeerConnection, PeerName};
use super::state::CallState;
use crate::media::MediaStream;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Alles, was zu einem Anruf gehört
///
/// `epoch` wird bei jedem Auflegen erhöht. Asynchrone Vorgänge merken sich
/// die Epoche beim Start und verwerfen ihr Ergebnis, wenn sie sich geändert hat.
pub(crate) struct Session {
    pub state: CallState,
    pub epoch: u64,
    pub pc1: Option<Arc<dyn PeerConnection>>,
    pub pc2: Option<Arc<dyn PeerConnection>>,
    pub pc1_stream: Option<MediaStream>,
    pub pc2_stream: Option<MediaStream>,
    /// Start des Anrufs, bis das erste Remote Video ankommt
    pub call_started: Option<Instant>,
    /// Bereits angezeigte Remote Streams pro Verbindung
    pub rendered: HashSet<(PeerName, String)>,
    pub forwarders: Vec<JoinHandle<()>>,
}

/// Ressourcen, die beim Auflegen freigegeben werden
pub(crate) struct Released {
    pub peers: Vec<Arc<dyn PeerConnection>>,
    pub streams: Vec<MediaStream>,
    pub forwarders: Vec<JoinHandle<()>>,
}

impl Released {
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty() && self.streams.is_empty() && self.forwarders.is_empty()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: CallState::Idle,
            epoch: 0,
            pc1: None,
            pc2: None,
            pc1_stream: None,
            pc2_stream: None,
            call_started: None,
            rendered: HashSet::new(),
            forwarders: Vec::new(),
        }
    }

    pub fn peer(&self, name: PeerName) -> Option<Arc<dyn PeerConnection>> {
        match name {
            PeerName::Pc1 => self.pc1.clone(),
            PeerName::Pc2 => self.pc2.clone(),
        }
    }

    pub fn stream(&self, name: PeerName) -> Option<&MediaStream> {
        match name {
            PeerName::Pc1 => self.pc1_stream.as_ref(),
            PeerName::Pc2 => self.pc2_stream.as_ref(),
        }
    }

    /// Nimmt alle Ressourcen heraus und setzt die Session auf `Idle` zurück
    pub fn release(&mut self) -> Released {
        self.epoch += 1;
        self.state = CallState::Idle;
        self.call_started = None;
        self.rendered.clear();

        Released {
            peers: self.pc1.take().into_iter().chain(self.pc2.take()).collect(),
            streams: self
                .pc1_stream
                .take()
                .into_iter()
                .chain(self.pc2_stream.take())
                .collect(),
            forwarders: std::mem::take(&mut self.forwarders),
        }
    }
}
