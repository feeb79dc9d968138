//! Test-Hilfen: aufzeichnende Peer Connections und Event-Warten

use super::peer::{
    IceCandidate, OfferOptions, PeerConnection, PeerConnectionFactory, PeerError, PeerEvent,
    PeerEvents, PeerName, SessionDescription,
};
use super::state::CallEvent;
use crate::media::{CaptureError, CaptureProvider, MediaConstraints, MediaStream, SyntheticCapture};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Semaphore};

pub const WAIT: Duration = Duration::from_secs(5);

/// Aufgezeichneter Aufruf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    AddStream(String),
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(Option<IceCandidate>),
    Close,
}

/// Schritt, der fehlschlagen soll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Create,
    AddStream,
    CreateOffer,
    CreateAnswer,
    SetLocal,
    SetRemote,
}

#[derive(Default)]
struct Shared {
    journal: Mutex<Vec<(PeerName, Op)>>,
    senders: Mutex<HashMap<PeerName, mpsc::UnboundedSender<PeerEvent>>>,
    failures: Mutex<HashSet<(PeerName, Step)>>,
    gates: Mutex<HashMap<(PeerName, Step), Arc<Semaphore>>>,
    offers: AtomicUsize,
    answers: AtomicUsize,
    created: AtomicUsize,
}

impl Shared {
    fn record(&self, peer: PeerName, op: Op) {
        self.journal.lock().push((peer, op));
    }

    fn check(&self, peer: PeerName, step: Step) -> Result<(), PeerError> {
        if self.failures.lock().contains(&(peer, step)) {
            return Err(PeerError::WebRtc(format!("{:?} failed on {}", step, peer)));
        }
        Ok(())
    }

    /// Blockiert, bis der Test den Schritt freigibt
    async fn pass_gate(&self, peer: PeerName, step: Step) {
        let gate = self.gates.lock().get(&(peer, step)).cloned();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

/// Factory für aufzeichnende Verbindungen
///
/// Offers heißen "O1", "O2", ..., Answers "A1", "A2", ...
/// Candidates, die "bad" enthalten, werden abgelehnt.
#[derive(Clone, Default)]
pub struct MockPeerFactory {
    shared: Arc<Shared>,
}

impl MockPeerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, peer: PeerName, step: Step) {
        self.shared.failures.lock().insert((peer, step));
    }

    /// Hält `step` auf `peer` an; jede Freigabe lässt einen Aufruf durch
    pub fn gate(&self, peer: PeerName, step: Step) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.shared.gates.lock().insert((peer, step), Arc::clone(&gate));
        gate
    }

    pub fn created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    pub fn journal(&self) -> Vec<(PeerName, Op)> {
        self.shared.journal.lock().clone()
    }

    pub fn ops(&self, peer: PeerName) -> Vec<Op> {
        self.journal()
            .into_iter()
            .filter(|(name, _)| *name == peer)
            .map(|(_, op)| op)
            .collect()
    }

    /// Löst ein Event auf einer Verbindung aus
    pub fn emit(&self, from: PeerName, event: PeerEvent) -> bool {
        self.shared
            .senders
            .lock()
            .get(&from)
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false)
    }
}

#[async_trait]
impl PeerConnectionFactory for MockPeerFactory {
    async fn create(
        &self,
        name: PeerName,
    ) -> Result<(Arc<dyn PeerConnection>, PeerEvents), PeerError> {
        self.shared.pass_gate(name, Step::Create).await;
        self.shared.check(name, Step::Create)?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.senders.lock().insert(name, tx);
        self.shared.created.fetch_add(1, Ordering::SeqCst);

        let peer = MockPeer {
            name,
            shared: Arc::clone(&self.shared),
        };
        Ok((Arc::new(peer), rx))
    }
}

struct MockPeer {
    name: PeerName,
    shared: Arc<Shared>,
}

#[async_trait]
impl PeerConnection for MockPeer {
    fn name(&self) -> PeerName {
        self.name
    }

    async fn add_stream(&self, stream: &MediaStream) -> Result<(), PeerError> {
        self.shared.check(self.name, Step::AddStream)?;
        self.shared
            .record(self.name, Op::AddStream(stream.id().to_string()));
        Ok(())
    }

    async fn create_offer(&self, _options: &OfferOptions) -> Result<SessionDescription, PeerError> {
        self.shared.record(self.name, Op::CreateOffer);
        self.shared.check(self.name, Step::CreateOffer)?;
        let n = self.shared.offers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription::offer(format!("O{}", n)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        self.shared.record(self.name, Op::CreateAnswer);
        self.shared.pass_gate(self.name, Step::CreateAnswer).await;
        self.shared.check(self.name, Step::CreateAnswer)?;
        let n = self.shared.answers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionDescription::answer(format!("A{}", n)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), PeerError> {
        self.shared.record(self.name, Op::SetLocal(desc));
        self.shared.check(self.name, Step::SetLocal)
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), PeerError> {
        self.shared.record(self.name, Op::SetRemote(desc));
        self.shared.check(self.name, Step::SetRemote)
    }

    async fn add_ice_candidate(&self, candidate: Option<IceCandidate>) -> Result<(), PeerError> {
        let bad = candidate
            .as_ref()
            .is_some_and(|c| c.candidate.contains("bad"));
        self.shared.record(self.name, Op::AddCandidate(candidate));
        if bad {
            return Err(PeerError::WebRtc("invalid candidate".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.shared.record(self.name, Op::Close);
        Ok(())
    }
}

/// Capture, der erst nach `release()` antwortet
pub struct GatedCapture {
    pub inner: SyntheticCapture,
    gate: Semaphore,
    captured: Mutex<Vec<MediaStream>>,
}

impl GatedCapture {
    pub fn new() -> Self {
        Self {
            inner: SyntheticCapture::new(),
            gate: Semaphore::new(0),
            captured: Mutex::new(Vec::new()),
        }
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    /// Alle ausgelieferten Streams (Klone teilen den Stop-Zustand)
    pub fn captured(&self) -> Vec<MediaStream> {
        self.captured.lock().clone()
    }
}

#[async_trait]
impl CaptureProvider for GatedCapture {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, CaptureError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| CaptureError::Aborted("gate closed".into()))?;
        permit.forget();
        let stream = self.inner.get_user_media(constraints).await?;
        self.captured.lock().push(stream.clone());
        Ok(stream)
    }
}

/// Wartet auf das erste Event, das `matches` erfüllt
pub async fn wait_for<F>(rx: &mut broadcast::Receiver<CallEvent>, mut matches: F) -> CallEvent
where
    F: FnMut(&CallEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Sammelt Events bis einschließlich des ersten, das `matches` erfüllt
pub async fn collect_until<F>(
    rx: &mut broadcast::Receiver<CallEvent>,
    mut matches: F,
) -> Vec<CallEvent>
where
    F: FnMut(&CallEvent) -> bool,
{
    let mut seen = Vec::new();
    wait_for(rx, |event| {
        seen.push(event.clone());
        matches(event)
    })
    .await;
    seen
}

/// Wartet, bis `condition` erfüllt ist
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("timed out waiting for condition")
}

/// Alle bereits gepufferten Events
pub fn drain(rx: &mut broadcast::Receiver<CallEvent>) -> Vec<CallEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
