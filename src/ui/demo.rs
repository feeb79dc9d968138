//! Automatischer Durchlauf: Start, Call, warten auf ICE, Hangup

use crate::call_engine::{CallEvent, CallOrchestrator, IceConnectionState, PeerName};
use anyhow::{bail, Context};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::broadcast;

/// Ergebnis eines Durchlaufs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoReport {
    /// Beide Verbindungen haben `connected` oder `completed` erreicht
    pub connected: bool,
    pub setup_time_ms: Option<f64>,
    pub remote_streams: usize,
    pub candidates_added: usize,
    pub candidates_rejected: usize,
    /// Alle lokalen Tracks wurden beim Hangup gestoppt
    pub tracks_stopped: bool,
}

/// Führt Start → Call → (pc2 Video) → Hangup aus
pub async fn run_demo(
    orchestrator: &CallOrchestrator,
    timeout: Duration,
    second_video: bool,
) -> anyhow::Result<DemoReport> {
    let mut events = orchestrator.subscribe();
    let mut report = DemoReport::default();

    orchestrator
        .start_capture()
        .await
        .context("Failed to capture pc1 stream")?;
    orchestrator.start_call().await.context("Failed to start call")?;

    let waited = tokio::time::timeout(timeout, watch_call(&mut events, &mut report)).await;
    match waited {
        Ok(Ok(())) => report.connected = true,
        Ok(Err(e)) => {
            orchestrator.hangup().await;
            return Err(e);
        }
        Err(_) => tracing::warn!("ICE did not connect within {:?}", timeout),
    }

    if second_video && report.connected {
        orchestrator
            .start_second_capture()
            .await
            .context("Failed to capture pc2 stream")?;
        orchestrator.wait_for_negotiations().await;
    }

    let streams: Vec<_> = [PeerName::Pc1, PeerName::Pc2]
        .into_iter()
        .filter_map(|peer| orchestrator.local_stream(peer))
        .collect();

    orchestrator.hangup().await;
    orchestrator.wait_for_negotiations().await;

    report.tracks_stopped = streams.iter().all(|s| s.all_stopped());
    if !report.tracks_stopped {
        bail!("Local tracks still live after hangup");
    }

    tracing::info!(
        "Demo finished: connected={}, setup time={:?}ms",
        report.connected,
        report.setup_time_ms
    );
    Ok(report)
}

/// Sammelt Events, bis beide Verbindungen verbunden sind
async fn watch_call(
    events: &mut broadcast::Receiver<CallEvent>,
    report: &mut DemoReport,
) -> anyhow::Result<()> {
    let mut connected = HashSet::new();

    while connected.len() < 2 {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => bail!("Event channel closed"),
        };

        match event {
            CallEvent::IceStateChanged { peer, state } => match state {
                IceConnectionState::Connected | IceConnectionState::Completed => {
                    connected.insert(peer);
                }
                IceConnectionState::Failed => bail!("{} ICE connection failed", peer),
                _ => {}
            },
            CallEvent::IceCandidate { added: true, .. } => report.candidates_added += 1,
            CallEvent::IceCandidate { added: false, .. } => report.candidates_rejected += 1,
            CallEvent::RemoteStreamShown { .. } => report.remote_streams += 1,
            CallEvent::SetupTime { millis } => report.setup_time_ms = Some(millis),
            CallEvent::Error { message } => bail!("Negotiation failed: {}", message),
            _ => {}
        }
    }

    Ok(())
}
