//! Loopback Call - zwei lokale Peer Connections in einem Prozess
//!
//! Eine Audio/Video-Verbindung zwischen pc1 und pc2 mit:
//! - webrtc-rs für Offer/Answer, ICE und RTP
//! - synthetischen Capture-Geräten (optional Host-Mikrofone via cpal)
//! - einer Konsole mit den Buttons Start, Call, pc2 Video und Hangup

pub mod call_engine;
pub mod config;
pub mod logging;
pub mod media;
pub mod ui;

use call_engine::{CallOrchestrator, WebRtcPeerFactory};
use config::CallConfig;
use media::SyntheticCapture;
use std::sync::Arc;
use std::time::Duration;
use ui::console::{run_console, Output};
use ui::demo::run_demo;

// ============================================================================
// RUN MODES
// ============================================================================

/// Wie die Anwendung bedient wird
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Befehle von stdin
    Console { output: Output },
    /// Automatischer Durchlauf ohne Eingaben
    Demo {
        timeout: Duration,
        second_video: bool,
    },
}

/// Baut den Orchestrator mit webrtc-rs und synthetischen Geräten
pub fn build_orchestrator(config: CallConfig) -> anyhow::Result<Arc<CallOrchestrator>> {
    let factory = WebRtcPeerFactory::new(&config.ice_servers)?;
    let capture = SyntheticCapture::from_config(&config);

    tracing::info!(
        "Initializing loopback call ({} ICE servers)",
        config.ice_servers.len()
    );

    Ok(Arc::new(CallOrchestrator::new(
        config,
        Arc::new(capture),
        Arc::new(factory),
    )))
}

pub async fn run(config: CallConfig, mode: RunMode) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config)?;

    match mode {
        RunMode::Console { output } => run_console(orchestrator, output).await,
        RunMode::Demo {
            timeout,
            second_video,
        } => {
            let report = run_demo(&orchestrator, timeout, second_video).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
