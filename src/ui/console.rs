//! Konsole - Befehle von stdin, Events auf stdout

use crate::call_engine::{CallEngineError, CallEvent, CallOrchestrator};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

pub const HELP: &str = "commands: start | call | pc2video | hangup | status | help | quit";

/// Ein getippter Befehl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Call,
    SecondVideo,
    Hangup,
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "call" => Ok(Command::Call),
            "pc2video" | "pc2 video" | "video" => Ok(Command::SecondVideo),
            "hangup" | "hang up" => Ok(Command::Hangup),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

/// Ausgabeformat der Events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    #[default]
    Text,
    /// Ein JSON-Objekt pro Zeile
    Json,
}

/// Formatiert ein Event für die Textausgabe
pub fn render(event: &CallEvent) -> String {
    match event {
        CallEvent::StateChanged { state } => format!("state: {}", state),
        CallEvent::ControlsChanged { controls } => format!("controls: {}", controls),
        CallEvent::LocalStreamShown { slot, stream } => {
            let labels: Vec<_> = stream.tracks.iter().map(|t| t.label.as_str()).collect();
            format!("{}: stream {} ({})", slot, stream.id, labels.join(", "))
        }
        CallEvent::RemoteStreamShown { slot, stream_id } => {
            format!("{}: stream {}", slot, stream_id)
        }
        CallEvent::SlotCleared { slot } => format!("{}: cleared", slot),
        CallEvent::Alert { message } => format!("ALERT: {}", message),
        CallEvent::IceCandidate {
            from,
            candidate,
            added,
        } => {
            let text = candidate
                .as_ref()
                .map_or("(null)", |c| c.candidate.as_str());
            let result = if *added { "added" } else { "rejected" };
            format!("{} candidate {}: {}", from, result, text)
        }
        CallEvent::IceStateChanged { peer, state } => format!("{} ICE state: {}", peer, state),
        CallEvent::Negotiated { offerer, answered } => {
            if *answered {
                format!("{} offer answered", offerer)
            } else {
                format!("{} offer applied without answer", offerer)
            }
        }
        CallEvent::SetupTime { millis } => format!("Setup time: {:.3}ms", millis),
        CallEvent::Error { message } => format!("error: {}", message),
    }
}

fn format_event(event: &CallEvent, output: Output) -> anyhow::Result<String> {
    Ok(match output {
        Output::Text => render(event),
        Output::Json => serde_json::to_string(event)?,
    })
}

/// Liest Befehle bis `quit` oder EOF und legt danach auf
pub async fn run_console(orchestrator: Arc<CallOrchestrator>, output: Output) -> anyhow::Result<()> {
    let printer = spawn_printer(orchestrator.subscribe(), output);

    println!("{}", HELP);
    println!("controls: {}", orchestrator.controls());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}. {}", e, HELP);
                continue;
            }
        };
        tracing::debug!("Console command: {:?}", command);

        match command {
            Command::Start => spawn_action(&orchestrator, command),
            Command::Call => spawn_action(&orchestrator, command),
            Command::SecondVideo => spawn_action(&orchestrator, command),
            Command::Hangup => orchestrator.hangup().await,
            Command::Status => {
                println!("state: {}", orchestrator.state());
                println!("controls: {}", orchestrator.controls());
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => break,
        }
    }

    orchestrator.hangup().await;
    orchestrator.wait_for_negotiations().await;
    printer.abort();
    Ok(())
}

/// Aktionen laufen im Hintergrund, damit die Konsole bedienbar bleibt
fn spawn_action(orchestrator: &Arc<CallOrchestrator>, command: Command) {
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        let result = match command {
            Command::Start => orchestrator.start_capture().await,
            Command::Call => orchestrator.start_call().await,
            Command::SecondVideo => orchestrator.start_second_capture().await,
            _ => Ok(()),
        };

        match result {
            Ok(()) => {}
            Err(e @ CallEngineError::InvalidState { .. }) => println!("{}", e),
            Err(e) => tracing::debug!("{:?} finished with error: {}", command, e),
        }
    });
}

fn spawn_printer(
    mut events: broadcast::Receiver<CallEvent>,
    output: Output,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match format_event(&event, output) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!("Failed to format event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Console lagged behind, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_engine::{CallState, IceCandidate, PeerName};
    use crate::ui::{Controls, VideoSlot};

    #[test]
    fn test_parse_commands() {
        assert_eq!("start".parse::<Command>(), Ok(Command::Start));
        assert_eq!(" Call ".parse::<Command>(), Ok(Command::Call));
        assert_eq!("pc2video".parse::<Command>(), Ok(Command::SecondVideo));
        assert_eq!("HANGUP".parse::<Command>(), Ok(Command::Hangup));
        assert_eq!("q".parse::<Command>(), Ok(Command::Quit));
        assert_eq!(
            "dial".parse::<Command>(),
            Err(UnknownCommand("dial".to_string()))
        );
    }

    #[test]
    fn test_render_text() {
        let controls = CallEvent::ControlsChanged {
            controls: Controls::for_state(&CallState::Idle),
        };
        assert_eq!(
            render(&controls),
            "controls: [+start] [-call] [-pc2video] [-hangup]"
        );

        let end = CallEvent::IceCandidate {
            from: PeerName::Pc2,
            candidate: None,
            added: true,
        };
        assert_eq!(render(&end), "pc2 candidate added: (null)");

        let bad = CallEvent::IceCandidate {
            from: PeerName::Pc1,
            candidate: Some(IceCandidate::new("garbage")),
            added: false,
        };
        assert_eq!(render(&bad), "pc1 candidate rejected: garbage");

        let cleared = CallEvent::SlotCleared {
            slot: VideoSlot::Pc2Remote,
        };
        assert_eq!(render(&cleared), "pc2-remote: cleared");
    }

    #[test]
    fn test_render_json() {
        let alert = CallEvent::Alert {
            message: "getUserMedia() error: NotFoundError".into(),
        };
        let line = format_event(&alert, Output::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "alert");
        assert_eq!(value["message"], "getUserMedia() error: NotFoundError");
    }
}
