use clap::Parser;
use loopback_call::config::{parse_list, CallConfig};
use loopback_call::media::MediaConstraints;
use loopback_call::ui::console::Output;
use loopback_call::{logging, run, RunMode};
use std::time::Duration;

/// Two local WebRTC peer connections negotiating an audio/video call
#[derive(Parser, Debug)]
#[command(name = "loopback-call", version, about)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    debug: bool,

    /// STUN/TURN server URL, may be repeated or comma-separated
    #[arg(long = "ice-server", value_name = "URL")]
    ice_servers: Vec<String>,

    /// Preferred microphone for the pc2 capture
    #[arg(long, value_name = "DEVICE_ID")]
    pc2_audio_device: Option<String>,

    /// Preferred camera for the pc2 capture
    #[arg(long, value_name = "DEVICE_ID")]
    pc2_video_device: Option<String>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Run start, call and hangup without reading commands
    #[arg(long)]
    demo: bool,

    /// Also run the pc2 video step in demo mode
    #[arg(long, requires = "demo")]
    pc2_video: bool,

    /// Seconds to wait for ICE in demo mode
    #[arg(long, default_value_t = 10, value_name = "SECS")]
    timeout: u64,
}

impl Cli {
    fn config(&self) -> CallConfig {
        let mut config = CallConfig::from_env();

        let servers: Vec<String> = self.ice_servers.iter().flat_map(|s| parse_list(s)).collect();
        if !servers.is_empty() {
            config.ice_servers = servers;
        }

        if self.pc2_audio_device.is_some() || self.pc2_video_device.is_some() {
            let current = &config.second_capture;
            let audio = self
                .pc2_audio_device
                .clone()
                .or_else(|| current.audio.as_ref().and_then(|s| s.device_id()).map(str::to_string))
                .unwrap_or_default();
            let video = self
                .pc2_video_device
                .clone()
                .or_else(|| current.video.as_ref().and_then(|s| s.device_id()).map(str::to_string))
                .unwrap_or_default();
            config.second_capture = MediaConstraints::with_devices(audio, video);
        }

        config
    }

    fn mode(&self) -> RunMode {
        if self.demo {
            RunMode::Demo {
                timeout: Duration::from_secs(self.timeout),
                second_video: self.pc2_video,
            }
        } else {
            RunMode::Console {
                output: if self.json { Output::Json } else { Output::Text },
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    run(cli.config(), cli.mode()).await
}
