//! Logging Setup

use tracing_subscriber::EnvFilter;

/// Standard-Filter, wenn `RUST_LOG` nicht gesetzt ist
pub const DEFAULT_DIRECTIVES: &str = "loopback_call=info,webrtc=warn";

/// Wie `DEFAULT_DIRECTIVES`, aber mit Debug-Ausgaben dieses Crates
pub const DEBUG_DIRECTIVES: &str = "loopback_call=debug,webrtc=warn";

/// Initialisiert den tracing Subscriber
///
/// Ein zweiter Aufruf ist wirkungslos.
pub fn init(debug: bool) {
    let defaults = if debug { DEBUG_DIRECTIVES } else { DEFAULT_DIRECTIVES };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(defaults));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Logging already initialized");
    }
}
