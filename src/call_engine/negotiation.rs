//! Offer/Answer Austausch zwischen zwei lokalen Verbindungen
//!
//! Ablauf mit Answer:
//!
//! ```text
//! offer = offerer.create_offer()
//!   ├─ offerer.set_local(offer)
//!   └─ answerer.set_remote(offer)
//!        └─ answer = answerer.create_answer()
//!             ├─ answerer.set_local(answer)
//!             └─ offerer.set_remote(answer)
//! ```
//!
//! Zweige auf derselben Ebene laufen parallel.

use super::peer::{OfferOptions, PeerConnection, PeerError, SessionDescription};
use std::sync::Arc;

/// Umfang eines Austauschs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    /// Offer und Answer
    OfferAnswer,
    /// Nur das Offer wird beiden Seiten gesetzt
    OfferOnly,
}

/// Führt den Austausch aus
///
/// Jeder fehlgeschlagene Schritt wird geloggt. Es gibt keine Wiederholung;
/// der erste Fehler wird zurückgegeben.
pub(crate) async fn negotiate(
    offerer: Arc<dyn PeerConnection>,
    answerer: Arc<dyn PeerConnection>,
    options: OfferOptions,
    exchange: Exchange,
) -> Result<(), PeerError> {
    tracing::info!("{} createOffer start", offerer.name());
    let offer = offerer.create_offer(&options).await.map_err(|e| {
        tracing::error!("Failed to create session description: {}", e);
        e
    })?;
    tracing::info!("Offer from {}:\n{}", offerer.name(), offer.sdp);

    let local = set_local(offerer.as_ref(), offer.clone());
    let remote = async {
        set_remote(answerer.as_ref(), offer).await?;
        if exchange == Exchange::OfferOnly {
            return Ok(());
        }

        tracing::info!("{} createAnswer start", answerer.name());
        let answer = answerer.create_answer().await.map_err(|e| {
            tracing::error!("Failed to create session description: {}", e);
            e
        })?;
        tracing::info!("Answer from {}:\n{}", answerer.name(), answer.sdp);

        let (local, remote) = futures::join!(
            set_local(answerer.as_ref(), answer.clone()),
            set_remote(offerer.as_ref(), answer)
        );
        local.and(remote)
    };

    let (local, remote) = futures::join!(local, remote);
    local.and(remote)
}

async fn set_local(pc: &dyn PeerConnection, desc: SessionDescription) -> Result<(), PeerError> {
    tracing::info!("{} setLocalDescription start", pc.name());
    match pc.set_local_description(desc).await {
        Ok(()) => {
            tracing::info!("{} setLocalDescription complete", pc.name());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to set session description: {}", e);
            Err(e)
        }
    }
}

async fn set_remote(pc: &dyn PeerConnection, desc: SessionDescription) -> Result<(), PeerError> {
    tracing::info!("{} setRemoteDescription start", pc.name());
    match pc.set_remote_description(desc).await {
        Ok(()) => {
            tracing::info!("{} setRemoteDescription complete", pc.name());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to set session description: {}", e);
            Err(e)
        }
    }
}
