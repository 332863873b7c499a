//! Signal-Handler – Opakes WebRTC-Signal-Relay
//!
//! Der Server leitet SDP/ICE-Payloads unveraendert zwischen Teilnehmern
//! weiter und inspiziert sie nie. Zustellung ist best-effort: ein nicht
//! (mehr) verbundenes Ziel verwirft das Signal still, denn waehrend eines
//! Verbindungsaufbaus sind veraltete Ziele Alltag und kein Fehlerfall.
//! Pro Absender bleibt die Reihenfolge erhalten (FIFO-Send-Queues).

use std::sync::Arc;
use videotreff_core::types::TeilnehmerCode;
use videotreff_db::repository::{ChatVerlaufRepository, RaumRepository};
use videotreff_protocol::control::{
    ControlMessage, ControlPayload, IncomingSignalEvent, SignalRequest,
};

use crate::server_state::SignalingState;

/// Leitet ein Signal an den Ziel-Teilnehmer weiter
///
/// Gibt nie eine Antwort zurueck: erfolgreiche Weiterleitung ist stumm,
/// ein verwaistes Ziel ebenso.
pub async fn handle_signal<R>(
    request: SignalRequest,
    absender: &TeilnehmerCode,
    state: &Arc<SignalingState<R>>,
) where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    if !state.sessions.ist_verbunden(&request.ziel) {
        tracing::debug!(
            von = %absender,
            ziel = %request.ziel,
            "Signal an getrenntes Ziel verworfen"
        );
        return;
    }

    let zugestellt = state.broadcaster.an_teilnehmer_senden(
        &request.ziel,
        ControlMessage::event(ControlPayload::IncomingSignal(IncomingSignalEvent {
            von: absender.clone(),
            raum_code: request.raum_code,
            payload: request.payload,
        })),
    );

    if zugestellt {
        tracing::trace!(von = %absender, ziel = %request.ziel, "Signal weitergeleitet");
    }
}
