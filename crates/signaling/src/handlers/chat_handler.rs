//! Chat-Handler – Nachrichten senden und Verlauf abrufen
//!
//! Chat-Nachrichten werden synchron an alle Raum-Mitglieder verteilt
//! (dieselbe Reihenfolge fuer alle) und danach best-effort an den
//! persistenten Verlauf angehaengt.

use chrono::Utc;
use std::sync::Arc;
use videotreff_core::types::TeilnehmerCode;
use videotreff_db::models::NeueChatNachricht;
use videotreff_db::repository::{ChatVerlaufRepository, RaumRepository};
use videotreff_protocol::control::{
    ChatHistoryRequest, ChatHistoryResponse, ChatMessageEvent, ChatSendRequest, ControlMessage,
    ControlPayload, ErrorCode,
};

use crate::server_state::SignalingState;

/// Verarbeitet eine Chat-Nachricht
pub async fn handle_chat_send<R>(
    request: ChatSendRequest,
    request_id: u32,
    absender: &TeilnehmerCode,
    state: &Arc<SignalingState<R>>,
) -> ControlMessage
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    // Nur Mitglieder des genannten Raums duerfen hineinschreiben
    if state.raeume.raum_von(absender).as_ref() != Some(&request.raum_code) {
        return ControlMessage::error(
            request_id,
            ErrorCode::NotInRoom,
            "Kein Mitglied dieses Raums",
        );
    }
    let Some(mitglieder) = state.raeume.mitglieder(&request.raum_code) else {
        return ControlMessage::error(request_id, ErrorCode::RoomNotFound, "Raum existiert nicht");
    };

    let absender_name = state.sessions.name_von(absender).unwrap_or_default();
    let erstellt_am = Utc::now();
    let event = ChatMessageEvent {
        raum_code: request.raum_code.clone(),
        absender_code: absender.clone(),
        absender_name: absender_name.clone(),
        text: request.text.clone(),
        zeitstempel: erstellt_am.to_rfc3339(),
    };

    // Alle anderen Mitglieder bekommen das Event, der Absender die Antwort
    state.broadcaster.an_mitglieder_ausser_senden(
        &mitglieder,
        absender,
        ControlMessage::event(ControlPayload::ChatMessage(event.clone())),
    );

    // Verlauf im Hintergrund anhaengen (best-effort)
    let db = Arc::clone(&state.db);
    let raum_code = request.raum_code.clone();
    let absender_kopie = absender.clone();
    tokio::task::spawn_local(async move {
        let neu = NeueChatNachricht {
            raum_code: &raum_code,
            absender_code: &absender_kopie,
            absender_name: &absender_name,
            text: &request.text,
            erstellt_am,
        };
        if let Err(fehler) = db.nachricht_anhaengen(neu).await {
            tracing::warn!(raum = %raum_code, fehler = %fehler, "Chat-Nachricht nicht persistiert");
        }
    });

    tracing::debug!(raum = %request.raum_code, absender = %absender, "Chat-Nachricht verteilt");
    ControlMessage::new(request_id, ControlPayload::ChatMessage(event))
}

/// Verarbeitet eine Verlaufs-Anfrage
pub async fn handle_chat_history<R>(
    request: ChatHistoryRequest,
    request_id: u32,
    anfragender: &TeilnehmerCode,
    state: &Arc<SignalingState<R>>,
) -> ControlMessage
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    if state.raeume.raum_von(anfragender).as_ref() != Some(&request.raum_code) {
        return ControlMessage::error(
            request_id,
            ErrorCode::NotInRoom,
            "Kein Mitglied dieses Raums",
        );
    }

    let limit = request
        .limit
        .unwrap_or(state.config.chat_verlauf_limit)
        .min(state.config.chat_verlauf_limit);

    match state
        .db
        .nachrichten_laden(&request.raum_code, Some(limit))
        .await
    {
        Ok(records) => {
            let nachrichten = records
                .into_iter()
                .map(|r| ChatMessageEvent {
                    raum_code: r.raum_code,
                    absender_code: r.absender_code,
                    absender_name: r.absender_name,
                    text: r.text,
                    zeitstempel: r.erstellt_am.to_rfc3339(),
                })
                .collect();
            ControlMessage::new(
                request_id,
                ControlPayload::ChatHistoryResponse(ChatHistoryResponse {
                    raum_code: request.raum_code,
                    nachrichten,
                }),
            )
        }
        Err(fehler) => {
            tracing::warn!(raum = %request.raum_code, fehler = %fehler, "Chat-Verlauf nicht ladbar");
            ControlMessage::error(
                request_id,
                ErrorCode::InternalError,
                "Verlauf derzeit nicht verfuegbar",
            )
        }
    }
}
