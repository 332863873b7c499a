//! Message-Dispatcher – Routet ControlMessages an die richtigen Handler
//!
//! Der Dispatcher empfaengt ControlMessages von einer ClientConnection,
//! bestimmt den richtigen Handler und gibt die Antwort zurueck. Die
//! Identitaet haengt an der Verbindung: der Teilnehmer-Code wird beim
//! Verbindungsaufbau vergeben und ist fuer jede Anfrage bekannt.

use std::net::SocketAddr;
use std::sync::Arc;
use videotreff_core::types::{TeilnehmerCode, VerbindungsId};
use videotreff_db::repository::{ChatVerlaufRepository, RaumRepository};
use videotreff_protocol::control::{
    ControlMessage, ControlPayload, ErrorCode, IdentityAssigned,
};

use crate::handlers::{chat_handler, raum_handler, signal_handler};
use crate::server_state::SignalingState;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    /// Peer-Adresse (nur fuer Logging)
    pub peer_addr: SocketAddr,
    /// Beim Verbindungsaufbau vergebener Teilnehmer-Code
    pub teilnehmer_code: TeilnehmerCode,
    /// Interne Verbindungs-ID
    pub verbindungs_id: VerbindungsId,
}

/// Zentraler Message-Dispatcher
///
/// Routet eingehende ControlMessages an die entsprechenden Handler und
/// gibt die Antwort-ControlMessage zurueck.
pub struct MessageDispatcher<R>
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    state: Arc<SignalingState<R>>,
}

impl<R> MessageDispatcher<R>
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState<R>>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende ControlMessage und gibt die Antwort zurueck
    ///
    /// Gibt `None` zurueck wenn keine Antwort gesendet werden soll
    /// (Signale, Namensaenderungen und Pong-Antworten sind stumm).
    pub async fn dispatch(
        &self,
        message: ControlMessage,
        ctx: &DispatcherContext,
    ) -> Option<ControlMessage> {
        let request_id = message.request_id;
        let teilnehmer = &ctx.teilnehmer_code;

        match message.payload {
            // -------------------------------------------------------------------
            // Identitaet
            // -------------------------------------------------------------------
            ControlPayload::Identify => Some(ControlMessage::new(
                request_id,
                ControlPayload::IdentityAssigned(IdentityAssigned {
                    teilnehmer_code: teilnehmer.clone(),
                }),
            )),

            ControlPayload::SetDisplayName(req) => {
                raum_handler::handle_set_display_name(req, teilnehmer, &self.state).await;
                None
            }

            // -------------------------------------------------------------------
            // Raum-Nachrichten
            // -------------------------------------------------------------------
            ControlPayload::CreateRoom(req) => Some(
                raum_handler::handle_create_room(req, request_id, teilnehmer, &self.state).await,
            ),

            ControlPayload::JoinRoom(req) => Some(
                raum_handler::handle_join_room(req, request_id, teilnehmer, &self.state).await,
            ),

            ControlPayload::LeaveRoom => {
                Some(raum_handler::handle_leave_room(request_id, teilnehmer, &self.state).await)
            }

            // -------------------------------------------------------------------
            // WebRTC-Signal-Relay
            // -------------------------------------------------------------------
            ControlPayload::Signal(req) => {
                signal_handler::handle_signal(req, teilnehmer, &self.state).await;
                None
            }

            // -------------------------------------------------------------------
            // Chat
            // -------------------------------------------------------------------
            ControlPayload::ChatSend(req) => Some(
                chat_handler::handle_chat_send(req, request_id, teilnehmer, &self.state).await,
            ),

            ControlPayload::ChatHistory(req) => Some(
                chat_handler::handle_chat_history(req, request_id, teilnehmer, &self.state).await,
            ),

            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            ControlPayload::Ping(ping) => {
                let server_ts = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64;
                Some(ControlMessage::pong(
                    request_id,
                    ping.timestamp_ms,
                    server_ts,
                ))
            }

            ControlPayload::Pong(_) => {
                // Pong-Antworten vom Client werden nur geloggt (RTT-Messung)
                tracing::trace!(verbindung = %ctx.verbindungs_id, "Pong empfangen");
                None
            }

            // -------------------------------------------------------------------
            // Server-Nachrichten die kein Client senden darf
            // -------------------------------------------------------------------
            ControlPayload::IdentityAssigned(_)
            | ControlPayload::RoomCreated(_)
            | ControlPayload::RoomJoined(_)
            | ControlPayload::RoomLeft(_)
            | ControlPayload::MemberJoined(_)
            | ControlPayload::MemberLeft(_)
            | ControlPayload::HostChanged(_)
            | ControlPayload::RoomUpdated(_)
            | ControlPayload::IncomingSignal(_)
            | ControlPayload::ChatMessage(_)
            | ControlPayload::ChatHistoryResponse(_)
            | ControlPayload::Error(_) => {
                tracing::warn!(
                    teilnehmer = %teilnehmer,
                    peer = %ctx.peer_addr,
                    "Server-Nachricht vom Client empfangen"
                );
                Some(ControlMessage::error(
                    request_id,
                    ErrorCode::InvalidRequest,
                    "Nachrichtentyp nicht vom Client erlaubt",
                ))
            }
        }
    }

    /// Baut den Zustand einer getrennten Verbindung vollstaendig ab
    ///
    /// Verlaesst den aktuellen Raum (mit allen Events), entfernt Session
    /// und Send-Queue und gibt den Teilnehmer-Code frei. Mehrfacher
    /// Aufruf ist ein No-Op.
    pub async fn verbindung_abbauen(&self, teilnehmer: &TeilnehmerCode) {
        if let Some((raum_code, ergebnis)) = self.state.raeume.aktuellen_raum_verlassen(teilnehmer)
        {
            tracing::debug!(teilnehmer = %teilnehmer, raum = %raum_code, "Teardown verlaesst Raum");
            raum_handler::verlassen_verteilen(teilnehmer, &ergebnis, &self.state);
        }
        self.state.sessions.entfernen(teilnehmer);
        self.state.broadcaster.client_entfernen(teilnehmer);
        self.state.allokator.teilnehmer_code_freigeben(teilnehmer);
    }

    /// Gibt eine Referenz auf den geteilten Zustand zurueck
    pub fn state(&self) -> &Arc<SignalingState<R>> {
        &self.state
    }
}
