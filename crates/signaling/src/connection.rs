//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! lokalen Task. Die Identitaet wird direkt beim Verbindungsaufbau
//! vergeben: der Client bekommt als erste Nachricht sein
//! `IdentityAssigned` und ist ab dann adressierbar.
//!
//! ## Lebenszyklus
//! ```text
//! Accept -> Code vergeben -> IdentityAssigned -> Anfrage-Loop -> Teardown
//! ```
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Client muss innerhalb von `verbindungs_timeout_sek` irgendetwas senden
//! - Bei Timeout wird die Verbindung getrennt
//!
//! Der Teardown ist idempotent: egal ob der Client sauber trennt, der
//! Socket stirbt oder der Server herunterfaehrt – Raum-Austritt,
//! Session-Entfernung und Code-Freigabe laufen genau einmal durch.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use videotreff_core::types::VerbindungsId;
use videotreff_db::repository::{ChatVerlaufRepository, RaumRepository};
use videotreff_protocol::{
    control::{ControlMessage, ControlPayload, ErrorCode, IdentityAssigned},
    wire::FrameCodec,
};

use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, dispatcht an `MessageDispatcher` und
/// sendet Antworten zurueck. Laeuft in einem eigenen lokalen Task.
pub struct ClientConnection<R>
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    state: Arc<SignalingState<R>>,
    peer_addr: SocketAddr,
}

impl<R> ClientConnection<R>
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState<R>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Diese Methode laeuft bis die Verbindung getrennt wird oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek);
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        tracing::info!(peer = %peer_addr, "Neue Verbindung");

        // Framed-Stream mit FrameCodec einrichten
        let mut framed = Framed::new(stream, FrameCodec::new());

        // Identitaet vergeben – ohne Code keine Verbindung
        let teilnehmer_code = match self.state.allokator.teilnehmer_code_vergeben() {
            Ok(code) => code,
            Err(fehler) => {
                tracing::error!(peer = %peer_addr, fehler = %fehler, "Code-Vergabe fehlgeschlagen");
                let _ = framed
                    .send(ControlMessage::error(
                        0,
                        ErrorCode::CodesExhausted,
                        "Keine freien Teilnehmer-Codes",
                    ))
                    .await;
                return;
            }
        };
        let verbindungs_id = VerbindungsId::new();

        self.state
            .sessions
            .registrieren(teilnehmer_code.clone(), verbindungs_id);
        let mut broadcast_rx = self
            .state
            .broadcaster
            .client_registrieren(teilnehmer_code.clone());

        let ctx = DispatcherContext {
            peer_addr,
            teilnehmer_code: teilnehmer_code.clone(),
            verbindungs_id,
        };
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        // Erste Nachricht: die vergebene Identitaet
        if let Err(e) = framed
            .send(ControlMessage::event(ControlPayload::IdentityAssigned(
                IdentityAssigned {
                    teilnehmer_code: teilnehmer_code.clone(),
                },
            )))
            .await
        {
            tracing::warn!(peer = %peer_addr, fehler = %e, "Identitaets-Zuweisung nicht sendbar");
            dispatcher.verbindung_abbauen(&teilnehmer_code).await;
            return;
        }

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;
        let mut ping_request_id: u32 = 0;

        loop {
            let jetzt = Instant::now();

            // Timeout-Pruefung
            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(peer = %peer_addr, teilnehmer = %teilnehmer_code, "Verbindungs-Timeout");
                break;
            }

            // Naechsten Ping-Zeitpunkt berechnen
            let ping_verzoegerung = if jetzt < naechster_ping {
                naechster_ping.duration_since(jetzt)
            } else {
                Duration::from_millis(1)
            };

            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(
                                peer = %peer_addr,
                                request_id = nachricht.request_id,
                                "Nachricht empfangen"
                            );

                            if let Some(antwort) = dispatcher.dispatch(nachricht, &ctx).await {
                                if let Err(e) = framed.send(antwort).await {
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        fehler = %e,
                                        "Senden fehlgeschlagen"
                                    );
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            // Verbindung geschlossen
                            tracing::info!(peer = %peer_addr, teilnehmer = %teilnehmer_code, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehende Nachricht aus dem Broadcaster
                Some(ausgehend) = broadcast_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(
                            peer = %peer_addr,
                            fehler = %e,
                            "Broadcast-Senden fehlgeschlagen"
                        );
                        break;
                    }
                }

                // Keepalive-Ping
                _ = tokio::time::sleep(ping_verzoegerung) => {
                    if jetzt >= naechster_ping {
                        ping_request_id = ping_request_id.wrapping_add(1);
                        let ts = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_millis() as u64;
                        let ping = ControlMessage::ping(ping_request_id, ts);

                        if let Err(e) = framed.send(ping).await {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Ping-Senden fehlgeschlagen"
                            );
                            break;
                        }
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        // Abschiedsnachricht senden
                        let abschied = ControlMessage::error(
                            0,
                            ErrorCode::InternalError,
                            "Server wird heruntergefahren",
                        );
                        let _ = framed.send(abschied).await;
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende
        dispatcher.verbindung_abbauen(&teilnehmer_code).await;

        tracing::info!(peer = %peer_addr, teilnehmer = %teilnehmer_code, "Verbindungs-Task beendet");
    }
}
