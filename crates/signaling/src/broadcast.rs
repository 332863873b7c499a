//! Event-Broadcaster – Sendet Raum-Events an alle relevanten Clients
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller verbundenen Clients
//! und stellt Methoden bereit, um Nachrichten gezielt oder an ganze
//! Mitgliederlisten zu senden.
//!
//! Die Raum-Zugehoerigkeit lebt in der `RaumRegistry`; Fanout-Methoden
//! nehmen deshalb einen Mitglieder-Schnappschuss statt eine eigene
//! Mitgliedschafts-Tabelle zu pflegen. Der Fanout selbst ist synchron
//! (`try_send` ohne Await-Punkte): innerhalb eines Raums sehen alle
//! Empfaenger die Events in derselben Reihenfolge eingereiht.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use videotreff_core::types::TeilnehmerCode;
use videotreff_protocol::control::ControlMessage;

use crate::rooms::Mitglied;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Client
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub teilnehmer_code: TeilnehmerCode,
    pub tx: mpsc::Sender<ControlMessage>,
}

impl ClientSender {
    /// Sendet eine Nachricht nicht-blockierend an den Client
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    /// Zustellung ist best-effort: ein voller oder toter Empfaenger
    /// blockiert nie den Absender.
    pub fn senden(&self, nachricht: ControlMessage) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(teilnehmer = %self.teilnehmer_code, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(teilnehmer = %self.teilnehmer_code, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Event-Broadcaster fuer alle verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    /// Client-Sender, indiziert nach Teilnehmer-Code
    clients: DashMap<TeilnehmerCode, ClientSender>,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
            }),
        }
    }

    /// Registriert einen neuen Client und gibt seine Empfangs-Queue zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und sendet via TCP.
    pub fn client_registrieren(
        &self,
        teilnehmer_code: TeilnehmerCode,
    ) -> mpsc::Receiver<ControlMessage> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let sender = ClientSender {
            teilnehmer_code: teilnehmer_code.clone(),
            tx,
        };
        self.inner.clients.insert(teilnehmer_code.clone(), sender);
        tracing::debug!(teilnehmer = %teilnehmer_code, "Client im Broadcaster registriert");
        rx
    }

    /// Entfernt einen Client aus dem Broadcaster
    pub fn client_entfernen(&self, teilnehmer_code: &TeilnehmerCode) {
        self.inner.clients.remove(teilnehmer_code);
        tracing::debug!(teilnehmer = %teilnehmer_code, "Client aus Broadcaster entfernt");
    }

    /// Sendet eine Nachricht an einen einzelnen Client
    ///
    /// Gibt `true` zurueck wenn der Client gefunden und die Nachricht
    /// eingereiht wurde.
    pub fn an_teilnehmer_senden(
        &self,
        teilnehmer_code: &TeilnehmerCode,
        nachricht: ControlMessage,
    ) -> bool {
        match self.inner.clients.get(teilnehmer_code) {
            Some(sender) => sender.senden(nachricht),
            None => {
                tracing::debug!(teilnehmer = %teilnehmer_code, "Senden an unbekannten Client");
                false
            }
        }
    }

    /// Sendet eine Nachricht an alle Mitglieder eines Schnappschusses
    ///
    /// Gibt die Anzahl erfolgreich eingereihter Nachrichten zurueck.
    pub fn an_mitglieder_senden(&self, mitglieder: &[Mitglied], nachricht: ControlMessage) -> usize {
        mitglieder
            .iter()
            .filter(|m| self.an_teilnehmer_senden(&m.teilnehmer_code, nachricht.clone()))
            .count()
    }

    /// Sendet eine Nachricht an alle Mitglieder ausser einem
    pub fn an_mitglieder_ausser_senden(
        &self,
        mitglieder: &[Mitglied],
        ausser: &TeilnehmerCode,
        nachricht: ControlMessage,
    ) -> usize {
        mitglieder
            .iter()
            .filter(|m| m.teilnehmer_code != *ausser)
            .filter(|m| self.an_teilnehmer_senden(&m.teilnehmer_code, nachricht.clone()))
            .count()
    }

    /// Gibt die Anzahl registrierter Clients zurueck
    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use videotreff_protocol::control::ControlMessage;

    fn code(s: &str) -> TeilnehmerCode {
        TeilnehmerCode::from(s)
    }

    fn mitglied(s: &str) -> Mitglied {
        Mitglied {
            teilnehmer_code: code(s),
            name: s.to_string(),
            beigetreten_am: Utc::now(),
            ist_host: false,
        }
    }

    #[tokio::test]
    async fn senden_an_registrierten_client() {
        let broadcaster = EventBroadcaster::neu();
        let mut rx = broadcaster.client_registrieren(code("1234"));

        assert!(broadcaster.an_teilnehmer_senden(&code("1234"), ControlMessage::ping(0, 0)));
        let empfangen = rx.recv().await.unwrap();
        assert_eq!(empfangen.request_id, 0);
    }

    #[tokio::test]
    async fn senden_an_unbekannten_client_ist_stiller_drop() {
        let broadcaster = EventBroadcaster::neu();
        assert!(!broadcaster.an_teilnehmer_senden(&code("9999"), ControlMessage::ping(0, 0)));
    }

    #[tokio::test]
    async fn fanout_ueberspringt_ausgenommenen_und_getrennte() {
        let broadcaster = EventBroadcaster::neu();
        let mut rx_a = broadcaster.client_registrieren(code("1000"));
        let _rx_b = broadcaster.client_registrieren(code("2000"));
        broadcaster.client_entfernen(&code("3000")); // nie registriert – No-Op

        let mitglieder = vec![mitglied("1000"), mitglied("2000"), mitglied("3000")];
        let zugestellt = broadcaster.an_mitglieder_ausser_senden(
            &mitglieder,
            &code("2000"),
            ControlMessage::ping(0, 0),
        );

        // 1000 erreicht, 2000 ausgenommen, 3000 nicht verbunden
        assert_eq!(zugestellt, 1);
        assert!(rx_a.recv().await.is_some());
    }

    #[tokio::test]
    async fn volle_queue_verwirft_statt_zu_blockieren() {
        let broadcaster = EventBroadcaster::neu();
        let _rx = broadcaster.client_registrieren(code("1234"));

        for _ in 0..SEND_QUEUE_GROESSE {
            assert!(broadcaster.an_teilnehmer_senden(&code("1234"), ControlMessage::ping(0, 0)));
        }
        // Queue ist voll, niemand liest – Drop statt Blockade
        assert!(!broadcaster.an_teilnehmer_senden(&code("1234"), ControlMessage::ping(0, 0)));
    }
}
