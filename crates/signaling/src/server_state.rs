//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt alle geteilten Manager als Arc-Referenzen, die sicher zwischen
//! tokio-Tasks geteilt werden koennen.

use std::sync::Arc;
use std::time::Instant;
use videotreff_db::repository::{ChatVerlaufRepository, RaumRepository};

use crate::broadcast::EventBroadcaster;
use crate::codes::CodeAllokator;
use crate::rooms::RaumRegistry;
use crate::sessions::SessionTracker;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale Mitglieder pro Raum
    pub raum_kapazitaet: usize,
    /// Maximale Clients gleichzeitig
    pub max_clients: u32,
    /// Anzahl Chat-Nachrichten die beim Verlaufs-Abruf geliefert werden
    pub chat_verlauf_limit: i64,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            raum_kapazitaet: 6,
            max_clients: 512,
            chat_verlauf_limit: 50,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
///
/// Alle Manager sind als geteilte Handles gehalten. Clone gibt eine
/// Referenz auf denselben inneren Zustand.
pub struct SignalingState<R>
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Persistenz-Zugriff (Raum-Schnappschuesse, Chat-Verlauf)
    pub db: Arc<R>,
    /// Code-Allokator (Teilnehmer- und Raum-Codes)
    pub allokator: CodeAllokator,
    /// Raum-Registry (autoritative Raum-Zustands-Quelle)
    pub raeume: RaumRegistry,
    /// Session-Tracker (wer ist verbunden, unter welchem Namen)
    pub sessions: SessionTracker,
    /// Event-Broadcaster (Nachrichten an Clients senden)
    pub broadcaster: EventBroadcaster,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl<R> SignalingState<R>
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, db: Arc<R>) -> Arc<Self> {
        let allokator = CodeAllokator::neu();
        let raeume = RaumRegistry::neu(allokator.clone(), config.raum_kapazitaet);
        Arc::new(Self {
            config: Arc::new(config),
            db,
            allokator,
            raeume,
            sessions: SessionTracker::neu(),
            broadcaster: EventBroadcaster::neu(),
            start_time: Instant::now(),
        })
    }
}
