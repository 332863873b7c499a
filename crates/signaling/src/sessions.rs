//! Session-Tracker – Bindet Teilnehmer-Codes an lebende Verbindungen
//!
//! Wer ist gerade verbunden, unter welchem Anzeigenamen, seit wann? Der
//! Tracker haelt den ephemeren Zustand aller verbundenen Clients. Eine
//! Session entsteht beim Verbindungsaufbau (nach der Code-Vergabe) und
//! verschwindet beim Teardown. Die Erreichbarkeits-Pruefung des
//! Signal-Relays laeuft hierueber.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use videotreff_core::types::{TeilnehmerCode, VerbindungsId};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Ephemerer Zustand einer verbundenen Client-Session
#[derive(Debug, Clone)]
pub struct Session {
    pub teilnehmer_code: TeilnehmerCode,
    pub verbindungs_id: VerbindungsId,
    pub name: String,
    pub verbunden_seit: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SessionTracker
// ---------------------------------------------------------------------------

/// Verwaltet alle aktiven Sessions
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionTracker {
    inner: Arc<SessionTrackerInner>,
}

struct SessionTrackerInner {
    /// Aktive Sessions, indiziert nach Teilnehmer-Code
    sessions: DashMap<TeilnehmerCode, Session>,
}

impl SessionTracker {
    /// Erstellt einen neuen SessionTracker
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(SessionTrackerInner {
                sessions: DashMap::new(),
            }),
        }
    }

    /// Registriert eine neue Session fuer einen frisch vergebenen Code
    pub fn registrieren(&self, teilnehmer_code: TeilnehmerCode, verbindungs_id: VerbindungsId) {
        let session = Session {
            teilnehmer_code: teilnehmer_code.clone(),
            verbindungs_id,
            name: String::new(),
            verbunden_seit: Utc::now(),
        };
        self.inner.sessions.insert(teilnehmer_code.clone(), session);
        tracing::info!(teilnehmer = %teilnehmer_code, verbindung = %verbindungs_id, "Session registriert");
    }

    /// Entfernt eine Session (Verbindung getrennt)
    ///
    /// Mehrfaches Entfernen ist ein No-Op.
    pub fn entfernen(&self, teilnehmer_code: &TeilnehmerCode) {
        if self.inner.sessions.remove(teilnehmer_code).is_some() {
            tracing::info!(teilnehmer = %teilnehmer_code, "Session entfernt");
        }
    }

    /// Setzt den Anzeigenamen einer Session
    ///
    /// Gibt `false` zurueck wenn keine Session unter dem Code existiert.
    pub fn name_setzen(&self, teilnehmer_code: &TeilnehmerCode, name: &str) -> bool {
        match self.inner.sessions.get_mut(teilnehmer_code) {
            Some(mut session) => {
                session.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Gibt den Anzeigenamen einer Session zurueck
    pub fn name_von(&self, teilnehmer_code: &TeilnehmerCode) -> Option<String> {
        self.inner
            .sessions
            .get(teilnehmer_code)
            .map(|s| s.name.clone())
    }

    /// Prueft ob unter dem Code eine lebende Session existiert
    pub fn ist_verbunden(&self, teilnehmer_code: &TeilnehmerCode) -> bool {
        self.inner.sessions.contains_key(teilnehmer_code)
    }

    /// Gibt den Schnappschuss einer Session zurueck
    pub fn session(&self, teilnehmer_code: &TeilnehmerCode) -> Option<Session> {
        self.inner
            .sessions
            .get(teilnehmer_code)
            .map(|s| s.clone())
    }

    /// Gibt die Anzahl der aktiven Sessions zurueck
    pub fn session_anzahl(&self) -> usize {
        self.inner.sessions.len()
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
