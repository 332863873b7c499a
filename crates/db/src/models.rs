//! Datensatz-Typen fuer das Persistenz-Gateway
//!
//! Die Record-Formen spiegeln die persistierten Gestalten aus der
//! Spezifikation: Raum-Schnappschuss mit eingebetteten Mitgliedern und
//! append-only Chat-Verlauf.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use videotreff_core::types::{RaumCode, TeilnehmerCode};

/// Persistierter Mitglieds-Eintrag eines Raum-Schnappschusses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MitgliedRecord {
    pub teilnehmer_code: TeilnehmerCode,
    pub name: String,
    pub beigetreten_am: DateTime<Utc>,
    pub ist_host: bool,
}

/// Vollstaendiger Raum-Schnappschuss wie er gespeichert wird
///
/// Der Schnappschuss ist ein Cache der Live-Daten, nie umgekehrt: die
/// In-Memory-Registry bleibt fuer laufende Sessions autoritativ.
#[derive(Debug, Clone)]
pub struct RaumSnapshot {
    pub code: RaumCode,
    pub host_code: TeilnehmerCode,
    pub erstellt_am: DateTime<Utc>,
    pub ist_aktiv: bool,
    pub mitglieder: Vec<MitgliedRecord>,
}

/// Persistierte Chat-Nachricht
#[derive(Debug, Clone)]
pub struct ChatNachrichtRecord {
    pub id: Uuid,
    pub raum_code: RaumCode,
    pub absender_code: TeilnehmerCode,
    pub absender_name: String,
    pub text: String,
    pub erstellt_am: DateTime<Utc>,
}

/// Daten zum Anhaengen einer neuen Chat-Nachricht
#[derive(Debug)]
pub struct NeueChatNachricht<'a> {
    pub raum_code: &'a RaumCode,
    pub absender_code: &'a TeilnehmerCode,
    pub absender_name: &'a str,
    pub text: &'a str,
    /// Empfangszeitpunkt am Server (bestimmt die Raum-Reihenfolge)
    pub erstellt_am: DateTime<Utc>,
}
