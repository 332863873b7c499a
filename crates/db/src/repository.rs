//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Signaling-Logik von der konkreten
//! Datenbank-Implementierung. Aus Sicht der Aufrufer sind alle Operationen
//! best-effort: Fehler werden geloggt und rollen nie den In-Memory-Zustand
//! zurueck.

use videotreff_core::types::RaumCode;

use crate::error::DbResult;
use crate::models::{ChatNachrichtRecord, NeueChatNachricht, RaumSnapshot};

/// Repository fuer Raum-Schnappschuesse
#[allow(async_fn_in_trait)]
pub trait RaumRepository: Send + Sync {
    /// Speichert einen Raum-Schnappschuss (Upsert inklusive Mitgliederliste)
    async fn raum_speichern(&self, raum: &RaumSnapshot) -> DbResult<()>;

    /// Loescht einen Raum vollstaendig (Mitglieder via ON DELETE CASCADE)
    ///
    /// Gibt `true` zurueck wenn ein Datensatz entfernt wurde.
    async fn raum_loeschen(&self, code: &RaumCode) -> DbResult<bool>;

    /// Laedt einen Raum-Schnappschuss
    async fn raum_laden(&self, code: &RaumCode) -> DbResult<Option<RaumSnapshot>>;
}

/// Repository fuer den append-only Chat-Verlauf
#[allow(async_fn_in_trait)]
pub trait ChatVerlaufRepository: Send + Sync {
    /// Haengt eine Nachricht an den Verlauf an
    async fn nachricht_anhaengen(
        &self,
        nachricht: NeueChatNachricht<'_>,
    ) -> DbResult<ChatNachrichtRecord>;

    /// Laedt die juengsten Nachrichten eines Raums (chronologisch, aelteste zuerst)
    async fn nachrichten_laden(
        &self,
        code: &RaumCode,
        limit: Option<i64>,
    ) -> DbResult<Vec<ChatNachrichtRecord>>;
}
