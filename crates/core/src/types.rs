//! Gemeinsame Identifikationstypen fuer Videotreff
//!
//! Alle Codes verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen Code-Arten zur Compilezeit auszuschliessen. Teilnehmer-
//! und Raum-Codes sind kurze, menschenlesbare Strings die der
//! CodeAllokator im Signaling-Crate vergibt.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kurzer Code der einen verbundenen Teilnehmer identifiziert (4 Ziffern)
///
/// Der Code lebt so lange wie die Verbindung und wird nach dem Trennen
/// wieder freigegeben.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeilnehmerCode(pub String);

impl TeilnehmerCode {
    /// Gibt den inneren Code als &str zurueck
    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TeilnehmerCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TeilnehmerCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "teilnehmer:{}", self.0)
    }
}

/// Kurzer Code der einen aktiven Raum identifiziert (6 Zeichen, alphanumerisch)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RaumCode(pub String);

impl RaumCode {
    /// Gibt den inneren Code als &str zurueck
    pub fn als_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RaumCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RaumCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "raum:{}", self.0)
    }
}

/// Eindeutige ID einer Transport-Verbindung
///
/// Anders als der TeilnehmerCode ist diese ID nicht menschenlesbar und
/// wird nie an Clients herausgegeben. Sie dient nur der internen
/// Buchfuehrung (Session-Tracker, Logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerbindungsId(pub Uuid);

impl VerbindungsId {
    /// Erstellt eine neue zufaellige VerbindungsId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for VerbindungsId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "verbindung:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbindungs_id_eindeutig() {
        let a = VerbindungsId::new();
        let b = VerbindungsId::new();
        assert_ne!(a, b, "Zwei neue VerbindungsIds muessen verschieden sein");
    }

    #[test]
    fn teilnehmer_code_display() {
        let code = TeilnehmerCode::from("4711");
        assert_eq!(code.to_string(), "teilnehmer:4711");
        assert_eq!(code.als_str(), "4711");
    }

    #[test]
    fn raum_code_display() {
        let code = RaumCode::from("ABC123");
        assert!(code.to_string().starts_with("raum:"));
    }

    #[test]
    fn codes_sind_serde_kompatibel() {
        let code = RaumCode::from("XY99ZZ");
        let json = serde_json::to_string(&code).unwrap();
        let code2: RaumCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, code2);
    }
}
