//! Fehlertypen fuer den Signaling-Kern

use thiserror::Error;

/// Fehlertyp fuer den Signaling-Kern
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Raum existiert nicht oder ist nicht mehr aktiv
    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(String),

    /// Raum hat die Kapazitaetsgrenze erreicht
    #[error("Raum ist voll: maximal {0} Teilnehmer")]
    RaumVoll(usize),

    /// Code-Vorrat erschoepft (pathologische Last)
    ///
    /// Tritt nur auf wenn die Generierung nach der maximalen Anzahl
    /// Versuche keinen freien Code gefunden hat. Bricht ausschliesslich
    /// den einen Allokationsversuch ab.
    #[error("Code-Vorrat erschoepft nach {versuche} Versuchen ({art})")]
    CodesErschoepft { art: &'static str, versuche: usize },

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Kern
pub type SignalingResult<T> = Result<T, SignalingError>;
