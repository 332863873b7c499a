//! Code-Allokator – Vergibt kurze, kollisionsfreie, tippbare Codes
//!
//! Teilnehmer bekommen 4-stellige Ziffern-Codes (1000–9999), Raeume
//! 6-stellige alphanumerische Codes. Die Eindeutigkeit wird gegen die
//! Menge der aktuell vergebenen Codes geprueft; freigegebene Codes sind
//! sofort wieder vergebbar.
//!
//! Kollisionen werden intern durch Neuziehen behandelt. Die Versuchszahl
//! ist hart begrenzt: mit nur 9000 moeglichen Teilnehmer-Codes ist ein
//! erschoepfter Vorrat ein Lastsignal, kein Normalbetrieb, und soll laut
//! und diagnostizierbar fehlschlagen statt endlos zu schleifen.

use dashmap::DashSet;
use rand::Rng;
use std::sync::Arc;
use videotreff_core::types::{RaumCode, TeilnehmerCode};

use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Maximale Generierungsversuche pro Allokation
const MAX_VERSUCHE: usize = 1000;

/// Zeichenvorrat fuer Raum-Codes (ohne leicht verwechselbare Zeichen)
const RAUM_CODE_ZEICHEN: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Laenge eines Raum-Codes
const RAUM_CODE_LAENGE: usize = 6;

// ---------------------------------------------------------------------------
// CodeAllokator
// ---------------------------------------------------------------------------

/// Vergibt Teilnehmer- und Raum-Codes und verwaltet deren Reservierung
///
/// Thread-safe via Arc + DashSet. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct CodeAllokator {
    inner: Arc<CodeAllokatorInner>,
}

struct CodeAllokatorInner {
    /// Aktuell vergebene Teilnehmer-Codes
    teilnehmer_codes: DashSet<TeilnehmerCode>,
    /// Aktuell vergebene Raum-Codes
    raum_codes: DashSet<RaumCode>,
}

impl CodeAllokator {
    /// Erstellt einen neuen CodeAllokator
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(CodeAllokatorInner {
                teilnehmer_codes: DashSet::new(),
                raum_codes: DashSet::new(),
            }),
        }
    }

    /// Vergibt einen freien 4-stelligen Teilnehmer-Code
    pub fn teilnehmer_code_vergeben(&self) -> SignalingResult<TeilnehmerCode> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_VERSUCHE {
            let kandidat = TeilnehmerCode(rng.gen_range(1000..10000).to_string());
            // insert gibt false zurueck wenn der Code bereits vergeben ist
            if self.inner.teilnehmer_codes.insert(kandidat.clone()) {
                tracing::debug!(code = %kandidat, "Teilnehmer-Code vergeben");
                return Ok(kandidat);
            }
        }

        tracing::error!(
            vergeben = self.inner.teilnehmer_codes.len(),
            "Teilnehmer-Code-Vorrat erschoepft"
        );
        Err(SignalingError::CodesErschoepft {
            art: "teilnehmer",
            versuche: MAX_VERSUCHE,
        })
    }

    /// Vergibt einen freien 6-stelligen alphanumerischen Raum-Code
    pub fn raum_code_vergeben(&self) -> SignalingResult<RaumCode> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_VERSUCHE {
            let kandidat: String = (0..RAUM_CODE_LAENGE)
                .map(|_| {
                    let idx = rng.gen_range(0..RAUM_CODE_ZEICHEN.len());
                    RAUM_CODE_ZEICHEN[idx] as char
                })
                .collect();
            let kandidat = RaumCode(kandidat);
            if self.inner.raum_codes.insert(kandidat.clone()) {
                tracing::debug!(code = %kandidat, "Raum-Code vergeben");
                return Ok(kandidat);
            }
        }

        tracing::error!(
            vergeben = self.inner.raum_codes.len(),
            "Raum-Code-Vorrat erschoepft"
        );
        Err(SignalingError::CodesErschoepft {
            art: "raum",
            versuche: MAX_VERSUCHE,
        })
    }

    /// Gibt einen Teilnehmer-Code frei (beim Verbindungs-Teardown)
    ///
    /// Die Freigabe passiert genau einmal; ein zweiter Aufruf ist ein No-Op.
    pub fn teilnehmer_code_freigeben(&self, code: &TeilnehmerCode) {
        if self.inner.teilnehmer_codes.remove(code).is_some() {
            tracing::debug!(code = %code, "Teilnehmer-Code freigegeben");
        }
    }

    /// Gibt einen Raum-Code frei (bei Raum-Loeschung)
    pub fn raum_code_freigeben(&self, code: &RaumCode) {
        if self.inner.raum_codes.remove(code).is_some() {
            tracing::debug!(code = %code, "Raum-Code freigegeben");
        }
    }

    /// Prueft ob ein Teilnehmer-Code aktuell vergeben ist
    pub fn ist_teilnehmer_code_vergeben(&self, code: &TeilnehmerCode) -> bool {
        self.inner.teilnehmer_codes.contains(code)
    }

    /// Gibt die Anzahl der vergebenen Teilnehmer-Codes zurueck
    pub fn vergebene_teilnehmer_codes(&self) -> usize {
        self.inner.teilnehmer_codes.len()
    }
}

impl Default for CodeAllokator {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
