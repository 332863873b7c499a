//! Raum-Registry – Autoritative In-Memory-Quelle fuer Raum-Zustand
//!
//! Die Registry beantwortet "existiert dieser Raum / ist er voll / wer ist
//! drin / wer ist Host" und ist die einzige Stelle die Raum-Zustand
//! mutiert. Der Persistenz-Store haengt als best-effort Verlaufs-Cache
//! dahinter und hat auf Live-Entscheidungen keinen Einfluss.
//!
//! ## Serialisierung pro Raum
//! Alle Mutationen eines Raums laufen unter dem `DashMap`-Eintrag des
//! Raum-Codes: Kapazitaetspruefung und Einfuegen passieren im selben
//! `get_mut`-Scope, zwei gleichzeitige Beitritte koennen die Kapazitaet
//! nicht gemeinsam ueberschreiten. Die Loeschung leerer Raeume laeuft
//! ueber `remove_if` und prueft die Leerheit erneut unter dem Lock.
//!
//! ## Host-Transfer
//! Verlaesst der Host einen Raum mit verbleibenden Mitgliedern, wird das
//! Mitglied mit dem aeltesten Beitrittszeitpunkt neuer Host. Das ist eine
//! bewusste, deterministische Wahl (testfreundlich, unabhaengig von
//! Array-Reihenfolgen).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use videotreff_core::types::{RaumCode, TeilnehmerCode};

use crate::codes::CodeAllokator;
use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// Mitglied & Raum
// ---------------------------------------------------------------------------

/// Ein Mitglied eines Raums
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mitglied {
    pub teilnehmer_code: TeilnehmerCode,
    pub name: String,
    pub beigetreten_am: DateTime<Utc>,
    pub ist_host: bool,
}

/// Interner Raum-Zustand (nur unter dem Registry-Lock mutiert)
#[derive(Debug)]
struct Raum {
    code: RaumCode,
    erstellt_am: DateTime<Utc>,
    mitglieder: Vec<Mitglied>,
}

impl Raum {
    fn host_code(&self) -> Option<TeilnehmerCode> {
        self.mitglieder
            .iter()
            .find(|m| m.ist_host)
            .map(|m| m.teilnehmer_code.clone())
    }

    fn info(&self) -> RaumInfo {
        RaumInfo {
            code: self.code.clone(),
            erstellt_am: self.erstellt_am,
            host_code: self.host_code(),
            mitglieder: self.mitglieder.clone(),
        }
    }
}

/// Schnappschuss eines Raums fuer Broadcasts und Persistenz
#[derive(Debug, Clone)]
pub struct RaumInfo {
    pub code: RaumCode,
    pub erstellt_am: DateTime<Utc>,
    pub host_code: Option<TeilnehmerCode>,
    /// Mitglieder in Beitrittsreihenfolge
    pub mitglieder: Vec<Mitglied>,
}

impl RaumInfo {
    /// Gibt die Anzahl der Mitglieder zurueck
    pub fn teilnehmer_anzahl(&self) -> usize {
        self.mitglieder.len()
    }
}

// ---------------------------------------------------------------------------
// Ergebnis-Typen
// ---------------------------------------------------------------------------

/// Ergebnis eines Raum-Verlassens
#[derive(Debug, Clone)]
pub enum VerlassenErgebnis {
    /// Der Teilnehmer war kein Mitglied – No-Op, kein Fehler
    /// (toleriert doppelte Leave-Signale von wackligen Transporten)
    NichtMitglied,
    /// Entfernt; der Raum besteht weiter
    Entfernt {
        raum: RaumInfo,
        /// Gesetzt wenn der Host-Transfer gefeuert hat
        neuer_host: Option<TeilnehmerCode>,
    },
    /// Der Raum wurde mit dem letzten Mitglied endgueltig geloescht
    RaumGeloescht { raum_code: RaumCode },
}

/// Ergebnis eines Beitritts oder einer Raum-Erstellung
///
/// `verlassen_von` ist gesetzt wenn der Teilnehmer dafuer still aus einem
/// anderen Raum migriert wurde (eine Identitaet gehoert zu hoechstens
/// einem Raum).
#[derive(Debug, Clone)]
pub struct BeitrittErgebnis {
    pub raum: RaumInfo,
    pub verlassen_von: Option<(RaumCode, VerlassenErgebnis)>,
}

// ---------------------------------------------------------------------------
// RaumRegistry
// ---------------------------------------------------------------------------

/// Verwaltet alle aktiven Raeume
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RaumRegistry {
    inner: Arc<RaumRegistryInner>,
}

struct RaumRegistryInner {
    /// Alle aktiven Raeume, indiziert nach Raum-Code
    raeume: DashMap<RaumCode, Raum>,
    /// Teilnehmer -> aktueller Raum (hoechstens einer)
    mitglied_zu_raum: DashMap<TeilnehmerCode, RaumCode>,
    /// Allokator fuer Raum-Codes (Freigabe bei Loeschung)
    allokator: CodeAllokator,
    /// Kapazitaetsgrenze pro Raum
    kapazitaet: usize,
}

impl RaumRegistry {
    /// Erstellt eine neue RaumRegistry
    pub fn neu(allokator: CodeAllokator, kapazitaet: usize) -> Self {
        Self {
            inner: Arc::new(RaumRegistryInner {
                raeume: DashMap::new(),
                mitglied_zu_raum: DashMap::new(),
                allokator,
                kapazitaet,
            }),
        }
    }

    /// Erstellt einen neuen Raum mit dem Ersteller als Host
    ///
    /// War der Ersteller bereits Mitglied eines anderen Raums, migriert er
    /// still aus dem alten Raum (dieselbe Regel wie beim Beitritt).
    /// Schlaegt nur fehl wenn die Code-Vergabe fehlschlaegt.
    pub fn erstellen(
        &self,
        ersteller: TeilnehmerCode,
        name: String,
    ) -> SignalingResult<BeitrittErgebnis> {
        let raum_code = self.inner.allokator.raum_code_vergeben()?;

        let verlassen_von = self.alten_raum_verlassen(&ersteller, &raum_code);

        let raum = Raum {
            code: raum_code.clone(),
            erstellt_am: Utc::now(),
            mitglieder: vec![Mitglied {
                teilnehmer_code: ersteller.clone(),
                name,
                beigetreten_am: Utc::now(),
                ist_host: true,
            }],
        };
        let info = raum.info();
        self.inner.raeume.insert(raum_code.clone(), raum);
        self.inner.mitglied_zu_raum.insert(ersteller, raum_code.clone());

        tracing::info!(raum = %raum_code, "Raum erstellt");
        Ok(BeitrittErgebnis {
            raum: info,
            verlassen_von,
        })
    }

    /// Tritt einem bestehenden Raum bei
    ///
    /// Pruefung (Existenz, Kapazitaet) und Einfuegen laufen im selben
    /// Lock-Scope; die alte Mitgliedschaft wird erst nach erfolgreichem
    /// Einfuegen aufgeloest. Ein abgelehnter Beitritt laesst damit auch
    /// den alten Raum unberuehrt, egal auf welchem Executor.
    pub fn beitreten(
        &self,
        code: &RaumCode,
        teilnehmer: TeilnehmerCode,
        name: String,
    ) -> SignalingResult<BeitrittErgebnis> {
        let info = {
            let mut raum = self
                .inner
                .raeume
                .get_mut(code)
                .ok_or_else(|| SignalingError::RaumNichtGefunden(code.als_str().to_string()))?;

            if let Some(bestehend) = raum
                .mitglieder
                .iter_mut()
                .find(|m| m.teilnehmer_code == teilnehmer)
            {
                // Wiederholter Beitritt zum selben Raum: Name auffrischen,
                // Position, Zeitstempel und Host-Status bleiben erhalten
                bestehend.name = name;
            } else {
                if raum.mitglieder.len() >= self.inner.kapazitaet {
                    return Err(SignalingError::RaumVoll(self.inner.kapazitaet));
                }
                raum.mitglieder.push(Mitglied {
                    teilnehmer_code: teilnehmer.clone(),
                    name,
                    beigetreten_am: Utc::now(),
                    ist_host: false,
                });
            }
            raum.info()
        };

        // Migration: die alte Mitgliedschaft erst jetzt aufloesen
        // (`mitglied_zu_raum` zeigt noch auf den alten Raum)
        let verlassen_von = self.alten_raum_verlassen(&teilnehmer, code);

        self.inner
            .mitglied_zu_raum
            .insert(teilnehmer.clone(), code.clone());

        tracing::info!(raum = %code, teilnehmer = %teilnehmer, "Raum beigetreten");
        Ok(BeitrittErgebnis {
            raum: info,
            verlassen_von,
        })
    }

    /// Entfernt einen Teilnehmer aus einem Raum
    ///
    /// Verlassen eines Raums in dem man nicht Mitglied ist, ist ein No-Op.
    /// Der letzte Verlassende loescht den Raum endgueltig; der Raum-Code
    /// wird freigegeben und ist danach nicht wieder betretbar.
    pub fn verlassen(&self, code: &RaumCode, teilnehmer: &TeilnehmerCode) -> VerlassenErgebnis {
        let ergebnis = {
            let Some(mut raum) = self.inner.raeume.get_mut(code) else {
                return VerlassenErgebnis::NichtMitglied;
            };

            let Some(pos) = raum
                .mitglieder
                .iter()
                .position(|m| m.teilnehmer_code == *teilnehmer)
            else {
                return VerlassenErgebnis::NichtMitglied;
            };

            let entfernt = raum.mitglieder.remove(pos);

            if raum.mitglieder.is_empty() {
                VerlassenErgebnis::RaumGeloescht {
                    raum_code: code.clone(),
                }
            } else {
                // Host-Transfer: aeltestes verbleibendes Mitglied uebernimmt
                let neuer_host = if entfernt.ist_host {
                    let nachfolger = raum
                        .mitglieder
                        .iter_mut()
                        .min_by_key(|m| m.beigetreten_am)
                        .map(|m| {
                            m.ist_host = true;
                            m.teilnehmer_code.clone()
                        });
                    nachfolger
                } else {
                    None
                };
                VerlassenErgebnis::Entfernt {
                    raum: raum.info(),
                    neuer_host,
                }
            }
        };

        self.inner.mitglied_zu_raum.remove(teilnehmer);

        if let VerlassenErgebnis::RaumGeloescht { .. } = ergebnis {
            // Leerheit unter dem Lock erneut pruefen: zwischen dem Entfernen
            // und diesem Aufruf kann ein Beitritt dazwischengekommen sein
            let geloescht = self
                .inner
                .raeume
                .remove_if(code, |_, raum| raum.mitglieder.is_empty())
                .is_some();
            if geloescht {
                self.inner.allokator.raum_code_freigeben(code);
                tracing::info!(raum = %code, "Raum geloescht (letztes Mitglied gegangen)");
            }
        } else {
            tracing::info!(raum = %code, teilnehmer = %teilnehmer, "Raum verlassen");
        }

        ergebnis
    }

    /// Entfernt einen Teilnehmer aus seinem aktuellen Raum (falls vorhanden)
    ///
    /// Einstiegspunkt fuer `leaveRoom` ohne Raum-Angabe und fuer den
    /// Verbindungs-Teardown.
    pub fn aktuellen_raum_verlassen(
        &self,
        teilnehmer: &TeilnehmerCode,
    ) -> Option<(RaumCode, VerlassenErgebnis)> {
        let code = self.raum_von(teilnehmer)?;
        let ergebnis = self.verlassen(&code, teilnehmer);
        Some((code, ergebnis))
    }

    /// Aktualisiert den Anzeigenamen eines Mitglieds in seinem Raum
    ///
    /// Gibt den frischen Schnappschuss zurueck damit der Aufrufer die
    /// Mitgliederliste neu verteilen kann.
    pub fn name_aktualisieren(
        &self,
        teilnehmer: &TeilnehmerCode,
        name: &str,
    ) -> Option<RaumInfo> {
        let code = self.raum_von(teilnehmer)?;
        let mut raum = self.inner.raeume.get_mut(&code)?;
        let mitglied = raum
            .mitglieder
            .iter_mut()
            .find(|m| m.teilnehmer_code == *teilnehmer)?;
        mitglied.name = name.to_string();
        Some(raum.info())
    }

    /// Gibt den frischen Mitglieder-Schnappschuss eines Raums zurueck
    pub fn mitglieder(&self, code: &RaumCode) -> Option<Vec<Mitglied>> {
        self.inner.raeume.get(code).map(|r| r.mitglieder.clone())
    }

    /// Gibt den vollstaendigen Schnappschuss eines Raums zurueck
    pub fn raum_info(&self, code: &RaumCode) -> Option<RaumInfo> {
        self.inner.raeume.get(code).map(|r| r.info())
    }

    /// Gibt den aktuellen Raum eines Teilnehmers zurueck
    pub fn raum_von(&self, teilnehmer: &TeilnehmerCode) -> Option<RaumCode> {
        self.inner
            .mitglied_zu_raum
            .get(teilnehmer)
            .map(|e| e.value().clone())
    }

    /// Prueft ob ein Raum aktiv ist
    pub fn ist_aktiv(&self, code: &RaumCode) -> bool {
        self.inner.raeume.contains_key(code)
    }

    /// Gibt die Anzahl der aktiven Raeume zurueck
    pub fn raum_anzahl(&self) -> usize {
        self.inner.raeume.len()
    }

    /// Gibt die Kapazitaetsgrenze zurueck
    pub fn kapazitaet(&self) -> usize {
        self.inner.kapazitaet
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    /// Loest eine bestehende Mitgliedschaft in einem anderen Raum auf
    fn alten_raum_verlassen(
        &self,
        teilnehmer: &TeilnehmerCode,
        neuer_raum: &RaumCode,
    ) -> Option<(RaumCode, VerlassenErgebnis)> {
        let alt = self.raum_von(teilnehmer)?;
        if alt == *neuer_raum {
            return None;
        }
        tracing::debug!(
            teilnehmer = %teilnehmer,
            von = %alt,
            nach = %neuer_raum,
            "Stille Migration aus altem Raum"
        );
        let ergebnis = self.verlassen(&alt, teilnehmer);
        Some((alt, ergebnis))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
