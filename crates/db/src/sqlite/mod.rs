//! SQLite-Implementierung der Repository-Traits

pub mod chat;
pub mod pool;
pub mod raeume;

pub use pool::{DatabaseConfig, SqliteDb};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{DbError, DbResult};

/// Festes Zeitstempel-Format mit Mikrosekunden
///
/// Die feste Breite macht gespeicherte Zeitstempel lexikografisch sortierbar,
/// sodass `ORDER BY erstellt_am` der Empfangsreihenfolge entspricht.
const ZEIT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Serialisiert einen Zeitstempel fuer die Speicherung
pub(crate) fn zeit_als_str(zeit: &DateTime<Utc>) -> String {
    zeit.format(ZEIT_FORMAT).to_string()
}

/// Parst einen gespeicherten Zeitstempel
pub(crate) fn zeit_aus_str(s: &str) -> DbResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, ZEIT_FORMAT)
        .map(|naiv| naiv.and_utc())
        .map_err(|e| DbError::UngueltigeDaten(format!("Ungueltiger Zeitstempel '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeitstempel_roundtrip() {
        let jetzt = Utc::now();
        let s = zeit_als_str(&jetzt);
        let zurueck = zeit_aus_str(&s).unwrap();
        // Format hat Mikrosekunden-Aufloesung
        assert_eq!(zurueck.timestamp_micros(), jetzt.timestamp_micros());
    }

    #[test]
    fn zeitstempel_lexikografisch_sortierbar() {
        let a = zeit_als_str(&DateTime::from_timestamp(1_700_000_000, 5_000).unwrap());
        let b = zeit_als_str(&DateTime::from_timestamp(1_700_000_000, 40_000).unwrap());
        assert!(a < b, "{} muss vor {} sortieren", a, b);
    }
}
