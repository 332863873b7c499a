//! SQLite-Implementierung des RaumRepository
//!
//! Ein Schnappschuss-Save ersetzt die komplette Mitgliederliste in einer
//! Transaktion, damit nie ein halb-aktualisierter Raum gespeichert wird.

use sqlx::Row;
use videotreff_core::types::{RaumCode, TeilnehmerCode};

use crate::error::DbResult;
use crate::models::{MitgliedRecord, RaumSnapshot};
use crate::repository::RaumRepository;
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{zeit_als_str, zeit_aus_str};

impl RaumRepository for SqliteDb {
    async fn raum_speichern(&self, raum: &RaumSnapshot) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO raeume (code, host_code, erstellt_am, ist_aktiv)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(code) DO UPDATE SET
                 host_code = excluded.host_code,
                 ist_aktiv = excluded.ist_aktiv",
        )
        .bind(raum.code.als_str())
        .bind(raum.host_code.als_str())
        .bind(zeit_als_str(&raum.erstellt_am))
        .bind(raum.ist_aktiv as i32)
        .execute(&mut *tx)
        .await?;

        // Mitgliederliste komplett ersetzen
        sqlx::query("DELETE FROM raum_mitglieder WHERE raum_code = ?")
            .bind(raum.code.als_str())
            .execute(&mut *tx)
            .await?;

        for mitglied in &raum.mitglieder {
            sqlx::query(
                "INSERT INTO raum_mitglieder
                 (raum_code, teilnehmer_code, name, beigetreten_am, ist_host)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(raum.code.als_str())
            .bind(mitglied.teilnehmer_code.als_str())
            .bind(&mitglied.name)
            .bind(zeit_als_str(&mitglied.beigetreten_am))
            .bind(mitglied.ist_host as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn raum_loeschen(&self, code: &RaumCode) -> DbResult<bool> {
        let ergebnis = sqlx::query("DELETE FROM raeume WHERE code = ?")
            .bind(code.als_str())
            .execute(&self.pool)
            .await?;
        Ok(ergebnis.rows_affected() > 0)
    }

    async fn raum_laden(&self, code: &RaumCode) -> DbResult<Option<RaumSnapshot>> {
        let raum_zeile = sqlx::query(
            "SELECT code, host_code, erstellt_am, ist_aktiv FROM raeume WHERE code = ?",
        )
        .bind(code.als_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(zeile) = raum_zeile else {
            return Ok(None);
        };

        let mitglied_zeilen = sqlx::query(
            "SELECT teilnehmer_code, name, beigetreten_am, ist_host
             FROM raum_mitglieder
             WHERE raum_code = ?
             ORDER BY beigetreten_am",
        )
        .bind(code.als_str())
        .fetch_all(&self.pool)
        .await?;

        let mitglieder = mitglied_zeilen
            .iter()
            .map(|m| {
                Ok(MitgliedRecord {
                    teilnehmer_code: TeilnehmerCode(m.get::<String, _>("teilnehmer_code")),
                    name: m.get::<String, _>("name"),
                    beigetreten_am: zeit_aus_str(&m.get::<String, _>("beigetreten_am"))?,
                    ist_host: m.get::<i32, _>("ist_host") != 0,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Some(RaumSnapshot {
            code: RaumCode(zeile.get::<String, _>("code")),
            host_code: TeilnehmerCode(zeile.get::<String, _>("host_code")),
            erstellt_am: zeit_aus_str(&zeile.get::<String, _>("erstellt_am"))?,
            ist_aktiv: zeile.get::<i32, _>("ist_aktiv") != 0,
            mitglieder,
        }))
    }
}
