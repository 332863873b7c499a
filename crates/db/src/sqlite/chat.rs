//! SQLite-Implementierung des ChatVerlaufRepository

use sqlx::Row;
use uuid::Uuid;
use videotreff_core::types::{RaumCode, TeilnehmerCode};

use crate::error::DbResult;
use crate::models::{ChatNachrichtRecord, NeueChatNachricht};
use crate::repository::ChatVerlaufRepository;
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{zeit_als_str, zeit_aus_str};

impl ChatVerlaufRepository for SqliteDb {
    async fn nachricht_anhaengen(
        &self,
        nachricht: NeueChatNachricht<'_>,
    ) -> DbResult<ChatNachrichtRecord> {
        let id = Uuid::new_v4();

        sqlx::query(
            "INSERT INTO chat_nachrichten
             (id, raum_code, absender_code, absender_name, text, erstellt_am)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(nachricht.raum_code.als_str())
        .bind(nachricht.absender_code.als_str())
        .bind(nachricht.absender_name)
        .bind(nachricht.text)
        .bind(zeit_als_str(&nachricht.erstellt_am))
        .execute(&self.pool)
        .await?;

        Ok(ChatNachrichtRecord {
            id,
            raum_code: nachricht.raum_code.clone(),
            absender_code: nachricht.absender_code.clone(),
            absender_name: nachricht.absender_name.to_string(),
            text: nachricht.text.to_string(),
            erstellt_am: nachricht.erstellt_am,
        })
    }

    async fn nachrichten_laden(
        &self,
        code: &RaumCode,
        limit: Option<i64>,
    ) -> DbResult<Vec<ChatNachrichtRecord>> {
        let limit = limit.unwrap_or(50);

        let zeilen = sqlx::query(
            "SELECT id, raum_code, absender_code, absender_name, text, erstellt_am
             FROM chat_nachrichten
             WHERE raum_code = ?
             ORDER BY erstellt_am DESC, rowid DESC
             LIMIT ?",
        )
        .bind(code.als_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        // Die Abfrage liefert juengste zuerst (rowid bricht Zeitstempel-
        // Gleichstand); Umkehren ergibt exakte Empfangsreihenfolge
        let mut records = zeilen
            .iter()
            .map(|z| {
                let id = Uuid::parse_str(&z.get::<String, _>("id")).map_err(|e| {
                    crate::error::DbError::UngueltigeDaten(format!("Ungueltige Nachrichten-ID: {}", e))
                })?;
                Ok(ChatNachrichtRecord {
                    id,
                    raum_code: RaumCode(z.get::<String, _>("raum_code")),
                    absender_code: TeilnehmerCode(z.get::<String, _>("absender_code")),
                    absender_name: z.get::<String, _>("absender_name"),
                    text: z.get::<String, _>("text"),
                    erstellt_am: zeit_aus_str(&z.get::<String, _>("erstellt_am"))?,
                })
            })
            .collect::<DbResult<Vec<_>>>()?;
        records.reverse();
        Ok(records)
    }
}
