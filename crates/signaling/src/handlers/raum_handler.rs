//! Raum-Handler – Erstellen, Beitreten, Verlassen, Namensaenderung
//!
//! Routet Raum-Anfragen ueber die RaumRegistry, verteilt die
//! resultierenden Events an alle betroffenen Mitglieder und stoesst die
//! best-effort Persistenz der Schnappschuesse an.
//!
//! ## Event-Reihenfolge
//! Registry-Mutation und Fanout laufen ohne Await-Punkt dazwischen:
//! innerhalb eines Raums sehen alle Mitglieder die Events in derselben
//! Reihenfolge. Erst danach wird der Schnappschuss asynchron persistiert.

use std::sync::Arc;
use videotreff_core::types::TeilnehmerCode;
use videotreff_db::models::{MitgliedRecord, RaumSnapshot};
use videotreff_db::repository::{ChatVerlaufRepository, RaumRepository};
use videotreff_protocol::control::{
    ControlMessage, ControlPayload, CreateRoomRequest, ErrorCode, HostChangedEvent,
    JoinRoomRequest, MemberInfo, MemberJoinedEvent, MemberLeftEvent, RoomCreatedResponse,
    RoomJoinedResponse, RoomLeftResponse, RoomUpdatedEvent, SetDisplayNameRequest,
};

use crate::error::SignalingError;
use crate::rooms::{Mitglied, RaumInfo, VerlassenErgebnis};
use crate::server_state::SignalingState;

/// Verarbeitet eine Raum-Erstellung
pub async fn handle_create_room<R>(
    request: CreateRoomRequest,
    request_id: u32,
    teilnehmer: &TeilnehmerCode,
    state: &Arc<SignalingState<R>>,
) -> ControlMessage
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    state.sessions.name_setzen(teilnehmer, &request.name);

    let ergebnis = match state.raeume.erstellen(teilnehmer.clone(), request.name) {
        Ok(e) => e,
        Err(fehler) => {
            tracing::warn!(teilnehmer = %teilnehmer, fehler = %fehler, "Raum-Erstellung fehlgeschlagen");
            return fehler_antwort(request_id, &fehler);
        }
    };

    // Stille Migration: der alte Raum bekommt seine Abschieds-Events
    if let Some((_, alt_ergebnis)) = &ergebnis.verlassen_von {
        verlassen_verteilen(teilnehmer, alt_ergebnis, state);
    }

    raum_persistieren(&ergebnis.raum, state);

    let raum = ergebnis.raum;
    tracing::debug!(raum = %raum.code, host = %teilnehmer, "Raum-Erstellung bestaetigt");
    ControlMessage::new(
        request_id,
        ControlPayload::RoomCreated(RoomCreatedResponse {
            raum_code: raum.code.clone(),
            teilnehmer_code: teilnehmer.clone(),
            ist_host: true,
            teilnehmer_anzahl: raum.teilnehmer_anzahl(),
            mitglieder: mitglieder_infos(&raum.mitglieder),
        }),
    )
}

/// Verarbeitet einen Raum-Beitritt
pub async fn handle_join_room<R>(
    request: JoinRoomRequest,
    request_id: u32,
    teilnehmer: &TeilnehmerCode,
    state: &Arc<SignalingState<R>>,
) -> ControlMessage
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    state.sessions.name_setzen(teilnehmer, &request.name);

    let name = request.name.clone();
    let ergebnis = match state
        .raeume
        .beitreten(&request.raum_code, teilnehmer.clone(), request.name)
    {
        Ok(e) => e,
        Err(fehler) => {
            tracing::debug!(
                teilnehmer = %teilnehmer,
                raum = %request.raum_code,
                fehler = %fehler,
                "Raum-Beitritt abgelehnt"
            );
            return fehler_antwort(request_id, &fehler);
        }
    };

    if let Some((_, alt_ergebnis)) = &ergebnis.verlassen_von {
        verlassen_verteilen(teilnehmer, alt_ergebnis, state);
    }

    let raum = ergebnis.raum;

    // Bestandsmitglieder ueber den Neuzugang informieren
    let infos = mitglieder_infos(&raum.mitglieder);
    state.broadcaster.an_mitglieder_ausser_senden(
        &raum.mitglieder,
        teilnehmer,
        ControlMessage::event(ControlPayload::MemberJoined(MemberJoinedEvent {
            raum_code: raum.code.clone(),
            teilnehmer_code: teilnehmer.clone(),
            name,
            mitglieder: infos.clone(),
            teilnehmer_anzahl: raum.teilnehmer_anzahl(),
        })),
    );

    raum_persistieren(&raum, state);

    let ist_host = raum
        .mitglieder
        .iter()
        .any(|m| m.teilnehmer_code == *teilnehmer && m.ist_host);

    tracing::debug!(raum = %raum.code, teilnehmer = %teilnehmer, "Raum-Beitritt bestaetigt");
    ControlMessage::new(
        request_id,
        ControlPayload::RoomJoined(RoomJoinedResponse {
            raum_code: raum.code.clone(),
            teilnehmer_code: teilnehmer.clone(),
            ist_host,
            teilnehmer_anzahl: raum.teilnehmer_anzahl(),
            mitglieder: infos,
        }),
    )
}

/// Verarbeitet ein explizites Raum-Verlassen
///
/// Ohne aktuelle Mitgliedschaft ist das ein No-Op und wird gutartig mit
/// `RoomLeft { raum_code: None }` beantwortet: wacklige Transporte
/// liefern Leave-Signale gerne doppelt.
pub async fn handle_leave_room<R>(
    request_id: u32,
    teilnehmer: &TeilnehmerCode,
    state: &Arc<SignalingState<R>>,
) -> ControlMessage
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    let raum_code = match state.raeume.aktuellen_raum_verlassen(teilnehmer) {
        Some((raum_code, ergebnis)) => {
            verlassen_verteilen(teilnehmer, &ergebnis, state);
            Some(raum_code)
        }
        None => {
            tracing::debug!(teilnehmer = %teilnehmer, "Leave ohne Mitgliedschaft (No-Op)");
            None
        }
    };
    ControlMessage::new(
        request_id,
        ControlPayload::RoomLeft(RoomLeftResponse { raum_code }),
    )
}

/// Verarbeitet eine Anzeigenamens-Aenderung
///
/// Fire-and-forget: es gibt keine direkte Antwort. Ist der Teilnehmer in
/// einem Raum, bekommen alle Mitglieder (ihn eingeschlossen) den frischen
/// Schnappschuss als `RoomUpdated`.
pub async fn handle_set_display_name<R>(
    request: SetDisplayNameRequest,
    teilnehmer: &TeilnehmerCode,
    state: &Arc<SignalingState<R>>,
) where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    state.sessions.name_setzen(teilnehmer, &request.name);

    if let Some(raum) = state.raeume.name_aktualisieren(teilnehmer, &request.name) {
        raum_update_verteilen(&raum, state);
        raum_persistieren(&raum, state);
    }
    tracing::debug!(teilnehmer = %teilnehmer, name = %request.name, "Anzeigename gesetzt");
}

// ---------------------------------------------------------------------------
// Gemeinsame Bausteine (auch vom Teardown genutzt)
// ---------------------------------------------------------------------------

/// Verteilt die Events eines Raum-Verlassens und persistiert das Ergebnis
///
/// Deckt beide Ausgaenge ab: verbleibende Mitglieder bekommen `MemberLeft`
/// (plus `HostChanged` wenn der Transfer gefeuert hat), ein geloeschter
/// Raum wird aus der Persistenz entfernt.
pub fn verlassen_verteilen<R>(
    teilnehmer: &TeilnehmerCode,
    ergebnis: &VerlassenErgebnis,
    state: &Arc<SignalingState<R>>,
) where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    match ergebnis {
        VerlassenErgebnis::NichtMitglied => {}
        VerlassenErgebnis::Entfernt { raum, neuer_host } => {
            let infos = mitglieder_infos(&raum.mitglieder);
            state.broadcaster.an_mitglieder_senden(
                &raum.mitglieder,
                ControlMessage::event(ControlPayload::MemberLeft(MemberLeftEvent {
                    raum_code: raum.code.clone(),
                    teilnehmer_code: teilnehmer.clone(),
                    mitglieder: infos,
                    teilnehmer_anzahl: raum.teilnehmer_anzahl(),
                })),
            );
            if let Some(neuer_host) = neuer_host {
                state.broadcaster.an_mitglieder_senden(
                    &raum.mitglieder,
                    ControlMessage::event(ControlPayload::HostChanged(HostChangedEvent {
                        raum_code: raum.code.clone(),
                        neuer_host: neuer_host.clone(),
                    })),
                );
            }
            raum_persistieren(raum, state);
        }
        VerlassenErgebnis::RaumGeloescht { raum_code } => {
            let db = Arc::clone(&state.db);
            let raum_code = raum_code.clone();
            tokio::task::spawn_local(async move {
                match db.raum_loeschen(&raum_code).await {
                    Ok(_) => {}
                    Err(fehler) => {
                        tracing::warn!(raum = %raum_code, fehler = %fehler, "Raum-Loeschung nicht persistiert");
                    }
                }
            });
        }
    }
}

/// Verteilt den frischen Mitglieder-Schnappschuss an alle Mitglieder
pub fn raum_update_verteilen<R>(raum: &RaumInfo, state: &Arc<SignalingState<R>>)
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    state.broadcaster.an_mitglieder_senden(
        &raum.mitglieder,
        ControlMessage::event(ControlPayload::RoomUpdated(RoomUpdatedEvent {
            raum_code: raum.code.clone(),
            mitglieder: mitglieder_infos(&raum.mitglieder),
            teilnehmer_anzahl: raum.teilnehmer_anzahl(),
        })),
    );
}

/// Persistiert einen Raum-Schnappschuss im Hintergrund (best-effort)
///
/// Laeuft als eigener Task auf dem LocalSet: ein Persistenz-Fehler wird
/// geloggt und rollt den In-Memory-Zustand nie zurueck.
pub fn raum_persistieren<R>(raum: &RaumInfo, state: &Arc<SignalingState<R>>)
where
    R: RaumRepository + ChatVerlaufRepository + 'static,
{
    let Some(host_code) = raum.host_code.clone() else {
        // Raum ohne Host existiert nur fluechtig waehrend der Loeschung
        return;
    };
    let snapshot = RaumSnapshot {
        code: raum.code.clone(),
        host_code,
        erstellt_am: raum.erstellt_am,
        ist_aktiv: true,
        mitglieder: raum
            .mitglieder
            .iter()
            .map(|m| MitgliedRecord {
                teilnehmer_code: m.teilnehmer_code.clone(),
                name: m.name.clone(),
                beigetreten_am: m.beigetreten_am,
                ist_host: m.ist_host,
            })
            .collect(),
    };
    let db = Arc::clone(&state.db);
    tokio::task::spawn_local(async move {
        if let Err(fehler) = db.raum_speichern(&snapshot).await {
            tracing::warn!(raum = %snapshot.code, fehler = %fehler, "Raum-Schnappschuss nicht persistiert");
        }
    });
}

/// Konvertiert Registry-Mitglieder in die Protokoll-Form
pub fn mitglieder_infos(mitglieder: &[Mitglied]) -> Vec<MemberInfo> {
    mitglieder
        .iter()
        .map(|m| MemberInfo {
            teilnehmer_code: m.teilnehmer_code.clone(),
            name: m.name.clone(),
            ist_host: m.ist_host,
            beigetreten_am: m.beigetreten_am.to_rfc3339(),
        })
        .collect()
}

/// Uebersetzt einen Signaling-Fehler in die Protokoll-Fehlerantwort
fn fehler_antwort(request_id: u32, fehler: &SignalingError) -> ControlMessage {
    let (code, nachricht) = match fehler {
        SignalingError::RaumNichtGefunden(code) => (
            ErrorCode::RoomNotFound,
            format!("Raum {} existiert nicht", code),
        ),
        SignalingError::RaumVoll(kapazitaet) => (
            ErrorCode::RoomFull,
            format!("Raum ist voll (maximal {} Teilnehmer)", kapazitaet),
        ),
        SignalingError::CodesErschoepft { .. } => (
            ErrorCode::CodesExhausted,
            "Keine freien Codes verfuegbar".to_string(),
        ),
        _ => (ErrorCode::InternalError, "Interner Fehler".to_string()),
    };
    ControlMessage::error(request_id, code, nachricht)
}
