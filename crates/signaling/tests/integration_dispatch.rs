//! Integrationstests fuer den MessageDispatcher
//!
//! Simuliert mehrere verbundene Clients ohne TCP: jeder Test-Client hat
//! seinen Teilnehmer-Code, seine Broadcaster-Queue und seinen eigenen
//! DispatcherContext. Die Persistenz laeuft gegen ein In-Memory-Stub-
//! Repository, optional mit erzwungenen Fehlern.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use videotreff_core::types::{RaumCode, TeilnehmerCode, VerbindungsId};
use videotreff_db::error::{DbError, DbResult};
use videotreff_db::models::{ChatNachrichtRecord, NeueChatNachricht, RaumSnapshot};
use videotreff_db::repository::{ChatVerlaufRepository, RaumRepository};
use videotreff_protocol::control::{
    ChatHistoryRequest, ChatSendRequest, ControlMessage, ControlPayload, CreateRoomRequest,
    ErrorCode, JoinRoomRequest, SignalRequest,
};
use videotreff_signaling::dispatcher::{DispatcherContext, MessageDispatcher};
use videotreff_signaling::server_state::{SignalingConfig, SignalingState};

// ---------------------------------------------------------------------------
// Stub-Repository
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StubRepository {
    raeume: Mutex<HashMap<String, RaumSnapshot>>,
    nachrichten: Mutex<Vec<ChatNachrichtRecord>>,
    /// Wenn gesetzt, schlaegt jede Operation fehl
    kaputt: AtomicBool,
}

impl StubRepository {
    fn pruefen(&self) -> DbResult<()> {
        if self.kaputt.load(Ordering::SeqCst) {
            return Err(DbError::Intern("Stub-Fehler".into()));
        }
        Ok(())
    }
}

impl RaumRepository for StubRepository {
    async fn raum_speichern(&self, raum: &RaumSnapshot) -> DbResult<()> {
        self.pruefen()?;
        self.raeume
            .lock()
            .map_err(|_| DbError::Intern("Lock vergiftet".into()))?
            .insert(raum.code.als_str().to_string(), raum.clone());
        Ok(())
    }

    async fn raum_loeschen(&self, code: &RaumCode) -> DbResult<bool> {
        self.pruefen()?;
        Ok(self
            .raeume
            .lock()
            .map_err(|_| DbError::Intern("Lock vergiftet".into()))?
            .remove(code.als_str())
            .is_some())
    }

    async fn raum_laden(&self, code: &RaumCode) -> DbResult<Option<RaumSnapshot>> {
        self.pruefen()?;
        Ok(self
            .raeume
            .lock()
            .map_err(|_| DbError::Intern("Lock vergiftet".into()))?
            .get(code.als_str())
            .cloned())
    }
}

impl ChatVerlaufRepository for StubRepository {
    async fn nachricht_anhaengen(
        &self,
        nachricht: NeueChatNachricht<'_>,
    ) -> DbResult<ChatNachrichtRecord> {
        self.pruefen()?;
        let record = ChatNachrichtRecord {
            id: uuid::Uuid::new_v4(),
            raum_code: nachricht.raum_code.clone(),
            absender_code: nachricht.absender_code.clone(),
            absender_name: nachricht.absender_name.to_string(),
            text: nachricht.text.to_string(),
            erstellt_am: nachricht.erstellt_am,
        };
        self.nachrichten
            .lock()
            .map_err(|_| DbError::Intern("Lock vergiftet".into()))?
            .push(record.clone());
        Ok(record)
    }

    async fn nachrichten_laden(
        &self,
        code: &RaumCode,
        limit: Option<i64>,
    ) -> DbResult<Vec<ChatNachrichtRecord>> {
        self.pruefen()?;
        let mut passend: Vec<ChatNachrichtRecord> = self
            .nachrichten
            .lock()
            .map_err(|_| DbError::Intern("Lock vergiftet".into()))?
            .iter()
            .filter(|n| n.raum_code == *code)
            .cloned()
            .collect();
        passend.sort_by_key(|n| n.erstellt_am);
        if let Some(limit) = limit {
            let ueberschuss = passend.len().saturating_sub(limit as usize);
            passend.drain(..ueberschuss);
        }
        Ok(passend)
    }
}

// ---------------------------------------------------------------------------
// Test-Aufbau
// ---------------------------------------------------------------------------

struct TestClient {
    code: TeilnehmerCode,
    rx: mpsc::Receiver<ControlMessage>,
    ctx: DispatcherContext,
}

struct TestUmgebung {
    state: Arc<SignalingState<StubRepository>>,
    dispatcher: MessageDispatcher<StubRepository>,
}

fn umgebung() -> TestUmgebung {
    let state = SignalingState::neu(SignalingConfig::default(), Arc::new(StubRepository::default()));
    let dispatcher = MessageDispatcher::neu(Arc::clone(&state));
    TestUmgebung { state, dispatcher }
}

fn peer() -> SocketAddr {
    "127.0.0.1:0".parse().expect("gueltige Adresse")
}

impl TestUmgebung {
    /// Simuliert einen frisch verbundenen Client (Code vergeben, Queue registriert)
    fn client(&self) -> TestClient {
        let code = self
            .state
            .allokator
            .teilnehmer_code_vergeben()
            .expect("Code-Vergabe");
        let verbindungs_id = VerbindungsId::new();
        self.state.sessions.registrieren(code.clone(), verbindungs_id);
        let rx = self.state.broadcaster.client_registrieren(code.clone());
        TestClient {
            ctx: DispatcherContext {
                peer_addr: peer(),
                teilnehmer_code: code.clone(),
                verbindungs_id,
            },
            code,
            rx,
        }
    }

    async fn raum_erstellen(&self, client: &TestClient, name: &str) -> RaumCode {
        let antwort = self
            .dispatcher
            .dispatch(
                ControlMessage::new(
                    1,
                    ControlPayload::CreateRoom(CreateRoomRequest { name: name.into() }),
                ),
                &client.ctx,
            )
            .await
            .expect("Antwort erwartet");
        match antwort.payload {
            ControlPayload::RoomCreated(resp) => {
                assert!(resp.ist_host);
                resp.raum_code
            }
            other => panic!("RoomCreated erwartet, war {:?}", other),
        }
    }

    async fn beitreten(&self, client: &TestClient, raum: &RaumCode, name: &str) -> ControlMessage {
        self.dispatcher
            .dispatch(
                ControlMessage::new(
                    2,
                    ControlPayload::JoinRoom(JoinRoomRequest {
                        raum_code: raum.clone(),
                        name: name.into(),
                    }),
                ),
                &client.ctx,
            )
            .await
            .expect("Antwort erwartet")
    }
}

/// Sammelt alle aktuell eingereihten Events eines Clients ein
fn events(client: &mut TestClient) -> Vec<ControlPayload> {
    let mut gesammelt = Vec::new();
    while let Ok(msg) = client.rx.try_recv() {
        gesammelt.push(msg.payload);
    }
    gesammelt
}

/// Laesst die detachten Persistenz-Tasks auf der LocalSet laufen
async fn persistenz_abwarten() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Szenarien
// ---------------------------------------------------------------------------

#[tokio::test]
async fn host_verlaesst_raum_transfer_an_aeltesten() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let host = umg.client();
            let mut zweiter = umg.client();
            let mut dritter = umg.client();

            let raum = umg.raum_erstellen(&host, "Host").await;
            umg.beitreten(&zweiter, &raum, "Zweiter").await;
            umg.beitreten(&dritter, &raum, "Dritter").await;
            // Queues leeren (MemberJoined-Events des Aufbaus)
            events(&mut zweiter);
            events(&mut dritter);

            let antwort = umg
                .dispatcher
                .dispatch(
                    ControlMessage::new(5, ControlPayload::LeaveRoom),
                    &host.ctx,
                )
                .await
                .expect("Antwort erwartet");
            assert!(matches!(antwort.payload, ControlPayload::RoomLeft(_)));

            // Beide Verbleibenden sehen MemberLeft und dann HostChanged
            let erwarteter_host = zweiter.code.clone();
            for client in [&mut zweiter, &mut dritter] {
                let gesehen = events(client);
                assert!(matches!(gesehen[0], ControlPayload::MemberLeft(_)));
                match &gesehen[1] {
                    ControlPayload::HostChanged(ev) => {
                        assert_eq!(ev.neuer_host, erwarteter_host);
                    }
                    other => panic!("HostChanged erwartet, war {:?}", other),
                }
            }
        })
        .await;
}

#[tokio::test]
async fn voller_raum_lehnt_siebten_ohne_mutation_ab() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let host = umg.client();
            let raum = umg.raum_erstellen(&host, "Host").await;

            for i in 1..6 {
                let gast = umg.client();
                let antwort = umg.beitreten(&gast, &raum, &format!("Gast{}", i)).await;
                assert!(matches!(antwort.payload, ControlPayload::RoomJoined(_)));
            }

            let siebter = umg.client();
            let antwort = umg.beitreten(&siebter, &raum, "Zuviel").await;
            match antwort.payload {
                ControlPayload::Error(e) => assert_eq!(e.code, ErrorCode::RoomFull),
                other => panic!("RoomFull-Fehler erwartet, war {:?}", other),
            }
            assert_eq!(umg.state.raeume.mitglieder(&raum).unwrap().len(), 6);
            assert!(umg.state.raeume.raum_von(&siebter.code).is_none());
        })
        .await;
}

#[tokio::test]
async fn signal_relay_stellt_payload_unveraendert_zu() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();
            let mut bernd = umg.client();

            let raum = umg.raum_erstellen(&anna, "Anna").await;
            umg.beitreten(&bernd, &raum, "Bernd").await;
            events(&mut bernd);

            let payload = serde_json::json!({
                "sdp": { "type": "offer", "blob": "v=0 o=- 42" },
                "kandidaten": [1, 2, 3],
            });
            let antwort = umg
                .dispatcher
                .dispatch(
                    ControlMessage::new(
                        9,
                        ControlPayload::Signal(SignalRequest {
                            ziel: bernd.code.clone(),
                            raum_code: raum.clone(),
                            payload: payload.clone(),
                        }),
                    ),
                    &anna.ctx,
                )
                .await;
            // Relay ist stumm
            assert!(antwort.is_none());

            let gesehen = events(&mut bernd);
            match &gesehen[0] {
                ControlPayload::IncomingSignal(ev) => {
                    assert_eq!(ev.von, anna.code);
                    assert_eq!(ev.payload, payload);
                }
                other => panic!("IncomingSignal erwartet, war {:?}", other),
            }
        })
        .await;
}

#[tokio::test]
async fn signal_an_getrenntes_ziel_wird_still_verworfen() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();
            let raum = umg.raum_erstellen(&anna, "Anna").await;

            let antwort = umg
                .dispatcher
                .dispatch(
                    ControlMessage::new(
                        3,
                        ControlPayload::Signal(SignalRequest {
                            ziel: TeilnehmerCode::from("0000"),
                            raum_code: raum,
                            payload: serde_json::json!({ "sdp": "egal" }),
                        }),
                    ),
                    &anna.ctx,
                )
                .await;
            // Kein Fehler, keine Antwort – Verbindungsaufbau-Rennen sind Alltag
            assert!(antwort.is_none());
        })
        .await;
}

#[tokio::test]
async fn letzter_austritt_loescht_raum_und_persistenz() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();
            let raum = umg.raum_erstellen(&anna, "Anna").await;
            persistenz_abwarten().await;
            assert!(umg
                .state
                .db
                .raum_laden(&raum)
                .await
                .unwrap()
                .is_some());

            let antwort = umg
                .dispatcher
                .dispatch(ControlMessage::new(4, ControlPayload::LeaveRoom), &anna.ctx)
                .await
                .expect("Antwort erwartet");
            assert!(matches!(antwort.payload, ControlPayload::RoomLeft(_)));
            persistenz_abwarten().await;

            assert!(!umg.state.raeume.ist_aktiv(&raum));
            assert!(umg.state.db.raum_laden(&raum).await.unwrap().is_none());

            // Der geloeschte Code ist nicht wieder betretbar
            let spaet = umg.client();
            let abgelehnt = umg.beitreten(&spaet, &raum, "Spaet").await;
            match abgelehnt.payload {
                ControlPayload::Error(e) => assert_eq!(e.code, ErrorCode::RoomNotFound),
                other => panic!("RoomNotFound erwartet, war {:?}", other),
            }
        })
        .await;
}

#[tokio::test]
async fn beitritt_migriert_still_aus_altem_raum() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();
            let mut bernd = umg.client();
            let mut clara = umg.client();

            let raum_a = umg.raum_erstellen(&anna, "Anna").await;
            umg.beitreten(&bernd, &raum_a, "Bernd").await;
            let raum_b = umg.raum_erstellen(&clara, "Clara").await;
            events(&mut bernd);

            // Anna wechselt nach B – Raum A erlebt MemberLeft + HostChanged
            let antwort = umg.beitreten(&anna, &raum_b, "Anna").await;
            assert!(matches!(antwort.payload, ControlPayload::RoomJoined(_)));

            let bei_bernd = events(&mut bernd);
            assert!(matches!(bei_bernd[0], ControlPayload::MemberLeft(_)));
            match &bei_bernd[1] {
                ControlPayload::HostChanged(ev) => assert_eq!(ev.neuer_host, bernd.code),
                other => panic!("HostChanged erwartet, war {:?}", other),
            }

            // Clara sieht den Neuzugang
            let bei_clara = events(&mut clara);
            assert!(bei_clara
                .iter()
                .any(|p| matches!(p, ControlPayload::MemberJoined(_))));

            assert_eq!(umg.state.raeume.raum_von(&anna.code), Some(raum_b));
            assert_eq!(umg.state.raeume.mitglieder(&raum_a).unwrap().len(), 1);
        })
        .await;
}

#[tokio::test]
async fn teardown_ist_idempotent() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();
            let mut bernd = umg.client();

            let raum = umg.raum_erstellen(&anna, "Anna").await;
            umg.beitreten(&bernd, &raum, "Bernd").await;
            events(&mut bernd);

            umg.dispatcher.verbindung_abbauen(&anna.code).await;
            umg.dispatcher.verbindung_abbauen(&anna.code).await;

            // Genau ein MemberLeft trotz doppeltem Teardown
            let gesehen = events(&mut bernd);
            let austritte = gesehen
                .iter()
                .filter(|p| matches!(p, ControlPayload::MemberLeft(_)))
                .count();
            assert_eq!(austritte, 1);

            assert!(!umg.state.sessions.ist_verbunden(&anna.code));
            assert!(!umg.state.allokator.ist_teilnehmer_code_vergeben(&anna.code));
        })
        .await;
}

#[tokio::test]
async fn chat_nachricht_erreicht_alle_und_den_verlauf() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();
            let mut bernd = umg.client();

            let raum = umg.raum_erstellen(&anna, "Anna").await;
            umg.beitreten(&bernd, &raum, "Bernd").await;
            events(&mut bernd);

            let antwort = umg
                .dispatcher
                .dispatch(
                    ControlMessage::new(
                        11,
                        ControlPayload::ChatSend(ChatSendRequest {
                            raum_code: raum.clone(),
                            text: "Hallo zusammen".into(),
                        }),
                    ),
                    &anna.ctx,
                )
                .await
                .expect("Antwort erwartet");
            match &antwort.payload {
                ControlPayload::ChatMessage(ev) => {
                    assert_eq!(ev.text, "Hallo zusammen");
                    assert_eq!(ev.absender_name, "Anna");
                }
                other => panic!("ChatMessage erwartet, war {:?}", other),
            }

            let bei_bernd = events(&mut bernd);
            assert!(matches!(bei_bernd[0], ControlPayload::ChatMessage(_)));

            persistenz_abwarten().await;

            let verlauf = umg
                .dispatcher
                .dispatch(
                    ControlMessage::new(
                        12,
                        ControlPayload::ChatHistory(ChatHistoryRequest {
                            raum_code: raum,
                            limit: None,
                        }),
                    ),
                    &bernd.ctx,
                )
                .await
                .expect("Antwort erwartet");
            match verlauf.payload {
                ControlPayload::ChatHistoryResponse(resp) => {
                    assert_eq!(resp.nachrichten.len(), 1);
                    assert_eq!(resp.nachrichten[0].text, "Hallo zusammen");
                }
                other => panic!("ChatHistoryResponse erwartet, war {:?}", other),
            }
        })
        .await;
}

#[tokio::test]
async fn chat_reihenfolge_ist_bei_allen_identisch() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();
            let bernd = umg.client();
            let mut clara = umg.client();
            let mut dora = umg.client();

            let raum = umg.raum_erstellen(&anna, "Anna").await;
            umg.beitreten(&bernd, &raum, "Bernd").await;
            umg.beitreten(&clara, &raum, "Clara").await;
            umg.beitreten(&dora, &raum, "Dora").await;
            events(&mut clara);
            events(&mut dora);

            // Zwei Absender im Wechsel
            let folge = [
                ("a1", &anna),
                ("b1", &bernd),
                ("a2", &anna),
                ("b2", &bernd),
                ("a3", &anna),
            ];
            for (i, (text, absender)) in folge.iter().enumerate() {
                umg.dispatcher
                    .dispatch(
                        ControlMessage::new(
                            20 + i as u32,
                            ControlPayload::ChatSend(ChatSendRequest {
                                raum_code: raum.clone(),
                                text: (*text).into(),
                            }),
                        ),
                        &absender.ctx,
                    )
                    .await
                    .expect("Antwort erwartet");
            }

            let texte = |payloads: Vec<ControlPayload>| -> Vec<String> {
                payloads
                    .into_iter()
                    .filter_map(|p| match p {
                        ControlPayload::ChatMessage(ev) => Some(ev.text),
                        _ => None,
                    })
                    .collect()
            };
            // Beide reinen Empfaenger sehen dieselbe Reihenfolge,
            // und zwar die Reihenfolge der Verarbeitung
            let bei_clara = texte(events(&mut clara));
            let bei_dora = texte(events(&mut dora));
            assert_eq!(bei_clara, vec!["a1", "b1", "a2", "b2", "a3"]);
            assert_eq!(bei_clara, bei_dora);
        })
        .await;
}

#[tokio::test]
async fn doppeltes_leave_bleibt_gutartig() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();
            let raum = umg.raum_erstellen(&anna, "Anna").await;

            let erste = umg
                .dispatcher
                .dispatch(ControlMessage::new(4, ControlPayload::LeaveRoom), &anna.ctx)
                .await
                .expect("Antwort erwartet");
            match erste.payload {
                ControlPayload::RoomLeft(resp) => assert_eq!(resp.raum_code, Some(raum)),
                other => panic!("RoomLeft erwartet, war {:?}", other),
            }

            // Das zweite Leave ist ein No-Op, kein Fehler
            let zweite = umg
                .dispatcher
                .dispatch(ControlMessage::new(5, ControlPayload::LeaveRoom), &anna.ctx)
                .await
                .expect("Antwort erwartet");
            match zweite.payload {
                ControlPayload::RoomLeft(resp) => assert!(resp.raum_code.is_none()),
                other => panic!("RoomLeft erwartet, war {:?}", other),
            }
        })
        .await;
}

#[tokio::test]
async fn persistenz_fehler_blockiert_keine_anfrage() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            umg.state.db.kaputt.store(true, Ordering::SeqCst);

            let anna = umg.client();
            // Raum-Erstellung gelingt obwohl jede Persistenz fehlschlaegt
            let raum = umg.raum_erstellen(&anna, "Anna").await;
            persistenz_abwarten().await;
            assert!(umg.state.raeume.ist_aktiv(&raum));

            // Chat-Senden antwortet weiterhin mit der verteilten Nachricht
            let antwort = umg
                .dispatcher
                .dispatch(
                    ControlMessage::new(
                        7,
                        ControlPayload::ChatSend(ChatSendRequest {
                            raum_code: raum.clone(),
                            text: "trotzdem da".into(),
                        }),
                    ),
                    &anna.ctx,
                )
                .await
                .expect("Antwort erwartet");
            assert!(matches!(antwort.payload, ControlPayload::ChatMessage(_)));

            // Nur der Verlaufs-Abruf meldet den Persistenz-Ausfall
            let verlauf = umg
                .dispatcher
                .dispatch(
                    ControlMessage::new(
                        8,
                        ControlPayload::ChatHistory(ChatHistoryRequest {
                            raum_code: raum,
                            limit: None,
                        }),
                    ),
                    &anna.ctx,
                )
                .await
                .expect("Antwort erwartet");
            match verlauf.payload {
                ControlPayload::Error(e) => assert_eq!(e.code, ErrorCode::InternalError),
                other => panic!("Fehler erwartet, war {:?}", other),
            }
        })
        .await;
}

#[tokio::test]
async fn chat_ausserhalb_des_raums_wird_abgelehnt() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();
            let fremder = umg.client();
            let raum = umg.raum_erstellen(&anna, "Anna").await;

            let antwort = umg
                .dispatcher
                .dispatch(
                    ControlMessage::new(
                        6,
                        ControlPayload::ChatSend(ChatSendRequest {
                            raum_code: raum,
                            text: "reinplatzen".into(),
                        }),
                    ),
                    &fremder.ctx,
                )
                .await
                .expect("Antwort erwartet");
            match antwort.payload {
                ControlPayload::Error(e) => assert_eq!(e.code, ErrorCode::NotInRoom),
                other => panic!("NotInRoom erwartet, war {:?}", other),
            }
        })
        .await;
}

#[tokio::test]
async fn identify_liefert_den_vergebenen_code() {
    LocalSet::new()
        .run_until(async {
            let umg = umgebung();
            let anna = umg.client();

            let antwort = umg
                .dispatcher
                .dispatch(ControlMessage::new(1, ControlPayload::Identify), &anna.ctx)
                .await
                .expect("Antwort erwartet");
            match antwort.payload {
                ControlPayload::IdentityAssigned(zu) => {
                    assert_eq!(zu.teilnehmer_code, anna.code)
                }
                other => panic!("IdentityAssigned erwartet, war {:?}", other),
            }
        })
        .await;
}
