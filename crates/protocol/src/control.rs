//! Control-Protokoll (TCP)
//!
//! Definiert alle Signaling- und Session-Nachrichten die ueber die
//! TCP-Verbindung zwischen Client und Server ausgetauscht werden.
//!
//! ## Design
//! - Request/Response Pattern: jede Nachricht hat eine `request_id: u32`
//! - JSON-Serialisierung via serde (nicht zeitkritisch)
//! - Tagged Enums fuer typsichere Nachrichtentypen
//! - Das WebRTC-Signal-Payload ist ein opaker `serde_json::Value` und wird
//!   vom Server nie inspiziert – es gehoert der Peer-Connection-Schicht
//!   auf beiden Seiten

use serde::{Deserialize, Serialize};
use videotreff_core::types::{RaumCode, TeilnehmerCode};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Allgemein
    InternalError,
    InvalidRequest,
    // Raum
    RoomNotFound,
    RoomFull,
    NotInRoom,
    // Code-Vergabe
    CodesExhausted,
}

// ---------------------------------------------------------------------------
// Identitaets-Nachrichten
// ---------------------------------------------------------------------------

/// Zuweisung des Teilnehmer-Codes nach dem Verbindungsaufbau
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityAssigned {
    /// Zugewiesener 4-stelliger Teilnehmer-Code
    pub teilnehmer_code: TeilnehmerCode,
}

/// Setzt den Anzeigenamen eines Teilnehmers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDisplayNameRequest {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Raum-Nachrichten
// ---------------------------------------------------------------------------

/// Mitglieds-Informationen fuer Raum-Antworten und Broadcasts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInfo {
    pub teilnehmer_code: TeilnehmerCode,
    pub name: String,
    pub ist_host: bool,
    /// Beitrittszeitpunkt (RFC 3339)
    pub beigetreten_am: String,
}

/// Raum erstellen (der Ersteller wird Host und einziges Mitglied)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
}

/// Bestaetigung der Raum-Erstellung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCreatedResponse {
    pub raum_code: RaumCode,
    pub teilnehmer_code: TeilnehmerCode,
    pub ist_host: bool,
    pub mitglieder: Vec<MemberInfo>,
    pub teilnehmer_anzahl: usize,
}

/// Bestehendem Raum beitreten
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomRequest {
    pub raum_code: RaumCode,
    pub name: String,
}

/// Bestaetigung des Raum-Beitritts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoinedResponse {
    pub raum_code: RaumCode,
    pub teilnehmer_code: TeilnehmerCode,
    pub ist_host: bool,
    pub mitglieder: Vec<MemberInfo>,
    pub teilnehmer_anzahl: usize,
}

/// Bestaetigung des Raum-Verlassens
///
/// `raum_code` ist `None` wenn der Teilnehmer in keinem Raum war:
/// doppelte Leave-Signale von wackligen Transporten werden gutartig
/// beantwortet, nicht mit einem Fehler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomLeftResponse {
    pub raum_code: Option<RaumCode>,
}

// ---------------------------------------------------------------------------
// Raum-Events (Server -> Client)
// ---------------------------------------------------------------------------

/// Ein Teilnehmer ist dem Raum beigetreten
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberJoinedEvent {
    pub raum_code: RaumCode,
    pub teilnehmer_code: TeilnehmerCode,
    pub name: String,
    pub mitglieder: Vec<MemberInfo>,
    pub teilnehmer_anzahl: usize,
}

/// Ein Teilnehmer hat den Raum verlassen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberLeftEvent {
    pub raum_code: RaumCode,
    pub teilnehmer_code: TeilnehmerCode,
    pub mitglieder: Vec<MemberInfo>,
    pub teilnehmer_anzahl: usize,
}

/// Der Host hat gewechselt (aeltestes verbleibendes Mitglied uebernimmt)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostChangedEvent {
    pub raum_code: RaumCode,
    pub neuer_host: TeilnehmerCode,
}

/// Vollstaendiger Mitglieder-Schnappschuss nach jeder Aenderung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomUpdatedEvent {
    pub raum_code: RaumCode,
    pub mitglieder: Vec<MemberInfo>,
    pub teilnehmer_anzahl: usize,
}

// ---------------------------------------------------------------------------
// WebRTC-Signal-Relay
// ---------------------------------------------------------------------------

/// Opakes Signal an einen anderen Teilnehmer weiterleiten
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRequest {
    /// Ziel-Teilnehmer
    pub ziel: TeilnehmerCode,
    pub raum_code: RaumCode,
    /// Opakes SDP/ICE-Payload der Peer-Connection-Bibliothek
    pub payload: serde_json::Value,
}

/// Eingehendes Signal von einem anderen Teilnehmer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingSignalEvent {
    /// Absender des Signals
    pub von: TeilnehmerCode,
    pub raum_code: RaumCode,
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Chat-Nachrichten
// ---------------------------------------------------------------------------

/// Chat-Nachricht in den aktuellen Raum senden
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSendRequest {
    pub raum_code: RaumCode,
    pub text: String,
}

/// Chat-Nachricht an alle Mitglieder eines Raums
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageEvent {
    pub raum_code: RaumCode,
    pub absender_code: TeilnehmerCode,
    pub absender_name: String,
    pub text: String,
    /// Empfangszeitpunkt am Server (RFC 3339)
    pub zeitstempel: String,
}

/// Chat-Verlauf eines Raums anfragen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistoryRequest {
    pub raum_code: RaumCode,
    /// Maximale Anzahl (Default: 50)
    pub limit: Option<i64>,
}

/// Chat-Verlauf (chronologisch, aelteste zuerst)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistoryResponse {
    pub raum_code: RaumCode,
    pub nachrichten: Vec<ChatMessageEvent>,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Keepalive-Ping (beide Richtungen)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMessage {
    pub timestamp_ms: u64,
}

/// Antwort auf einen Ping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongMessage {
    pub echo_timestamp_ms: u64,
    pub server_timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler-Antwort auf eine fehlgeschlagene Anfrage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: ControlMessage
// ---------------------------------------------------------------------------

/// Alle moeglichen Control-Nachrichten (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPayload {
    // Identitaet
    Identify,
    IdentityAssigned(IdentityAssigned),
    SetDisplayName(SetDisplayNameRequest),

    // Raum
    CreateRoom(CreateRoomRequest),
    RoomCreated(RoomCreatedResponse),
    JoinRoom(JoinRoomRequest),
    RoomJoined(RoomJoinedResponse),
    LeaveRoom,
    RoomLeft(RoomLeftResponse),

    // Raum-Events
    MemberJoined(MemberJoinedEvent),
    MemberLeft(MemberLeftEvent),
    HostChanged(HostChangedEvent),
    RoomUpdated(RoomUpdatedEvent),

    // WebRTC-Signal-Relay
    Signal(SignalRequest),
    IncomingSignal(IncomingSignalEvent),

    // Chat
    ChatSend(ChatSendRequest),
    ChatMessage(ChatMessageEvent),
    ChatHistory(ChatHistoryRequest),
    ChatHistoryResponse(ChatHistoryResponse),

    // Keepalive
    Ping(PingMessage),
    Pong(PongMessage),

    // Fehler
    Error(ErrorResponse),
}

/// Control-Protokoll-Nachricht mit Request/Response-Zuordnung
///
/// Jede Nachricht traegt eine `request_id` die der Client vergibt.
/// Der Server kopiert die ID in die Antwort damit der Client Request und
/// Response zuordnen kann. Server-initiierte Events tragen die ID 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    /// Eindeutige Nachrichten-ID fuer Request/Response-Zuordnung
    pub request_id: u32,
    /// Inhalt der Nachricht
    pub payload: ControlPayload,
}

impl ControlMessage {
    /// Erstellt eine neue Control-Nachricht
    pub fn new(request_id: u32, payload: ControlPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Erstellt ein Server-Event (request_id 0)
    pub fn event(payload: ControlPayload) -> Self {
        Self::new(0, payload)
    }

    /// Erstellt eine Ping-Nachricht
    pub fn ping(request_id: u32, timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Ping(PingMessage { timestamp_ms }),
        )
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(request_id: u32, echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            ControlPayload::Pong(PongMessage {
                echo_timestamp_ms,
                server_timestamp_ms,
            }),
        )
    }

    /// Erstellt eine Fehler-Antwort
    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            ControlPayload::Error(ErrorResponse {
                code,
                message: message.into(),
                details: None,
            }),
        )
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
