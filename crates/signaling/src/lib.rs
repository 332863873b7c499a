//! videotreff-signaling – TCP Control Layer
//!
//! Dieser Crate implementiert den Koordinations- und Signal-Relay-Service
//! fuer Videotreff. Er verwaltet TCP-Verbindungen, vergibt Teilnehmer-
//! Codes, haelt den autoritative Raum-Zustand und leitet opake
//! WebRTC-Signale zwischen Teilnehmern weiter.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Lebenszyklus: Accept -> Code vergeben -> Anfrage-Loop -> Teardown
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- RaumHandler    (Create, Join, Leave, DisplayName)
//!     +-- SignalHandler  (opakes SDP/ICE-Relay)
//!     +-- ChatHandler    (Senden, Verlauf)
//!
//! CodeAllokator    – Teilnehmer- und Raum-Codes vergeben/freigeben
//! RaumRegistry     – Autoritative Raum-Zustands-Quelle
//! SessionTracker   – Wer ist verbunden, unter welchem Namen
//! EventBroadcaster – Events an alle relevanten Clients senden
//! ```

pub mod broadcast;
pub mod codes;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod rooms;
pub mod server_state;
pub mod sessions;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use codes::CodeAllokator;
pub use connection::ClientConnection;
pub use dispatcher::{DispatcherContext, MessageDispatcher};
pub use error::{SignalingError, SignalingResult};
pub use rooms::{RaumRegistry, VerlassenErgebnis};
pub use server_state::{SignalingConfig, SignalingState};
pub use sessions::SessionTracker;
pub use tcp::SignalingServer;
