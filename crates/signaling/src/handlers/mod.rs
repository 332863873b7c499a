//! Handler fuer alle Control-Nachrichten
//!
//! Jeder Handler ist fuer einen bestimmten Nachrichtentyp zustaendig
//! und hat Zugriff auf den gemeinsamen SignalingState.

pub mod chat_handler;
pub mod raum_handler;
pub mod signal_handler;
