//! videotreff-protocol – Signaling-Protokoll und Wire-Format
//!
//! Dieses Crate definiert alle Nachrichten die zwischen Client und Server
//! ausgetauscht werden (typsicherer Tagged Enum) sowie das frame-basierte
//! Wire-Format (u32-Laenge + JSON) fuer `tokio_util::codec::Framed`.

pub mod control;
pub mod wire;

// Bequeme Re-Exporte
pub use control::{ControlMessage, ControlPayload, ErrorCode};
pub use wire::FrameCodec;
