//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Maximale Frame-Groesse ist konfigurierbar (Standard: 256 KB – Signaling-
//! Payloads mit vollstaendigen SDP-Angeboten bleiben weit darunter).

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::control::ControlMessage;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (256 KB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 256 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// Implementiert `Encoder<ControlMessage>` und `Decoder` fuer nahtlose
/// Integration mit `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = ControlMessage;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        // Maximale Frame-Groesse pruefen
        if length > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                    length, self.max_frame_size
                ),
            ));
        }

        // Pruefen ob der vollstaendige Frame bereits im Buffer ist
        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            // Speicher vorbelegen um Reallocations zu vermeiden
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        // Laengen-Feld verbrauchen
        src.advance(LENGTH_FIELD_SIZE);

        // Payload-Bytes extrahieren
        let payload = src.split_to(length);

        // JSON deserialisieren
        let message: ControlMessage = serde_json::from_slice(&payload).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON-Deserialisierung fehlgeschlagen: {}", e),
            )
        })?;

        Ok(Some(message))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<ControlMessage> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        // JSON serialisieren
        let json = serde_json::to_vec(&item).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON-Serialisierung fehlgeschlagen: {}", e),
            )
        })?;

        // Groesse pruefen
        if json.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                    json.len(),
                    self.max_frame_size
                ),
            ));
        }

        // Laengen-Feld + Payload schreiben
        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlPayload;

    #[test]
    fn encode_decode_roundtrip() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let msg = ControlMessage::ping(42, 123456);
        codec.encode(msg, &mut buf).expect("Encode fehlgeschlagen");

        // Laengen-Feld + Payload muessen im Buffer liegen
        assert!(buf.len() > LENGTH_FIELD_SIZE);

        let decoded = codec
            .decode(&mut buf)
            .expect("Decode fehlgeschlagen")
            .expect("Frame muss vollstaendig sein");
        assert_eq!(decoded.request_id, 42);
        assert!(matches!(decoded.payload, ControlPayload::Ping(_)));
        assert!(buf.is_empty(), "Buffer muss vollstaendig verbraucht sein");
    }

    #[test]
    fn decode_unvollstaendiger_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let msg = ControlMessage::ping(1, 1);
        codec.encode(msg, &mut buf).unwrap();

        // Nur die Haelfte des Frames anliefern
        let halb = buf.split_to(buf.len() / 2);
        let mut teil = halb;
        assert!(codec.decode(&mut teil).unwrap().is_none());
    }

    #[test]
    fn decode_zwei_frames_nacheinander() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode(ControlMessage::ping(1, 10), &mut buf).unwrap();
        codec.encode(ControlMessage::ping(2, 20), &mut buf).unwrap();

        let erster = codec.decode(&mut buf).unwrap().unwrap();
        let zweiter = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(erster.request_id, 1);
        assert_eq!(zweiter.request_id, 2);
    }

    #[test]
    fn zu_grosser_frame_wird_abgelehnt() {
        let mut codec = FrameCodec::with_max_size(16);
        let mut buf = BytesMut::new();

        // Laengen-Feld behauptet 1024 Bytes
        buf.put_u32(1024);
        buf.put_slice(&[0u8; 64]);

        let fehler = codec.decode(&mut buf).unwrap_err();
        assert_eq!(fehler.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn ungueltiges_json_wird_abgelehnt() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let kaputt = b"kein json";
        buf.put_u32(kaputt.len() as u32);
        buf.put_slice(kaputt);

        let fehler = codec.decode(&mut buf).unwrap_err();
        assert_eq!(fehler.kind(), io::ErrorKind::InvalidData);
    }
}
