//! Wire-Format fuer stream-basierte Transporte (TCP)
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Envelope.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Frames mit unbekanntem oder fehlerhaftem Envelope werden uebersprungen,
//! die Verbindung bleibt bestehen. Nur ueberlange Frames sind fatal.

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::envelope::Envelope;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (64 KB reichen fuer jede Chat-Nachricht)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer `Envelope`-Frames
///
/// Implementiert `Encoder<Envelope>` und `Decoder` fuer
/// `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    verworfen: u64,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            verworfen: 0,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Anzahl bisher uebersprungener Frames
    pub fn verworfen(&self) -> u64 {
        self.verworfen
    }

    fn zu_gross(&self, laenge: usize) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                laenge, self.max_frame_size
            ),
        )
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
    type Item = Envelope;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < LENGTH_FIELD_SIZE {
                return Ok(None);
            }

            let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
            if length > self.max_frame_size {
                return Err(self.zu_gross(length));
            }

            let total_size = LENGTH_FIELD_SIZE + length;
            if src.len() < total_size {
                src.reserve(total_size - src.len());
                return Ok(None);
            }

            src.advance(LENGTH_FIELD_SIZE);
            let payload = src.split_to(length);

            let envelope = serde_json::from_slice::<serde_json::Value>(&payload)
                .ok()
                .and_then(Envelope::aus_wert);
            match envelope {
                Some(envelope) => return Ok(Some(envelope)),
                None => {
                    self.verworfen += 1;
                    tracing::debug!(bytes = length, "Frame ohne bekannten Envelope uebersprungen");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<Envelope> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Envelope, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON-Serialisierung fehlgeschlagen: {}", e),
            )
        })?;

        if json.len() > self.max_frame_size {
            return Err(self.zu_gross(json.len()));
        }

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

    fn roher_frame(json: &str) -> BytesMut {
        let mut buf = BytesMut::new();
        buf.put_u32(json.len() as u32);
        buf.put_slice(json.as_bytes());
        buf
    }

    #[test]
    fn frame_codec_kodiert_laenge_und_payload() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(Envelope::passwort_anfrage("abcd"), &mut buf)
            .unwrap();

        let payload_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
        assert_eq!(buf.len(), LENGTH_FIELD_SIZE + payload_len);

        let decoded = codec.decode(&mut buf).unwrap().expect("Envelope erwartet");
        assert_eq!(decoded, Envelope::passwort_anfrage("abcd"));
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_codec_unvollstaendiger_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Envelope::passwort_bestaetigt(), &mut buf).unwrap();

        let half = buf.len() / 2;
        let mut partial = buf.split_to(half);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn frame_codec_ueberspringt_unbekannte_envelopes() {
        let mut codec = FrameCodec::new();
        let mut buf = roher_frame(r#"{"type":"VOLUME_CHANGED","payload":{}}"#);
        buf.extend_from_slice(&roher_frame("kein json"));
        codec.encode(Envelope::join_anfrage("https://a"), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().expect("Envelope erwartet");
        assert_eq!(decoded, Envelope::join_anfrage("https://a"));
        assert_eq!(codec.verworfen(), 2);
    }

    #[test]
    fn frame_codec_nur_unbekanntes_liefert_none() {
        let mut codec = FrameCodec::new();
        let mut buf = roher_frame(r#"{"type":"X","payload":{}}"#);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_codec_ablehnung_zu_grosser_frame() {
        let mut codec = FrameCodec::with_max_size(100);
        let mut buf = BytesMut::new();
        buf.put_u32(200);
        buf.put_slice(&[b'x'; 200]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn frame_codec_ablehnung_beim_encode_zu_grosse_nachricht() {
        let mut codec = FrameCodec::with_max_size(10);
        let mut buf = BytesMut::new();
        assert!(codec
            .encode(Envelope::join_anfrage("https://perspective.example"), &mut buf)
            .is_err());
    }

    #[test]
    fn frame_codec_mehrere_nachrichten_im_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        for rest in 0..3u32 {
            codec
                .encode(Envelope::passwort_abgelehnt(rest, "Incorrect password"), &mut buf)
                .unwrap();
        }
        for rest in 0..3u32 {
            let msg = codec.decode(&mut buf).unwrap().expect("Nachricht erwartet");
            assert_eq!(msg, Envelope::passwort_abgelehnt(rest, "Incorrect password"));
        }
        assert!(buf.is_empty());
    }
}
