//! perspective-protocol – Nachrichten und Transport-Schnittstelle
//!
//! Dieses Crate definiert die Envelopes, die zwischen Host und
//! Teilnehmern ueber den Datenkanal ausgetauscht werden, das
//! Frame-Format fuer TCP und die Transport-Abstraktion.

pub mod envelope;
pub mod transport;
pub mod wire;

pub use envelope::{
    Ablehnung, ChatEnvelope, Envelope, JoinAnfrage, Kategorie, Leer, PasswortAbgelehnt,
    PasswortAnfrage, PasswortAntwort, ALGORITHMUS_HMAC_SHA256,
};
pub use transport::{Transport, TransportEreignis, TransportFehler, TransportResult};
pub use wire::FrameCodec;
