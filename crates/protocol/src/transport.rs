//! Transport-Schnittstelle – geordneter, zuverlaessiger Nachrichtenkanal
//!
//! Der Kern setzt einen bereits aufgebauten Datenkanal pro Peer voraus.
//! Eingehende Vorgaenge werden als typisierte [`TransportEreignis`]se ueber
//! eine Queue geliefert; ausgehende Nachrichten laufen ueber [`Transport`].

use perspective_core::types::PeerId;
use thiserror::Error;

use crate::envelope::Envelope;

/// Eingehendes Transport-Ereignis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEreignis {
    /// Datenkanal zu einem Peer ist offen
    Geoeffnet(PeerId),
    /// Bekannter Envelope von einem Peer
    Nachricht { von: PeerId, envelope: Envelope },
    /// Datenkanal wurde geschlossen (lokal oder entfernt)
    Geschlossen(PeerId),
}

impl TransportEreignis {
    pub fn peer(&self) -> &PeerId {
        match self {
            Self::Geoeffnet(peer) | Self::Geschlossen(peer) => peer,
            Self::Nachricht { von, .. } => von,
        }
    }
}

/// Fehler beim Senden
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFehler {
    #[error("Verbindung zu {0} ist geschlossen")]
    Geschlossen(PeerId),

    #[error("Unbekannter Peer: {0}")]
    Unbekannt(PeerId),

    #[error("Send-Queue fuer {0} ist voll")]
    QueueVoll(PeerId),
}

pub type TransportResult<T> = Result<T, TransportFehler>;

/// Ausgehende Seite eines Transports
///
/// `senden` ist aus Sicht der Zustandsmaschinen fire-and-forget: Fehler
/// werden geloggt und als Abbruch der Verbindung behandelt.
pub trait Transport: Send + Sync {
    /// Reiht einen Envelope fuer einen Peer ein
    fn senden(&self, peer: &PeerId, envelope: Envelope) -> TransportResult<()>;

    /// Schliesst den Kanal, nachdem bereits eingereihte Nachrichten
    /// ausgeliefert wurden
    fn schliessen(&self, peer: &PeerId);

    /// Ist der Kanal zu diesem Peer offen?
    fn ist_offen(&self, peer: &PeerId) -> bool;
}
