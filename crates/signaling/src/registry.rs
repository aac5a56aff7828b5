//! Peer-Registry – Send-Queues aller offenen Datenkanaele
//!
//! Jede Verbindung (TCP oder Speicher) registriert sich hier und liest
//! ihre ausgehenden Envelopes aus der zurueckgegebenen Queue. Die Registry
//! implementiert [`Transport`] fuer die Zustandsmaschinen.
//!
//! ## Schliessen
//! `schliessen` entfernt den Sender. Der Kanal liefert danach noch alle
//! bereits eingereihten Envelopes und meldet erst dann `None`, so dass eine
//! Ablehnung vor dem Abbau ausgeliefert wird.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use perspective_core::types::PeerId;
use perspective_protocol::{Envelope, Transport, TransportFehler, TransportResult};
use tokio::sync::mpsc;

/// Groesse der Send-Queue pro Peer
const SEND_QUEUE_GROESSE: usize = 64;

/// Registry der Send-Queues, indiziert nach PeerId
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<DashMap<PeerId, mpsc::Sender<Envelope>>>,
}

impl PeerRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert einen Peer und gibt seine Sende-Queue zurueck
    ///
    /// Eine bestehende Registrierung fuer dieselbe PeerId wird ersetzt.
    pub fn registrieren(&self, peer: PeerId) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        tracing::debug!(peer = %peer, "Peer in Registry registriert");
        self.inner.insert(peer, tx);
        rx
    }

    /// Registriert einen Peer nur, wenn die PeerId frei ist
    ///
    /// Pruefung und Eintrag laufen unter demselben Shard-Lock. Ein Eintrag,
    /// dessen Empfaenger bereits weg ist, gilt als frei.
    pub fn registrieren_falls_frei(&self, peer: PeerId) -> Option<mpsc::Receiver<Envelope>> {
        match self.inner.entry(peer) {
            Entry::Occupied(mut eintrag) => {
                if !eintrag.get().is_closed() {
                    return None;
                }
                let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
                tracing::debug!(peer = %eintrag.key(), "Verwaisten Registry-Eintrag ersetzt");
                eintrag.insert(tx);
                Some(rx)
            }
            Entry::Vacant(eintrag) => {
                let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
                tracing::debug!(peer = %eintrag.key(), "Peer in Registry registriert");
                eintrag.insert(tx);
                Some(rx)
            }
        }
    }

    pub fn anzahl(&self) -> usize {
        self.inner.len()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.inner.iter().map(|e| e.key().clone()).collect();
        peers.sort();
        peers
    }

    /// Schliesst alle registrierten Kanaele
    pub fn alle_schliessen(&self) {
        self.inner.clear();
    }
}

impl Transport for PeerRegistry {
    fn senden(&self, peer: &PeerId, envelope: Envelope) -> TransportResult<()> {
        let Some(tx) = self.inner.get(peer) else {
            tracing::debug!(peer = %peer, "Senden an unbekannten Peer");
            return Err(TransportFehler::Unbekannt(peer.clone()));
        };
        match tx.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(peer = %peer, "Send-Queue voll – Nachricht verworfen");
                Err(TransportFehler::QueueVoll(peer.clone()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(peer = %peer, "Send-Queue geschlossen (Peer getrennt)");
                Err(TransportFehler::Geschlossen(peer.clone()))
            }
        }
    }

    fn schliessen(&self, peer: &PeerId) {
        if self.inner.remove(peer).is_some() {
            tracing::debug!(peer = %peer, "Kanal geschlossen");
        }
    }

    fn ist_offen(&self, peer: &PeerId) -> bool {
        self.inner
            .get(peer)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
