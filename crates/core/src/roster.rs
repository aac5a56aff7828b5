//! Teilnehmerliste – Menge der zugelassenen Peers einer Sitzung
//!
//! Wird vom `PeerLinkManager` gepflegt und vom Chat-Relay gelesen, um
//! Nachrichten nur an zugelassene Teilnehmer zu verteilen.

use dashmap::DashSet;
use std::sync::Arc;

use crate::types::PeerId;

/// Thread-sichere Menge zugelassener Teilnehmer
///
/// Clone teilt den inneren Zustand.
#[derive(Debug, Clone, Default)]
pub struct Teilnehmerliste {
    inner: Arc<DashSet<PeerId>>,
}

impl Teilnehmerliste {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Fuegt einen Teilnehmer hinzu. `false` wenn bereits enthalten.
    pub fn hinzufuegen(&self, peer: PeerId) -> bool {
        self.inner.insert(peer)
    }

    /// Entfernt einen Teilnehmer. `false` wenn nicht enthalten.
    pub fn entfernen(&self, peer: &PeerId) -> bool {
        self.inner.remove(peer).is_some()
    }

    pub fn enthaelt(&self, peer: &PeerId) -> bool {
        self.inner.contains(peer)
    }

    pub fn anzahl(&self) -> usize {
        self.inner.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.inner.is_empty()
    }

    /// Momentaufnahme aller Teilnehmer, sortiert
    pub fn alle(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.inner.iter().map(|p| p.key().clone()).collect();
        peers.sort();
        peers
    }
}
