//! Kapazitaets-Tabelle – einzige geteilte Sperre der Zulassung
//!
//! Zaehlt zugelassene Teilnehmer und solche, die sich gerade
//! authentifizieren. Pruefen und Reservieren passieren unter einer
//! Sperre, damit gleichzeitige Beitritte das Maximum nicht ueberschreiten.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use perspective_core::types::PeerId;

/// Belegung eines Slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotZustand {
    /// Teilnehmer ist mitten in der Authentifizierung
    Authentifizierung,
    /// Teilnehmer ist zugelassen
    Zugelassen,
}

struct KapazitaetInner {
    max: usize,
    slots: HashMap<PeerId, SlotZustand>,
}

/// Geteilte Kapazitaets-Tabelle des Hosts
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct KapazitaetsTabelle {
    inner: Arc<Mutex<KapazitaetInner>>,
}

impl KapazitaetsTabelle {
    pub fn neu(max: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(KapazitaetInner {
                max,
                slots: HashMap::new(),
            })),
        }
    }

    /// Reserviert atomar einen Slot
    ///
    /// Gibt `false` zurueck, wenn die Tabelle voll ist. Ein Peer, der
    /// bereits einen Slot haelt, bekommt keinen zweiten.
    pub fn reservieren(&self, peer: &PeerId) -> bool {
        let mut inner = self.inner.lock();
        if inner.slots.contains_key(peer) {
            return true;
        }
        if inner.slots.len() >= inner.max {
            return false;
        }
        inner
            .slots
            .insert(peer.clone(), SlotZustand::Authentifizierung);
        true
    }

    /// Markiert einen reservierten Slot als zugelassen
    pub fn bestaetigen(&self, peer: &PeerId) -> bool {
        match self.inner.lock().slots.get_mut(peer) {
            Some(slot) => {
                *slot = SlotZustand::Zugelassen;
                true
            }
            None => false,
        }
    }

    /// Gibt einen Slot frei
    pub fn freigeben(&self, peer: &PeerId) -> Option<SlotZustand> {
        self.inner.lock().slots.remove(peer)
    }

    pub fn zustand(&self, peer: &PeerId) -> Option<SlotZustand> {
        self.inner.lock().slots.get(peer).copied()
    }

    /// Belegte Slots (zugelassen + in Authentifizierung)
    pub fn belegt(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn zugelassen(&self) -> usize {
        self.inner
            .lock()
            .slots
            .values()
            .filter(|s| **s == SlotZustand::Zugelassen)
            .count()
    }

    pub fn max(&self) -> usize {
        self.inner.lock().max
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
