//! Peer-Links – Media-Verbindungen zu zugelassenen Teilnehmern
//!
//! Der [`PeerLinkManager`] haelt drei Mengen:
//! - zugelassene Teilnehmer (geteilte [`Teilnehmerliste`])
//! - zugelassene Teilnehmer ohne Link, weil noch kein lokaler Stream da ist
//! - aktive Links mit ihrem [`LinkHandle`]
//!
//! Sobald ein lokaler Stream gesetzt wird, bekommen wartende Teilnehmer
//! einen Anruf; bestehende Links tauschen nur die Spur aus und wenden die
//! Qualitaets-Praeferenz der neuen Quelle an.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use perspective_core::roster::Teilnehmerliste;
use perspective_core::types::{MedienQuelle, PeerId, QualitaetsPraeferenz};

use crate::error::SignalingResult;

// ---------------------------------------------------------------------------
// MediaLink
// ---------------------------------------------------------------------------

/// Lokaler ausgehender Media-Stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LokalerStream {
    pub id: String,
    /// Art der Quelle, falls bekannt
    pub quelle: Option<MedienQuelle>,
}

impl LokalerStream {
    pub fn neu(id: impl Into<String>, quelle: Option<MedienQuelle>) -> Self {
        Self {
            id: id.into(),
            quelle,
        }
    }
}

/// Handle eines Media-Links, vom [`MediaLink`] vergeben
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkHandle {
    pub id: String,
    pub peer: PeerId,
}

/// Externe Media-Schicht (Anrufe, Spuren, Bandbreite)
pub trait MediaLink: Send + Sync {
    /// Startet einen Anruf mit dem lokalen Stream
    fn anruf_starten(&self, peer: &PeerId, stream: &LokalerStream) -> SignalingResult<LinkHandle>;

    /// Nimmt einen eingehenden Anruf an
    fn anruf_annehmen(&self, handle: &LinkHandle) -> SignalingResult<()>;

    /// Ersetzt die ausgehende Spur ohne Neuverhandlung
    fn spur_ersetzen(&self, handle: &LinkHandle, stream: &LokalerStream) -> SignalingResult<()>;

    fn qualitaet_anwenden(
        &self,
        handle: &LinkHandle,
        praeferenz: QualitaetsPraeferenz,
    ) -> SignalingResult<()>;
}

// ---------------------------------------------------------------------------
// PeerLinkManager
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LinkZustand {
    ausstehend: BTreeSet<PeerId>,
    aktiv: HashMap<PeerId, LinkHandle>,
    stream: Option<LokalerStream>,
}

/// Verwaltet Media-Links zu zugelassenen Teilnehmern
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct PeerLinkManager {
    media: Arc<dyn MediaLink>,
    teilnehmer: Teilnehmerliste,
    zustand: Arc<Mutex<LinkZustand>>,
}

impl PeerLinkManager {
    pub fn neu(media: Arc<dyn MediaLink>, teilnehmer: Teilnehmerliste) -> Self {
        Self {
            media,
            teilnehmer,
            zustand: Arc::new(Mutex::new(LinkZustand::default())),
        }
    }

    /// Ein Teilnehmer wurde zugelassen
    ///
    /// Ohne lokalen Stream wartet er, bis `stream_setzen` aufgerufen wird.
    pub fn zugelassen(&self, peer: &PeerId) {
        self.teilnehmer.hinzufuegen(peer.clone());
        let mut zustand = self.zustand.lock();
        if zustand.aktiv.contains_key(peer) {
            return;
        }
        match zustand.stream.clone() {
            Some(stream) => {
                if let Some(handle) = self.anrufen(peer, &stream) {
                    zustand.aktiv.insert(peer.clone(), handle);
                } else {
                    zustand.ausstehend.insert(peer.clone());
                }
            }
            None => {
                tracing::debug!(peer = %peer, "Kein lokaler Stream – Teilnehmer wartet");
                zustand.ausstehend.insert(peer.clone());
            }
        }
    }

    /// Setzt oder wechselt den lokalen Stream
    pub fn stream_setzen(&self, stream: LokalerStream) {
        let mut zustand = self.zustand.lock();
        let praeferenz = QualitaetsPraeferenz::fuer_quelle(stream.quelle);

        for (peer, handle) in &zustand.aktiv {
            if let Err(e) = self.media.spur_ersetzen(handle, &stream) {
                tracing::warn!(peer = %peer, fehler = %e, "Spur-Austausch fehlgeschlagen");
                continue;
            }
            if let Err(e) = self.media.qualitaet_anwenden(handle, praeferenz) {
                tracing::warn!(peer = %peer, fehler = %e, "Qualitaets-Praeferenz nicht anwendbar");
            }
        }

        let wartend = std::mem::take(&mut zustand.ausstehend);
        for peer in wartend {
            match self.anrufen(&peer, &stream) {
                Some(handle) => {
                    zustand.aktiv.insert(peer, handle);
                }
                None => {
                    zustand.ausstehend.insert(peer);
                }
            }
        }

        zustand.stream = Some(stream);
    }

    /// Lokaler Stream ist weg; bestehende Links bleiben bestehen
    pub fn stream_entfernen(&self) {
        self.zustand.lock().stream = None;
    }

    /// Ein Media-Link wurde geschlossen
    ///
    /// Der Teilnehmer bekommt keinen neuen Anruf; ein erneuter Beitritt
    /// braucht eine neue Zulassung.
    pub fn link_geschlossen(&self, peer: &PeerId) -> Option<LinkHandle> {
        let handle = self.zustand.lock().aktiv.remove(peer);
        if handle.is_some() {
            tracing::debug!(peer = %peer, "Media-Link geschlossen");
        }
        handle
    }

    /// Entfernt einen Teilnehmer vollstaendig (Datenkanal geschlossen)
    pub fn entfernen(&self, peer: &PeerId) {
        self.teilnehmer.entfernen(peer);
        let mut zustand = self.zustand.lock();
        zustand.ausstehend.remove(peer);
        zustand.aktiv.remove(peer);
    }

    /// Teilnehmer-Seite: eingehenden Anruf annehmen
    pub fn anruf_annehmen(&self, handle: LinkHandle) -> SignalingResult<()> {
        self.media.anruf_annehmen(&handle)?;
        self.zustand
            .lock()
            .aktiv
            .insert(handle.peer.clone(), handle);
        Ok(())
    }

    pub fn ist_aktiv(&self, peer: &PeerId) -> bool {
        self.zustand.lock().aktiv.contains_key(peer)
    }

    pub fn ausstehend(&self) -> Vec<PeerId> {
        self.zustand.lock().ausstehend.iter().cloned().collect()
    }

    pub fn aktive(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.zustand.lock().aktiv.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn teilnehmer(&self) -> &Teilnehmerliste {
        &self.teilnehmer
    }

    fn anrufen(&self, peer: &PeerId, stream: &LokalerStream) -> Option<LinkHandle> {
        let handle = match self.media.anruf_starten(peer, stream) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(peer = %peer, fehler = %e, "Anruf konnte nicht gestartet werden");
                return None;
            }
        };
        let praeferenz = QualitaetsPraeferenz::fuer_quelle(stream.quelle);
        if let Err(e) = self.media.qualitaet_anwenden(&handle, praeferenz) {
            tracing::warn!(peer = %peer, fehler = %e, "Qualitaets-Praeferenz nicht anwendbar");
        }
        tracing::info!(peer = %peer, link = %handle.id, "Media-Anruf gestartet");
        Some(handle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
