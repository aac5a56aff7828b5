//! Media-Link ohne Medien
//!
//! Der Host-Prozess betreibt nur Signalisierung. Anrufe werden vergeben
//! und geloggt, aber nicht aufgebaut.

use std::sync::atomic::{AtomicU64, Ordering};

use perspective_core::types::{PeerId, QualitaetsPraeferenz};
use perspective_signaling::{LinkHandle, LokalerStream, MediaLink, SignalingResult};

#[derive(Default)]
pub struct ProtokollMediaLink {
    naechste_id: AtomicU64,
}

impl MediaLink for ProtokollMediaLink {
    fn anruf_starten(&self, peer: &PeerId, stream: &LokalerStream) -> SignalingResult<LinkHandle> {
        let id = self.naechste_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(peer = %peer, stream = %stream.id, link = id, "Anruf gestartet");
        Ok(LinkHandle {
            id: format!("link-{id}"),
            peer: peer.clone(),
        })
    }

    fn anruf_annehmen(&self, handle: &LinkHandle) -> SignalingResult<()> {
        tracing::info!(peer = %handle.peer, link = %handle.id, "Anruf angenommen");
        Ok(())
    }

    fn spur_ersetzen(&self, handle: &LinkHandle, stream: &LokalerStream) -> SignalingResult<()> {
        tracing::info!(link = %handle.id, stream = %stream.id, "Spur ersetzt");
        Ok(())
    }

    fn qualitaet_anwenden(
        &self,
        handle: &LinkHandle,
        praeferenz: QualitaetsPraeferenz,
    ) -> SignalingResult<()> {
        tracing::debug!(link = %handle.id, praeferenz = ?praeferenz, "Qualitaets-Praeferenz gesetzt");
        Ok(())
    }
}
