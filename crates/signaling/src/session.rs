//! Sitzungs-Task – ein tokio-Task pro geoeffnetem Datenkanal
//!
//! Der Task besitzt die [`ParticipantSession`] des Peers, liest
//! [`SitzungsEingang`]e aus seiner Queue und fuehrt die gelieferten
//! [`Aktion`]en aus. Uebergaenge eines Peers sind dadurch serialisiert,
//! verschiedene Peers laufen parallel.
//!
//! ## Join-Frist
//! Ist die Sitzung nach `join_timeout` weder zugelassen noch abgelehnt,
//! wird sie still abgebrochen und der Kanal geschlossen.

use std::sync::Arc;

use perspective_core::types::PeerId;
use perspective_protocol::Transport;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::admission::{AdmissionController, Aktion, ParticipantSession, SitzungsEingang};
use crate::host::HostEreignis;
use crate::peer_link::PeerLinkManager;

/// Groesse der Eingangs-Queue pro Sitzung
const EINGANG_QUEUE_GROESSE: usize = 16;

/// Alles, was ein Sitzungs-Task zum Ausfuehren seiner Aktionen braucht
#[derive(Clone)]
pub(crate) struct SitzungsKontext {
    pub controller: AdmissionController,
    pub transport: Arc<dyn Transport>,
    pub peer_links: PeerLinkManager,
    pub ereignisse: broadcast::Sender<HostEreignis>,
}

/// Startet den Task fuer einen frisch geoeffneten Kanal
///
/// Wird der zurueckgegebene Sender fallen gelassen, behandelt der Task das
/// wie ein Schliessen des Kanals.
pub(crate) fn sitzung_starten(
    peer: PeerId,
    kontext: SitzungsKontext,
) -> (mpsc::Sender<SitzungsEingang>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(EINGANG_QUEUE_GROESSE);
    let sitzung = kontext.controller.sitzung_erstellen(peer);
    let handle = tokio::spawn(sitzung_betreiben(sitzung, rx, kontext));
    (tx, handle)
}

async fn sitzung_betreiben(
    mut sitzung: ParticipantSession,
    mut eingang: mpsc::Receiver<SitzungsEingang>,
    kontext: SitzungsKontext,
) {
    let frist = tokio::time::sleep(kontext.controller.config().join_timeout);
    tokio::pin!(frist);

    tracing::debug!(peer = %sitzung.peer_id(), "Sitzungs-Task gestartet");

    while !sitzung.ist_beendet() {
        let naechster = if sitzung.ist_offen() {
            tokio::select! {
                naechster = eingang.recv() => naechster.unwrap_or(SitzungsEingang::Geschlossen),
                _ = &mut frist => SitzungsEingang::Timeout,
            }
        } else {
            eingang
                .recv()
                .await
                .unwrap_or(SitzungsEingang::Geschlossen)
        };

        let aktionen = sitzung.verarbeiten(naechster, &kontext.controller);
        for aktion in aktionen {
            kontext.ausfuehren(sitzung.peer_id(), aktion).await;
        }
    }

    tracing::debug!(
        peer = %sitzung.peer_id(),
        zustand = ?sitzung.zustand(),
        versuche = sitzung.versuche(),
        "Sitzungs-Task beendet"
    );
}

impl SitzungsKontext {
    async fn ausfuehren(&self, peer: &PeerId, aktion: Aktion) {
        match aktion {
            Aktion::Senden(envelope) => {
                // Fire-and-forget: ein Abbau kommt als Geschlossen zurueck
                if let Err(e) = self.transport.senden(peer, envelope) {
                    tracing::debug!(peer = %peer, fehler = %e, "Senden in Zulassung fehlgeschlagen");
                }
            }
            Aktion::Zulassen => {
                self.peer_links.zugelassen(peer);
                self.melden(HostEreignis::Zugelassen(peer.clone()));
            }
            Aktion::Fehlversuch { verbleibend } => {
                self.melden(HostEreignis::Fehlversuch {
                    peer: peer.clone(),
                    verbleibend,
                });
            }
            Aktion::Verworfen(grund) => {
                self.melden(HostEreignis::Abgelehnt {
                    peer: peer.clone(),
                    grund,
                });
            }
            Aktion::Getrennt => {
                self.peer_links.entfernen(peer);
                tracing::info!(peer = %peer, "Teilnehmer getrennt");
                self.melden(HostEreignis::Getrennt(peer.clone()));
            }
            Aktion::SchliessenNach(verzoegerung) => {
                if !verzoegerung.is_zero() {
                    tokio::time::sleep(verzoegerung).await;
                }
                self.transport.schliessen(peer);
            }
        }
    }

    pub(crate) fn melden(&self, ereignis: HostEreignis) {
        // Kein Abonnent ist kein Fehler
        let _ = self.ereignisse.send(ereignis);
    }
}
