//! Speicher-Transport – zwei Endpunkte im selben Prozess verbinden
//!
//! Jeder [`Endpunkt`] hat eine eigene [`PeerRegistry`] fuer ausgehende
//! Envelopes und eine Ereignis-Queue fuer eingehende. [`verbinden`]
//! registriert beide Seiten gegenseitig und startet pro Richtung einen
//! Pump-Task.
//!
//! ## Abbau
//! Schliesst eine Seite ihren Kanal, liefert der Pump noch alle
//! eingereihten Envelopes aus, meldet danach `Geschlossen` bei der
//! Gegenseite und schliesst auch deren Richtung. Beide Seiten sehen
//! dadurch genau ein `Geschlossen`.

use perspective_core::types::PeerId;
use perspective_protocol::{Envelope, Transport, TransportEreignis};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::PeerRegistry;

/// Eine Seite einer Speicher-Verbindung
#[derive(Clone)]
pub struct Endpunkt {
    pub id: PeerId,
    pub registry: PeerRegistry,
    pub ereignisse: mpsc::Sender<TransportEreignis>,
}

impl Endpunkt {
    pub fn neu(
        id: PeerId,
        registry: PeerRegistry,
        ereignisse: mpsc::Sender<TransportEreignis>,
    ) -> Self {
        Self {
            id,
            registry,
            ereignisse,
        }
    }
}

/// Oeffnet einen Kanal zwischen `a` und `b`
///
/// Beide Seiten erhalten `Geoeffnet` erst, wenn beide Richtungen
/// registriert sind.
pub async fn verbinden(a: &Endpunkt, b: &Endpunkt) -> (JoinHandle<()>, JoinHandle<()>) {
    let a_nach_b = a.registry.registrieren(b.id.clone());
    let b_nach_a = b.registry.registrieren(a.id.clone());

    let _ = a
        .ereignisse
        .send(TransportEreignis::Geoeffnet(b.id.clone()))
        .await;
    let _ = b
        .ereignisse
        .send(TransportEreignis::Geoeffnet(a.id.clone()))
        .await;

    let pump_ab = tokio::spawn(pumpen(a_nach_b, a.id.clone(), b.clone()));
    let pump_ba = tokio::spawn(pumpen(b_nach_a, b.id.clone(), a.clone()));

    tracing::debug!(a = %a.id, b = %b.id, "Speicher-Kanal geoeffnet");
    (pump_ab, pump_ba)
}

/// Leitet Envelopes von `von` an das Ziel weiter, bis `von` schliesst
async fn pumpen(mut queue: mpsc::Receiver<Envelope>, von: PeerId, ziel: Endpunkt) {
    while let Some(envelope) = queue.recv().await {
        let ereignis = TransportEreignis::Nachricht {
            von: von.clone(),
            envelope,
        };
        if ziel.ereignisse.send(ereignis).await.is_err() {
            tracing::debug!(von = %von, ziel = %ziel.id, "Empfaenger beendet");
            break;
        }
    }

    // Gegenrichtung schliessen, ihr Pump meldet dann bei uns
    ziel.registry.schliessen(&von);
    let _ = ziel.ereignisse.send(TransportEreignis::Geschlossen(von)).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
