//! Aufzeichnender Transport fuer die Unit-Tests

use std::collections::HashSet;
use std::sync::Mutex;

use perspective_core::types::PeerId;
use perspective_protocol::{ChatEnvelope, Envelope, Transport, TransportFehler, TransportResult};

#[derive(Default)]
pub struct TestTransport {
    gesendet: Mutex<Vec<(PeerId, Envelope)>>,
    geschlossen: Mutex<HashSet<PeerId>>,
}

impl TestTransport {
    pub fn schliessen_markieren(&self, peer: &PeerId) {
        self.geschlossen.lock().unwrap().insert(peer.clone());
    }

    /// Alle gesendeten Chat-Envelopes mit Empfaenger
    pub fn chats(&self) -> Vec<(PeerId, ChatEnvelope)> {
        self.gesendet
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(peer, env)| match env {
                Envelope::ChatMessage(chat) => Some((peer.clone(), chat.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn empfaenger(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.chats().into_iter().map(|(p, _)| p).collect();
        peers.sort();
        peers
    }
}

impl Transport for TestTransport {
    fn senden(&self, peer: &PeerId, envelope: Envelope) -> TransportResult<()> {
        if self.geschlossen.lock().unwrap().contains(peer) {
            return Err(TransportFehler::Geschlossen(peer.clone()));
        }
        self.gesendet.lock().unwrap().push((peer.clone(), envelope));
        Ok(())
    }

    fn schliessen(&self, peer: &PeerId) {
        self.schliessen_markieren(peer);
    }

    fn ist_offen(&self, peer: &PeerId) -> bool {
        !self.geschlossen.lock().unwrap().contains(peer)
    }
}
