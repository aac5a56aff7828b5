//! ChatRelay – Senden, Empfangen und Hub-Weiterleitung von Chat-Nachrichten
//!
//! Der Host ist Hub einer Stern-Topologie: Teilnehmer senden nur an den
//! Host, der Host verteilt an alle zugelassenen Teilnehmer ausser dem
//! Absender. Teilnehmer leiten nie weiter.
//!
//! ## Empfangsreihenfolge
//! 1. Absender pruefen (Host: zugelassen und `sender_id` passt)
//! 2. Entschluesseln, bei Fehler verwerfen
//! 3. Nachrichten vor dem eigenen Verbindungszeitpunkt verwerfen
//! 4. Host: Original-Envelope weiterleiten
//! 5. Im Verlauf anhaengen, Unread-Zaehler pflegen

use std::sync::Arc;

use perspective_core::clock::Clock;
use perspective_core::roster::Teilnehmerliste;
use perspective_core::types::{MessageId, PeerId, Rolle};
use perspective_crypto::NachrichtenCodec;
use perspective_protocol::{ChatEnvelope, Envelope, Transport, TransportFehler};
use tracing::{debug, warn};

use crate::error::{ChatError, ChatResult};
use crate::types::{ChatNachricht, Empfang, VerwerfGrund, MAX_NACHRICHTEN_LAENGE};
use crate::verlauf::ChatVerlauf;

// ---------------------------------------------------------------------------
// Seite
// ---------------------------------------------------------------------------

/// Position im Stern
#[derive(Clone)]
enum Seite {
    /// Hub, verteilt an alle Zugelassenen
    Host { teilnehmer: Teilnehmerliste },
    /// Blatt, spricht nur mit dem Host
    Teilnehmer { host: PeerId },
}

// ---------------------------------------------------------------------------
// ChatRelay
// ---------------------------------------------------------------------------

/// Chat-Logik einer Sitzung
///
/// Gehoert genau einer Task; alle Methoden nehmen `&mut self`.
pub struct ChatRelay {
    eigene_id: PeerId,
    seite: Seite,
    codec: NachrichtenCodec,
    transport: Arc<dyn Transport>,
    uhr: Arc<dyn Clock>,
    verlauf: ChatVerlauf,
    verbindungszeitpunkt_ms: u64,
    max_laenge: usize,
}

impl ChatRelay {
    /// Chat fuer den Host einer Sitzung
    ///
    /// `teilnehmer` ist dieselbe Liste, die die Zulassung pflegt.
    pub fn host(
        eigene_id: PeerId,
        codec: NachrichtenCodec,
        transport: Arc<dyn Transport>,
        teilnehmer: Teilnehmerliste,
        uhr: Arc<dyn Clock>,
    ) -> Self {
        Self::neu(eigene_id, Seite::Host { teilnehmer }, codec, transport, uhr)
    }

    /// Chat fuer einen zugelassenen Teilnehmer
    pub fn teilnehmer(
        eigene_id: PeerId,
        host: PeerId,
        codec: NachrichtenCodec,
        transport: Arc<dyn Transport>,
        uhr: Arc<dyn Clock>,
    ) -> Self {
        Self::neu(eigene_id, Seite::Teilnehmer { host }, codec, transport, uhr)
    }

    fn neu(
        eigene_id: PeerId,
        seite: Seite,
        codec: NachrichtenCodec,
        transport: Arc<dyn Transport>,
        uhr: Arc<dyn Clock>,
    ) -> Self {
        Self {
            eigene_id,
            seite,
            codec,
            transport,
            uhr,
            verlauf: ChatVerlauf::neu(),
            verbindungszeitpunkt_ms: 0,
            max_laenge: MAX_NACHRICHTEN_LAENGE,
        }
    }

    /// Setzt eine abweichende Maximal-Laenge (Zeichen)
    pub fn mit_max_laenge(mut self, max_laenge: usize) -> Self {
        self.max_laenge = max_laenge;
        self
    }

    /// Setzt den Verbindungszeitpunkt fuer den Zeitstempel-Filter
    pub fn verbindungszeitpunkt_setzen(&mut self, zeitpunkt_ms: u64) {
        self.verbindungszeitpunkt_ms = zeitpunkt_ms;
    }

    pub fn rolle(&self) -> Rolle {
        match self.seite {
            Seite::Host { .. } => Rolle::Host,
            Seite::Teilnehmer { .. } => Rolle::Peer,
        }
    }

    pub fn eigene_id(&self) -> &PeerId {
        &self.eigene_id
    }

    pub fn verlauf(&self) -> &ChatVerlauf {
        &self.verlauf
    }

    /// Oeffnet oder schliesst die Chat-Oberflaeche
    pub fn chat_geoeffnet(&mut self, offen: bool) {
        self.verlauf.chat_geoeffnet(offen);
    }

    pub fn ungelesen(&self) -> usize {
        self.verlauf.ungelesen()
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    /// Sendet eine eigene Nachricht
    ///
    /// Der Text wird getrimmt; leere oder zu lange Texte werden abgelehnt.
    /// Ein Teilnehmer ohne offene Verbindung zum Host bekommt
    /// `ChatError::Transport` und nichts wird angehaengt.
    pub fn senden(&mut self, text: &str) -> ChatResult<ChatNachricht> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::UngueltigeEingabe(
                "Nachrichteninhalt darf nicht leer sein".into(),
            ));
        }
        let laenge = text.chars().count();
        if laenge > self.max_laenge {
            return Err(ChatError::ZuLang {
                laenge,
                max: self.max_laenge,
            });
        }

        if let Seite::Teilnehmer { host } = &self.seite {
            if !self.transport.ist_offen(host) {
                return Err(ChatError::Transport(TransportFehler::Geschlossen(
                    host.clone(),
                )));
            }
        }

        let kodiert = self.codec.kodieren(text)?;
        let envelope = ChatEnvelope {
            id: MessageId::new().inner().to_string(),
            sender_id: self.eigene_id.clone(),
            sender_role: self.rolle(),
            text: kodiert.text,
            iv: kodiert.iv,
            timestamp: self.uhr.jetzt_ms(),
            encrypted: kodiert.verschluesselt,
        };

        let nachricht = ChatNachricht::aus_envelope(&envelope, text.to_string());
        self.verlauf.eigene_hinzufuegen(nachricht.clone());

        match &self.seite {
            Seite::Host { teilnehmer } => {
                let empfaenger = teilnehmer.alle();
                for peer in &empfaenger {
                    self.zustellen(peer, Envelope::ChatMessage(envelope.clone()));
                }
                debug!(
                    nachricht = %envelope.id,
                    empfaenger = empfaenger.len(),
                    "Chat-Nachricht an Teilnehmer verteilt"
                );
            }
            Seite::Teilnehmer { host } => {
                self.transport
                    .senden(host, Envelope::ChatMessage(envelope.clone()))?;
                debug!(nachricht = %envelope.id, "Chat-Nachricht an Host gesendet");
            }
        }

        Ok(nachricht)
    }

    // -----------------------------------------------------------------------
    // Empfangen
    // -----------------------------------------------------------------------

    /// Verarbeitet einen eingehenden Chat-Envelope
    ///
    /// Verworfene Nachrichten sind kein Fehler des Aufrufers; der Grund
    /// wird zurueckgegeben und geloggt.
    pub fn empfangen(&mut self, von: &PeerId, envelope: ChatEnvelope) -> Empfang {
        if let Some(grund) = self.absender_pruefen(von, &envelope) {
            return self.verwerfen(von, &envelope, grund);
        }

        let klartext = match self.codec.dekodieren(
            &envelope.text,
            envelope.iv.as_deref(),
            envelope.encrypted,
        ) {
            Ok(text) => text,
            Err(e) => {
                debug!(peer = %von, fehler = %e, "Chat-Nachricht nicht entschluesselbar");
                return self.verwerfen(von, &envelope, VerwerfGrund::Entschluesselung);
            }
        };

        let laenge = klartext.chars().count();
        if klartext.trim().is_empty() || laenge > self.max_laenge {
            return self.verwerfen(von, &envelope, VerwerfGrund::UngueltigerInhalt);
        }

        if envelope.timestamp < self.verbindungszeitpunkt_ms {
            return self.verwerfen(von, &envelope, VerwerfGrund::Veraltet);
        }

        let mut weitergeleitet = 0;
        if let Seite::Host { teilnehmer } = &self.seite {
            for peer in teilnehmer.alle() {
                if peer == envelope.sender_id {
                    continue;
                }
                if self.zustellen(&peer, Envelope::ChatMessage(envelope.clone())) {
                    weitergeleitet += 1;
                }
            }
        }

        let nachricht = ChatNachricht::aus_envelope(&envelope, klartext);
        let ungelesen_erhoeht = self.verlauf.empfangene_hinzufuegen(nachricht);

        debug!(
            peer = %von,
            nachricht = %envelope.id,
            weitergeleitet,
            "Chat-Nachricht empfangen"
        );

        Empfang::Angezeigt {
            ungelesen_erhoeht,
            weitergeleitet,
        }
    }

    fn absender_pruefen(&self, von: &PeerId, envelope: &ChatEnvelope) -> Option<VerwerfGrund> {
        match &self.seite {
            Seite::Host { teilnehmer } => {
                if !teilnehmer.enthaelt(von) {
                    Some(VerwerfGrund::NichtZugelassen)
                } else if envelope.sender_id != *von || envelope.sender_role.ist_host() {
                    Some(VerwerfGrund::UngueltigerAbsender)
                } else {
                    None
                }
            }
            Seite::Teilnehmer { host } => {
                if von != host || envelope.sender_id == self.eigene_id {
                    Some(VerwerfGrund::UngueltigerAbsender)
                } else {
                    None
                }
            }
        }
    }

    fn verwerfen(&self, von: &PeerId, envelope: &ChatEnvelope, grund: VerwerfGrund) -> Empfang {
        debug!(peer = %von, nachricht = %envelope.id, grund = ?grund, "Chat-Nachricht verworfen");
        Empfang::Verworfen(grund)
    }

    /// Sendet an einen Peer; Fehler werden nur geloggt
    fn zustellen(&self, peer: &PeerId, envelope: Envelope) -> bool {
        match self.transport.senden(peer, envelope) {
            Ok(()) => true,
            Err(e) => {
                warn!(peer = %peer, fehler = %e, "Chat-Nachricht nicht zustellbar");
                false
            }
        }
    }
}
