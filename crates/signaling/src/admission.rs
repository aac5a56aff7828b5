//! Zulassung – Zustandsmaschine pro Teilnehmer auf Host-Seite
//!
//! [`ParticipantSession::verarbeiten`] ist bis auf Nonce-Erzeugung und
//! Slot-Reservierung frei von Seiteneffekten und liefert eine Liste von
//! [`Aktion`]en, die der Sitzungs-Task ausfuehrt.
//!
//! ## Zustaende
//! ```text
//! WartetAufJoin --(Join, Origin ok, Slot frei, kein Passwort)--> Zugelassen
//! WartetAufJoin --(Join, Origin ok, Slot frei, Passwort)------> WartetAufPasswort
//! WartetAufJoin --(Origin falsch | kein Slot)-----------------> Abgelehnt
//! WartetAufPasswort --(Beweis gueltig)------------------------> Zugelassen
//! WartetAufPasswort --(Beweis falsch, Versuche < Max)---------> WartetAufPasswort (neue Nonce)
//! WartetAufPasswort --(Beweis falsch, Versuche >= Max)--------> Abgelehnt
//! offen --(Verbindung zu | Timeout)---------------------------> Abgelehnt (still)
//! ```

use std::sync::Arc;
use std::time::Duration;

use perspective_core::types::PeerId;
use perspective_crypto::{beweis_pruefen, nonce_erzeugen, GehashtesGeheimnis, NONCE_LAENGE};
use perspective_protocol::{Envelope, JoinAnfrage, PasswortAntwort, ALGORITHMUS_HMAC_SHA256};
use tracing::{debug, error, info, warn};

use crate::capacity::KapazitaetsTabelle;
use crate::config::SessionConfig;
use crate::error::{Ablehnungsgrund, GRUND_PASSWORT_FALSCH};

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

/// Zustand einer `ParticipantSession`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZulassungsZustand {
    WartetAufJoin,
    WartetAufPasswort,
    Zugelassen,
    Abgelehnt,
}

/// Eingang in die Zustandsmaschine
#[derive(Debug, Clone)]
pub enum SitzungsEingang {
    /// Zulassungs-Envelope vom Teilnehmer
    Nachricht(Envelope),
    /// Join-Frist abgelaufen
    Timeout,
    /// Transport wurde geschlossen
    Geschlossen,
}

/// Vom Sitzungs-Task auszufuehrender Schritt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aktion {
    /// Envelope an den Teilnehmer senden
    Senden(Envelope),
    /// Teilnehmer ist zugelassen (vor dem PASSWORD_APPROVED ausfuehren)
    Zulassen,
    /// Falscher Beweis gezaehlt
    Fehlversuch { verbleibend: u32 },
    /// Sitzung endet ohne Zulassung; `None` bei stillem Abbruch
    Verworfen(Option<Ablehnungsgrund>),
    /// Zugelassener Teilnehmer hat die Verbindung beendet
    Getrennt,
    /// Verbindung nach Wartezeit schliessen
    SchliessenNach(Duration),
}

// ---------------------------------------------------------------------------
// AdmissionController
// ---------------------------------------------------------------------------

/// Geteilter Kontext aller Teilnehmer-Sitzungen eines Hosts
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct AdmissionController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: SessionConfig,
    geheimnis: Option<GehashtesGeheimnis>,
    kapazitaet: KapazitaetsTabelle,
}

impl AdmissionController {
    /// Erstellt den Controller; das Passwort wird sofort gehasht
    pub fn neu(config: SessionConfig) -> Self {
        let geheimnis = config
            .aktives_passwort()
            .map(GehashtesGeheimnis::aus_passwort);
        let kapazitaet = KapazitaetsTabelle::neu(config.max_teilnehmer);
        Self {
            inner: Arc::new(ControllerInner {
                config,
                geheimnis,
                kapazitaet,
            }),
        }
    }

    /// Neue Sitzung fuer eine gerade geoeffnete Verbindung
    pub fn sitzung_erstellen(&self, peer_id: PeerId) -> ParticipantSession {
        ParticipantSession::neu(peer_id)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn kapazitaet(&self) -> &KapazitaetsTabelle {
        &self.inner.kapazitaet
    }

    pub fn passwort_geschuetzt(&self) -> bool {
        self.inner.geheimnis.is_some()
    }
}

// ---------------------------------------------------------------------------
// ParticipantSession
// ---------------------------------------------------------------------------

/// Zulassungszustand eines einzelnen Teilnehmers
///
/// Gehoert genau einem Sitzungs-Task; Uebergaenge sind dadurch serialisiert.
#[derive(Debug)]
pub struct ParticipantSession {
    peer_id: PeerId,
    zustand: ZulassungsZustand,
    nonce: Option<String>,
    versuche: u32,
    join_behandelt: bool,
    beendet: bool,
}

impl ParticipantSession {
    pub fn neu(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            zustand: ZulassungsZustand::WartetAufJoin,
            nonce: None,
            versuche: 0,
            join_behandelt: false,
            beendet: false,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn zustand(&self) -> ZulassungsZustand {
        self.zustand
    }

    /// Anzahl gezaehlter Fehlversuche
    pub fn versuche(&self) -> u32 {
        self.versuche
    }

    pub fn nonce(&self) -> Option<&str> {
        self.nonce.as_deref()
    }

    /// Noch weder zugelassen noch abgelehnt?
    pub fn ist_offen(&self) -> bool {
        matches!(
            self.zustand,
            ZulassungsZustand::WartetAufJoin | ZulassungsZustand::WartetAufPasswort
        )
    }

    /// Muss der Sitzungs-Task weiterlaufen?
    pub fn ist_beendet(&self) -> bool {
        self.beendet
    }

    /// Verarbeitet einen Eingang und liefert die auszufuehrenden Aktionen
    pub fn verarbeiten(
        &mut self,
        eingang: SitzungsEingang,
        controller: &AdmissionController,
    ) -> Vec<Aktion> {
        if self.beendet {
            return Vec::new();
        }
        match eingang {
            SitzungsEingang::Nachricht(Envelope::SessionJoinRequest(anfrage)) => {
                self.join_verarbeiten(anfrage, controller)
            }
            SitzungsEingang::Nachricht(Envelope::PasswordResponse(antwort)) => {
                self.antwort_verarbeiten(antwort, controller)
            }
            SitzungsEingang::Nachricht(andere) => {
                debug!(
                    peer = %self.peer_id,
                    typ = andere.typ_name(),
                    "Unerwarteter Envelope in Zulassung ignoriert"
                );
                Vec::new()
            }
            SitzungsEingang::Timeout => self.timeout_verarbeiten(controller),
            SitzungsEingang::Geschlossen => self.schliessen_verarbeiten(controller),
        }
    }

    // -----------------------------------------------------------------------
    // Join
    // -----------------------------------------------------------------------

    fn join_verarbeiten(
        &mut self,
        anfrage: JoinAnfrage,
        controller: &AdmissionController,
    ) -> Vec<Aktion> {
        if self.join_behandelt || self.zustand != ZulassungsZustand::WartetAufJoin {
            debug!(peer = %self.peer_id, "Doppelte Join-Anfrage ignoriert");
            return Vec::new();
        }
        self.join_behandelt = true;

        let config = controller.config();
        if !config
            .domain_richtlinie
            .erlaubt(&anfrage.origin, &config.host_origin)
        {
            info!(peer = %self.peer_id, origin = %anfrage.origin, "Origin nicht erlaubt");
            return self.ablehnen(Ablehnungsgrund::DomainNichtErlaubt, controller);
        }

        if !controller.kapazitaet().reservieren(&self.peer_id) {
            info!(
                peer = %self.peer_id,
                max = controller.kapazitaet().max(),
                "Sitzung voll"
            );
            return self.ablehnen(Ablehnungsgrund::KapazitaetErschoepft, controller);
        }

        if controller.inner.geheimnis.is_none() {
            return self.zulassen(controller);
        }

        self.zustand = ZulassungsZustand::WartetAufPasswort;
        match self.challenge_ausgeben() {
            Some(aktion) => vec![aktion],
            None => self.abbrechen(controller),
        }
    }

    // -----------------------------------------------------------------------
    // Passwort
    // -----------------------------------------------------------------------

    fn antwort_verarbeiten(
        &mut self,
        antwort: PasswortAntwort,
        controller: &AdmissionController,
    ) -> Vec<Aktion> {
        if self.zustand != ZulassungsZustand::WartetAufPasswort {
            debug!(
                peer = %self.peer_id,
                zustand = ?self.zustand,
                "Passwort-Antwort ausserhalb der Challenge ignoriert"
            );
            return Vec::new();
        }
        let (Some(geheimnis), Some(nonce)) = (controller.inner.geheimnis.as_ref(), self.nonce.take())
        else {
            return self.abbrechen(controller);
        };

        let gueltig = antwort.algorithm == ALGORITHMUS_HMAC_SHA256
            && beweis_pruefen(geheimnis, &nonce, &antwort.proof);
        if gueltig {
            return self.zulassen(controller);
        }

        self.versuche += 1;
        let max = controller.config().max_passwort_versuche;
        let verbleibend = max.saturating_sub(self.versuche);
        warn!(
            peer = %self.peer_id,
            versuch = self.versuche,
            verbleibend,
            "Falscher Passwort-Beweis"
        );

        if self.versuche >= max {
            let mut aktionen = vec![Aktion::Fehlversuch { verbleibend: 0 }];
            aktionen.extend(self.ablehnen(Ablehnungsgrund::VersucheErschoepft, controller));
            return aktionen;
        }

        let mut aktionen = vec![
            Aktion::Senden(Envelope::passwort_abgelehnt(verbleibend, GRUND_PASSWORT_FALSCH)),
            Aktion::Fehlversuch { verbleibend },
        ];
        match self.challenge_ausgeben() {
            Some(aktion) => aktionen.push(aktion),
            None => aktionen.extend(self.abbrechen(controller)),
        }
        aktionen
    }

    /// Erzeugt eine frische Nonce und die zugehoerige Challenge
    fn challenge_ausgeben(&mut self) -> Option<Aktion> {
        match nonce_erzeugen(NONCE_LAENGE) {
            Ok(nonce) => {
                self.nonce = Some(nonce.clone());
                debug!(peer = %self.peer_id, "Passwort-Challenge gesendet");
                Some(Aktion::Senden(Envelope::passwort_anfrage(nonce)))
            }
            Err(e) => {
                error!(peer = %self.peer_id, fehler = %e, "Nonce-Erzeugung fehlgeschlagen");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Abschluss
    // -----------------------------------------------------------------------

    fn zulassen(&mut self, controller: &AdmissionController) -> Vec<Aktion> {
        controller.kapazitaet().bestaetigen(&self.peer_id);
        self.zustand = ZulassungsZustand::Zugelassen;
        self.nonce = None;
        self.versuche = 0;
        info!(peer = %self.peer_id, "Teilnehmer zugelassen");
        vec![
            Aktion::Zulassen,
            Aktion::Senden(Envelope::passwort_bestaetigt()),
        ]
    }

    fn ablehnen(
        &mut self,
        grund: Ablehnungsgrund,
        controller: &AdmissionController,
    ) -> Vec<Aktion> {
        self.beenden(controller);
        let envelope = match grund {
            Ablehnungsgrund::DomainNichtErlaubt => Envelope::beitritt_abgelehnt(grund.als_text()),
            Ablehnungsgrund::KapazitaetErschoepft => {
                Envelope::kapazitaet_erschoepft(grund.als_text())
            }
            Ablehnungsgrund::VersucheErschoepft => Envelope::passwort_abgelehnt(0, grund.als_text()),
        };
        vec![
            Aktion::Senden(envelope),
            Aktion::Verworfen(Some(grund)),
            Aktion::SchliessenNach(controller.config().schliessen_verzoegerung),
        ]
    }

    /// Stiller Abbruch ohne Nachricht an den Teilnehmer
    fn abbrechen(&mut self, controller: &AdmissionController) -> Vec<Aktion> {
        self.beenden(controller);
        vec![
            Aktion::Verworfen(None),
            Aktion::SchliessenNach(Duration::ZERO),
        ]
    }

    fn beenden(&mut self, controller: &AdmissionController) {
        controller.kapazitaet().freigeben(&self.peer_id);
        self.zustand = ZulassungsZustand::Abgelehnt;
        self.nonce = None;
        self.beendet = true;
    }

    fn timeout_verarbeiten(&mut self, controller: &AdmissionController) -> Vec<Aktion> {
        if !self.ist_offen() {
            return Vec::new();
        }
        info!(peer = %self.peer_id, zustand = ?self.zustand, "Join-Frist abgelaufen");
        self.abbrechen(controller)
    }

    fn schliessen_verarbeiten(&mut self, controller: &AdmissionController) -> Vec<Aktion> {
        match self.zustand {
            ZulassungsZustand::Zugelassen => {
                controller.kapazitaet().freigeben(&self.peer_id);
                self.beendet = true;
                vec![Aktion::Getrennt]
            }
            ZulassungsZustand::WartetAufJoin | ZulassungsZustand::WartetAufPasswort => {
                debug!(peer = %self.peer_id, "Verbindung vor Zulassung geschlossen");
                self.beenden(controller);
                vec![Aktion::Verworfen(None)]
            }
            ZulassungsZustand::Abgelehnt => {
                self.beendet = true;
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
