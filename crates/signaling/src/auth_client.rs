//! Authentifizierung auf Teilnehmer-Seite
//!
//! Reagiert auf Challenge, Bestaetigung und Ablehnungen des Hosts und
//! berechnet den Beweis fuer ein eingegebenes Passwort. Der aus dem
//! Passwort abgeleitete Chat-Schluessel wird erst bei Zulassung
//! herausgegeben und bei Ablehnung oder Abbruch verworfen.

use std::sync::Arc;

use perspective_core::types::PeerId;
use perspective_crypto::{beweis_berechnen, ChatSchluessel, GehashtesGeheimnis, SecretBytes};
use perspective_protocol::{Envelope, PasswortAnfrage, Transport, TransportFehler, ALGORITHMUS_HMAC_SHA256};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::SessionConfig;
use crate::error::{SignalingError, SignalingResult};

// ---------------------------------------------------------------------------
// Zustaende und Ereignisse
// ---------------------------------------------------------------------------

/// Zustand des Authentifizierungs-Ablaufs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientZustand {
    /// Join gesendet, noch keine Antwort
    Wartend,
    /// Challenge liegt vor, Eingabe erwartet
    PasswortErforderlich,
    /// Beweis gesendet, Ergebnis steht aus
    Pruefung,
    Zugelassen,
    /// Terminal; ein neuer Versuch braucht einen neuen Ablauf
    Abgelehnt { grund: String },
    /// Vom Nutzer abgebrochen
    Abgebrochen,
}

impl ClientZustand {
    pub fn ist_terminal(&self) -> bool {
        matches!(
            self,
            Self::Zugelassen | Self::Abgelehnt { .. } | Self::Abgebrochen
        )
    }
}

/// Fuer die Oberflaeche relevante Aenderung
#[derive(Debug, Clone)]
pub enum ClientEreignis {
    PasswortErforderlich,
    PasswortAbgelehnt { verbleibend: u32, grund: String },
    /// Zugelassen; bei Passwort-Sitzungen mit dem Chat-Schluessel
    Zugelassen { chat_schluessel: Option<ChatSchluessel> },
    Abgelehnt { grund: String },
}

// ---------------------------------------------------------------------------
// AuthenticationClient
// ---------------------------------------------------------------------------

/// Authentifizierungs-Ablauf eines Teilnehmers gegenueber einem Host
pub struct AuthenticationClient {
    host: PeerId,
    transport: Arc<dyn Transport>,
    zustand: ClientZustand,
    nonce: Option<SecretBytes>,
    schluessel_kandidat: Option<ChatSchluessel>,
    min_laenge: usize,
    max_laenge: usize,
    chat_iterationen: u32,
}

impl AuthenticationClient {
    pub fn neu(host: PeerId, transport: Arc<dyn Transport>, config: &SessionConfig) -> Self {
        Self {
            host,
            transport,
            zustand: ClientZustand::Wartend,
            nonce: None,
            schluessel_kandidat: None,
            min_laenge: config.passwort_min_laenge,
            max_laenge: config.passwort_max_laenge,
            chat_iterationen: config.chat_iterationen,
        }
    }

    pub fn zustand(&self) -> &ClientZustand {
        &self.zustand
    }

    pub fn host(&self) -> &PeerId {
        &self.host
    }

    /// Haelt der Client noch eine Nonce?
    pub fn hat_nonce(&self) -> bool {
        self.nonce.is_some()
    }

    /// Verarbeitet einen Zulassungs-Envelope des Hosts
    ///
    /// Liefert `None`, wenn sich nichts Sichtbares aendert (z.B. doppelte
    /// Bestaetigung).
    pub fn verarbeiten(&mut self, envelope: Envelope) -> Option<ClientEreignis> {
        if self.zustand.ist_terminal() {
            debug!(
                typ = envelope.typ_name(),
                zustand = ?self.zustand,
                "Envelope nach Abschluss ignoriert"
            );
            return None;
        }

        match envelope {
            Envelope::PasswordRequest(anfrage) => self.challenge_annehmen(anfrage),
            Envelope::PasswordApproved(_) => self.bestaetigung(),
            Envelope::PasswordRejected(ablehnung) => {
                if self.zustand != ClientZustand::Pruefung {
                    debug!("Passwort-Ablehnung ohne offene Pruefung ignoriert");
                    return None;
                }
                self.schluessel_kandidat = None;
                if ablehnung.remaining_retries == 0 {
                    self.terminal_ablehnen(ablehnung.reason)
                } else {
                    info!(verbleibend = ablehnung.remaining_retries, "Passwort abgelehnt");
                    // Eingabe erst wieder mit der frischen Challenge
                    self.zustand = ClientZustand::Wartend;
                    Some(ClientEreignis::PasswortAbgelehnt {
                        verbleibend: ablehnung.remaining_retries,
                        grund: ablehnung.reason,
                    })
                }
            }
            Envelope::SessionJoinRejected(ablehnung)
            | Envelope::MaxParticipantsExceeded(ablehnung) => {
                self.terminal_ablehnen(ablehnung.reason)
            }
            andere => {
                debug!(typ = andere.typ_name(), "Envelope nicht fuer Authentifizierung");
                None
            }
        }
    }

    fn challenge_annehmen(&mut self, anfrage: PasswortAnfrage) -> Option<ClientEreignis> {
        if anfrage.algorithm != ALGORITHMUS_HMAC_SHA256 {
            warn!(algorithmus = %anfrage.algorithm, "Unbekannter Challenge-Algorithmus ignoriert");
            return None;
        }
        if self.zustand == ClientZustand::Pruefung {
            debug!("Challenge waehrend laufender Pruefung ignoriert");
            return None;
        }
        self.nonce = Some(SecretBytes::new(anfrage.nonce.into_bytes()));
        let war_schon_gefordert = self.zustand == ClientZustand::PasswortErforderlich;
        self.zustand = ClientZustand::PasswortErforderlich;
        if war_schon_gefordert {
            // Doppelte Challenge, die Eingabe ist bereits offen
            None
        } else {
            Some(ClientEreignis::PasswortErforderlich)
        }
    }

    fn bestaetigung(&mut self) -> Option<ClientEreignis> {
        match self.zustand {
            ClientZustand::Wartend | ClientZustand::Pruefung => {
                self.zustand = ClientZustand::Zugelassen;
                self.nonce = None;
                info!(host = %self.host, "Vom Host zugelassen");
                Some(ClientEreignis::Zugelassen {
                    chat_schluessel: self.schluessel_kandidat.take(),
                })
            }
            _ => {
                debug!(zustand = ?self.zustand, "Bestaetigung ohne offene Pruefung ignoriert");
                None
            }
        }
    }

    fn terminal_ablehnen(&mut self, grund: String) -> Option<ClientEreignis> {
        info!(host = %self.host, grund = %grund, "Beitritt abgelehnt");
        self.nonce = None;
        self.schluessel_kandidat = None;
        self.zustand = ClientZustand::Abgelehnt {
            grund: grund.clone(),
        };
        Some(ClientEreignis::Abgelehnt { grund })
    }

    /// Sendet den Beweis fuer ein eingegebenes Passwort
    ///
    /// Schlaegt ohne Netzwerkverkehr fehl, wenn keine Challenge vorliegt,
    /// die Laenge ausserhalb der Grenzen liegt oder der Kanal zu ist.
    ///
    /// Die PBKDF2-Ableitung des Chat-Schluessels laeuft per
    /// `spawn_blocking` ausserhalb der Runtime-Threads.
    pub async fn absenden(&mut self, passwort: &str) -> SignalingResult<()> {
        if self.zustand != ClientZustand::PasswortErforderlich {
            return Err(SignalingError::zustand(format!(
                "keine Passwort-Eingabe erwartet ({:?})",
                self.zustand
            )));
        }
        let Some(nonce) = self.nonce.as_ref() else {
            return Err(SignalingError::zustand("keine Challenge vorhanden"));
        };

        let laenge = passwort.chars().count();
        if laenge < self.min_laenge || laenge > self.max_laenge {
            return Err(SignalingError::UngueltigeEingabe(format!(
                "Passwortlaenge {} ausserhalb von {}..={}",
                laenge, self.min_laenge, self.max_laenge
            )));
        }

        if !self.transport.ist_offen(&self.host) {
            return Err(TransportFehler::Geschlossen(self.host.clone()).into());
        }

        let nonce_text = std::str::from_utf8(nonce.as_bytes())
            .map_err(|_| SignalingError::zustand("Nonce ist kein UTF-8"))?;
        let beweis = beweis_berechnen(&GehashtesGeheimnis::aus_passwort(passwort), nonce_text);
        let schluessel = schluessel_ableiten(passwort, self.chat_iterationen).await?;

        self.transport
            .senden(&self.host, Envelope::passwort_antwort(beweis))?;

        // Nonce ist verbraucht; die naechste Challenge bringt eine neue
        if let Some(mut nonce) = self.nonce.take() {
            nonce.loeschen();
        }
        self.schluessel_kandidat = Some(schluessel);
        self.zustand = ClientZustand::Pruefung;
        debug!(host = %self.host, "Passwort-Beweis gesendet");
        Ok(())
    }

    /// Bricht den Ablauf ab und verwirft alles abgeleitete Material
    pub fn abbrechen(&mut self) {
        if let Some(mut nonce) = self.nonce.take() {
            nonce.loeschen();
        }
        self.schluessel_kandidat = None;
        if !matches!(self.zustand, ClientZustand::Abgelehnt { .. }) {
            self.zustand = ClientZustand::Abgebrochen;
        }
        debug!(host = %self.host, "Authentifizierung abgebrochen");
    }
}

async fn schluessel_ableiten(passwort: &str, iterationen: u32) -> SignalingResult<ChatSchluessel> {
    let passwort = Zeroizing::new(passwort.to_owned());
    let ergebnis =
        tokio::task::spawn_blocking(move || ChatSchluessel::ableiten_mit(&passwort, iterationen))
            .await
            .map_err(|e| SignalingError::intern(format!("Schluesselableitung abgebrochen: {e}")))?;
    Ok(ergebnis?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PeerRegistry;
    use perspective_crypto::beweis_pruefen;
    use tokio::sync::mpsc;

    fn test_config() -> SessionConfig {
        SessionConfig {
            chat_iterationen: 1_000,
            ..SessionConfig::default()
        }
    }

    fn aufbau() -> (AuthenticationClient, mpsc::Receiver<Envelope>, PeerRegistry) {
        let registry = PeerRegistry::neu();
        let host = PeerId::from("host");
        let rx = registry.registrieren(host.clone());
        let client = AuthenticationClient::neu(host, Arc::new(registry.clone()), &test_config());
        (client, rx, registry)
    }

    #[tokio::test]
    async fn challenge_und_beweis() {
        let (mut client, mut rx, _registry) = aufbau();

        let ereignis = client.verarbeiten(Envelope::passwort_anfrage("abcd"));
        assert!(matches!(ereignis, Some(ClientEreignis::PasswortErforderlich)));

        client.absenden("s3cret").await.unwrap();
        assert_eq!(client.zustand(), &ClientZustand::Pruefung);
        assert!(!client.hat_nonce());

        let Some(Envelope::PasswordResponse(antwort)) = rx.recv().await else {
            panic!("PASSWORD_RESPONSE erwartet");
        };
        assert_eq!(antwort.algorithm, "hmac-sha256");
        assert!(beweis_pruefen(
            &GehashtesGeheimnis::aus_passwort("s3cret"),
            "abcd",
            &antwort.proof
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn schluesselableitung_blockiert_runtime_nicht() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let (mut client, _rx, _registry) = aufbau();
        client.verarbeiten(Envelope::passwort_anfrage("abcd"));

        let ticks = Arc::new(AtomicU32::new(0));
        let zaehler = ticks.clone();
        let ticker = tokio::spawn(async move {
            loop {
                zaehler.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
            }
        });

        client.absenden("s3cret").await.unwrap();
        assert!(ticks.load(Ordering::SeqCst) > 0);
        ticker.abort();
    }

    #[tokio::test]
    async fn zulassung_gibt_schluessel_heraus() {
        let (mut client, _rx, _registry) = aufbau();
        client.verarbeiten(Envelope::passwort_anfrage("abcd"));
        client.absenden("s3cret").await.unwrap();

        match client.verarbeiten(Envelope::passwort_bestaetigt()) {
            Some(ClientEreignis::Zugelassen {
                chat_schluessel: Some(_),
            }) => {}
            andere => panic!("Zulassung mit Schluessel erwartet: {andere:?}"),
        }
        assert_eq!(client.zustand(), &ClientZustand::Zugelassen);
    }

    #[test]
    fn oeffentliche_sitzung_ohne_schluessel() {
        let (mut client, _rx, _registry) = aufbau();
        assert!(matches!(
            client.verarbeiten(Envelope::passwort_bestaetigt()),
            Some(ClientEreignis::Zugelassen {
                chat_schluessel: None
            })
        ));
    }

    #[test]
    fn doppelte_bestaetigung_ist_wirkungslos() {
        let (mut client, _rx, _registry) = aufbau();
        client.verarbeiten(Envelope::passwort_bestaetigt());
        assert!(client.verarbeiten(Envelope::passwort_bestaetigt()).is_none());
        assert!(client
            .verarbeiten(Envelope::passwort_abgelehnt(1, "Incorrect password"))
            .is_none());
        assert_eq!(client.zustand(), &ClientZustand::Zugelassen);
    }

    #[tokio::test]
    async fn ablehnung_mit_restversuchen_erlaubt_neuen_versuch() {
        let (mut client, _rx, _registry) = aufbau();
        client.verarbeiten(Envelope::passwort_anfrage("n1"));
        client.absenden("falsch").await.unwrap();

        let ereignis = client.verarbeiten(Envelope::passwort_abgelehnt(2, "Incorrect password"));
        assert!(matches!(
            ereignis,
            Some(ClientEreignis::PasswortAbgelehnt { verbleibend: 2, .. })
        ));
        assert_eq!(client.zustand(), &ClientZustand::Wartend);

        // Ohne frische Nonce kein Beweis
        assert!(matches!(
            client.absenden("nochmal").await,
            Err(SignalingError::UngueltigerZustand(_))
        ));

        assert!(matches!(
            client.verarbeiten(Envelope::passwort_anfrage("n2")),
            Some(ClientEreignis::PasswortErforderlich)
        ));
        assert!(client.absenden("nochmal").await.is_ok());
    }

    #[tokio::test]
    async fn letzte_ablehnung_ist_terminal() {
        let (mut client, _rx, _registry) = aufbau();
        client.verarbeiten(Envelope::passwort_anfrage("n1"));
        client.absenden("falsch").await.unwrap();

        let ereignis = client.verarbeiten(Envelope::passwort_abgelehnt(
            0,
            "Maximum password attempts exceeded",
        ));
        assert!(matches!(ereignis, Some(ClientEreignis::Abgelehnt { .. })));
        assert!(client.zustand().ist_terminal());

        assert!(client.verarbeiten(Envelope::passwort_anfrage("n2")).is_none());
        assert!(client.absenden("egal").await.is_err());
    }

    #[tokio::test]
    async fn wiederholte_ablehnung_ist_wirkungslos() {
        let (mut client, _rx, _registry) = aufbau();
        client.verarbeiten(Envelope::passwort_anfrage("n1"));
        client.absenden("falsch").await.unwrap();
        client.verarbeiten(Envelope::passwort_abgelehnt(2, "Incorrect password"));

        assert!(client
            .verarbeiten(Envelope::passwort_abgelehnt(2, "Incorrect password"))
            .is_none());
        assert_eq!(client.zustand(), &ClientZustand::Wartend);
    }

    #[test]
    fn doppelte_challenge_meldet_nur_einmal() {
        let (mut client, _rx, _registry) = aufbau();
        assert!(client.verarbeiten(Envelope::passwort_anfrage("n1")).is_some());
        assert!(client.verarbeiten(Envelope::passwort_anfrage("n2")).is_none());
        assert!(client.hat_nonce());
    }

    #[test]
    fn kapazitaet_erschoepft_ist_terminal() {
        let (mut client, _rx, _registry) = aufbau();
        let ereignis = client.verarbeiten(Envelope::kapazitaet_erschoepft(
            "Session is at maximum capacity. Please try again later.",
        ));
        match ereignis {
            Some(ClientEreignis::Abgelehnt { grund }) => {
                assert!(grund.contains("maximum capacity"))
            }
            andere => panic!("Abgelehnt erwartet: {andere:?}"),
        }
    }

    #[tokio::test]
    async fn passwortlaenge_wird_lokal_geprueft() {
        let (mut client, mut rx, _registry) = aufbau();
        client.verarbeiten(Envelope::passwort_anfrage("n1"));

        assert!(matches!(
            client.absenden("").await,
            Err(SignalingError::UngueltigeEingabe(_))
        ));
        assert!(matches!(
            client.absenden(&"x".repeat(129)).await,
            Err(SignalingError::UngueltigeEingabe(_))
        ));
        assert_eq!(client.zustand(), &ClientZustand::PasswortErforderlich);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn geschlossener_kanal_wird_lokal_abgelehnt() {
        let (mut client, _rx, registry) = aufbau();
        client.verarbeiten(Envelope::passwort_anfrage("n1"));
        registry.schliessen(&PeerId::from("host"));

        assert!(matches!(
            client.absenden("s3cret").await,
            Err(SignalingError::Transport(TransportFehler::Geschlossen(_)))
        ));
        assert!(client.hat_nonce());
    }

    #[tokio::test]
    async fn abbrechen_verwirft_nonce_und_ignoriert_spaeteres() {
        let (mut client, _rx, _registry) = aufbau();
        client.verarbeiten(Envelope::passwort_anfrage("n1"));
        client.abbrechen();

        assert_eq!(client.zustand(), &ClientZustand::Abgebrochen);
        assert!(!client.hat_nonce());
        assert!(client.verarbeiten(Envelope::passwort_bestaetigt()).is_none());
        assert!(client.absenden("s3cret").await.is_err());
    }

    #[test]
    fn unbekannter_algorithmus_wird_ignoriert() {
        let (mut client, _rx, _registry) = aufbau();
        let anfrage = Envelope::PasswordRequest(PasswortAnfrage {
            nonce: "n1".into(),
            algorithm: "sha1".into(),
        });
        assert!(client.verarbeiten(anfrage).is_none());
        assert_eq!(client.zustand(), &ClientZustand::Wartend);
    }
}
