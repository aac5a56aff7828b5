//! Teilnehmer-Laufzeit – Beitritt, Passwort-Ablauf und Chat beim Teilnehmer
//!
//! Sobald der Datenkanal zum Host offen ist, wird die Join-Anfrage
//! gesendet. Antworten des Hosts treiben den [`AuthenticationClient`];
//! nach der Zulassung entsteht der [`ChatRelay`] mit dem Schluessel aus
//! dem eingegebenen Passwort.

use std::sync::Arc;

use perspective_chat::{ChatNachricht, ChatRelay, Empfang, VerwerfGrund};
use perspective_core::clock::Clock;
use perspective_core::roster::Teilnehmerliste;
use perspective_core::status::{ConnectionStatus, StatusTracker};
use perspective_core::types::PeerId;
use perspective_crypto::{ChatSchluessel, NachrichtenCodec};
use perspective_protocol::{Envelope, Transport, TransportEreignis};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::auth_client::{AuthenticationClient, ClientEreignis, ClientZustand};
use crate::config::SessionConfig;
use crate::error::{SignalingError, SignalingResult};
use crate::peer_link::{LinkHandle, MediaLink, PeerLinkManager};

const EREIGNIS_KANAL_GROESSE: usize = 64;
const BEFEHL_QUEUE_GROESSE: usize = 16;

// ---------------------------------------------------------------------------
// Ereignisse und Befehle
// ---------------------------------------------------------------------------

/// Ereignisse fuer die Oberflaeche des Teilnehmers
#[derive(Debug, Clone)]
pub enum TeilnehmerEreignis {
    Status(ConnectionStatus),
    PasswortErforderlich,
    PasswortAbgelehnt { verbleibend: u32, grund: String },
    Zugelassen,
    Abgelehnt { grund: String },
    ChatEmpfangen(ChatNachricht),
    ChatVerworfen(VerwerfGrund),
}

enum TeilnehmerBefehl {
    PasswortSenden {
        passwort: String,
        antwort: oneshot::Sender<SignalingResult<()>>,
    },
    ChatSenden {
        text: String,
        antwort: oneshot::Sender<SignalingResult<ChatNachricht>>,
    },
    ChatGeoeffnet(bool),
    AnrufAnnehmen {
        handle: LinkHandle,
        antwort: oneshot::Sender<SignalingResult<()>>,
    },
    Abbrechen,
}

// ---------------------------------------------------------------------------
// TeilnehmerHandle
// ---------------------------------------------------------------------------

/// Steuer-Handle fuer eine laufende [`TeilnehmerRuntime`]
#[derive(Clone)]
pub struct TeilnehmerHandle {
    befehle: mpsc::Sender<TeilnehmerBefehl>,
    ereignisse: broadcast::Sender<TeilnehmerEreignis>,
}

impl TeilnehmerHandle {
    pub fn abonnieren(&self) -> broadcast::Receiver<TeilnehmerEreignis> {
        self.ereignisse.subscribe()
    }

    /// Sendet den Beweis fuer ein eingegebenes Passwort
    pub async fn passwort_senden(&self, passwort: impl Into<String>) -> SignalingResult<()> {
        let (antwort, rx) = oneshot::channel();
        self.senden(TeilnehmerBefehl::PasswortSenden {
            passwort: passwort.into(),
            antwort,
        })
        .await?;
        rx.await.map_err(|_| SignalingError::VerbindungGetrennt)?
    }

    pub async fn chat_senden(&self, text: impl Into<String>) -> SignalingResult<ChatNachricht> {
        let (antwort, rx) = oneshot::channel();
        self.senden(TeilnehmerBefehl::ChatSenden {
            text: text.into(),
            antwort,
        })
        .await?;
        rx.await.map_err(|_| SignalingError::VerbindungGetrennt)?
    }

    pub async fn chat_geoeffnet(&self, offen: bool) -> SignalingResult<()> {
        self.senden(TeilnehmerBefehl::ChatGeoeffnet(offen)).await
    }

    /// Nimmt den Media-Anruf des Hosts an (nur nach Zulassung)
    pub async fn anruf_annehmen(&self, handle: LinkHandle) -> SignalingResult<()> {
        let (antwort, rx) = oneshot::channel();
        self.senden(TeilnehmerBefehl::AnrufAnnehmen { handle, antwort })
            .await?;
        rx.await.map_err(|_| SignalingError::VerbindungGetrennt)?
    }

    /// Verlaesst die Sitzung bzw. bricht den Beitritt ab
    pub async fn abbrechen(&self) {
        let _ = self.befehle.send(TeilnehmerBefehl::Abbrechen).await;
    }

    async fn senden(&self, befehl: TeilnehmerBefehl) -> SignalingResult<()> {
        self.befehle
            .send(befehl)
            .await
            .map_err(|_| SignalingError::VerbindungGetrennt)
    }
}

// ---------------------------------------------------------------------------
// TeilnehmerRuntime
// ---------------------------------------------------------------------------

/// Laufzeit eines Teilnehmers gegenueber genau einem Host
pub struct TeilnehmerRuntime {
    eigene_id: PeerId,
    host: PeerId,
    origin: String,
    transport: Arc<dyn Transport>,
    uhr: Arc<dyn Clock>,
    max_nachrichten_laenge: usize,
    auth: AuthenticationClient,
    chat: Option<ChatRelay>,
    peer_links: PeerLinkManager,
    status: StatusTracker,
    befehle: mpsc::Receiver<TeilnehmerBefehl>,
    ereignisse: broadcast::Sender<TeilnehmerEreignis>,
}

impl TeilnehmerRuntime {
    /// `origin` ist der eigene Origin, der in der Join-Anfrage steht
    pub fn neu(
        eigene_id: PeerId,
        host: PeerId,
        origin: impl Into<String>,
        config: &SessionConfig,
        transport: Arc<dyn Transport>,
        media: Arc<dyn MediaLink>,
        uhr: Arc<dyn Clock>,
    ) -> (Self, TeilnehmerHandle) {
        let (ereignisse, _) = broadcast::channel(EREIGNIS_KANAL_GROESSE);
        let (befehl_tx, befehl_rx) = mpsc::channel(BEFEHL_QUEUE_GROESSE);
        let auth = AuthenticationClient::neu(host.clone(), Arc::clone(&transport), config);

        let runtime = Self {
            eigene_id,
            host,
            origin: origin.into(),
            transport,
            uhr,
            max_nachrichten_laenge: config.max_nachrichten_laenge,
            auth,
            chat: None,
            peer_links: PeerLinkManager::neu(media, Teilnehmerliste::neu()),
            status: StatusTracker::neu(),
            befehle: befehl_rx,
            ereignisse: ereignisse.clone(),
        };
        let handle = TeilnehmerHandle {
            befehle: befehl_tx,
            ereignisse,
        };
        (runtime, handle)
    }

    /// Verarbeitet Ereignisse bis der Kanal zum Host zu ist oder
    /// abgebrochen wurde
    pub async fn starten(mut self, mut eingang: mpsc::Receiver<TransportEreignis>) {
        self.status_wechseln(ConnectionStatus::Initializing);

        loop {
            tokio::select! {
                ereignis = eingang.recv() => match ereignis {
                    Some(ereignis) => {
                        if !self.transport_ereignis(ereignis) {
                            break;
                        }
                    }
                    None => {
                        self.kanal_verloren();
                        break;
                    }
                },
                Some(befehl) = self.befehle.recv() => {
                    if !self.befehl_ausfuehren(befehl).await {
                        break;
                    }
                }
            }
        }

        tracing::debug!(peer = %self.eigene_id, status = %self.status.aktuell(), "Teilnehmer beendet");
    }

    /// Gibt `false` zurueck, wenn die Laufzeit enden soll
    fn transport_ereignis(&mut self, ereignis: TransportEreignis) -> bool {
        if ereignis.peer() != &self.host {
            tracing::debug!(peer = %ereignis.peer(), "Ereignis von fremdem Peer ignoriert");
            return true;
        }
        match ereignis {
            TransportEreignis::Geoeffnet(_) => {
                self.status_wechseln(ConnectionStatus::Connecting);
                if let Err(e) = self
                    .transport
                    .senden(&self.host, Envelope::join_anfrage(self.origin.clone()))
                {
                    tracing::warn!(fehler = %e, "Join-Anfrage nicht gesendet");
                }
                true
            }
            TransportEreignis::Nachricht {
                envelope: Envelope::ChatMessage(chat),
                ..
            } => {
                let Some(relay) = self.chat.as_mut() else {
                    tracing::debug!("Chat vor Zulassung ignoriert");
                    return true;
                };
                let ereignis = match relay.empfangen(&self.host, chat) {
                    Empfang::Angezeigt { .. } => relay
                        .verlauf()
                        .nachrichten()
                        .last()
                        .cloned()
                        .map(TeilnehmerEreignis::ChatEmpfangen),
                    Empfang::Verworfen(grund) => Some(TeilnehmerEreignis::ChatVerworfen(grund)),
                };
                if let Some(ereignis) = ereignis {
                    self.melden(ereignis);
                }
                true
            }
            TransportEreignis::Nachricht { envelope, .. } => {
                if let Some(ereignis) = self.auth.verarbeiten(envelope) {
                    self.client_ereignis(ereignis);
                }
                true
            }
            TransportEreignis::Geschlossen(_) => {
                self.kanal_verloren();
                false
            }
        }
    }

    fn client_ereignis(&mut self, ereignis: ClientEreignis) {
        match ereignis {
            ClientEreignis::PasswortErforderlich => {
                self.melden(TeilnehmerEreignis::PasswortErforderlich);
            }
            ClientEreignis::PasswortAbgelehnt { verbleibend, grund } => {
                self.melden(TeilnehmerEreignis::PasswortAbgelehnt { verbleibend, grund });
            }
            ClientEreignis::Zugelassen { chat_schluessel } => {
                self.status_wechseln(ConnectionStatus::Connected);
                self.chat_einrichten(chat_schluessel);
                self.melden(TeilnehmerEreignis::Zugelassen);
            }
            ClientEreignis::Abgelehnt { grund } => {
                self.status_wechseln(ConnectionStatus::Failed);
                self.melden(TeilnehmerEreignis::Abgelehnt { grund });
            }
        }
    }

    fn chat_einrichten(&mut self, schluessel: Option<ChatSchluessel>) {
        let codec = match schluessel {
            Some(schluessel) => NachrichtenCodec::mit_schluessel(schluessel),
            None => NachrichtenCodec::klartext(),
        };
        let mut relay = ChatRelay::teilnehmer(
            self.eigene_id.clone(),
            self.host.clone(),
            codec,
            Arc::clone(&self.transport),
            Arc::clone(&self.uhr),
        )
        .mit_max_laenge(self.max_nachrichten_laenge);
        if let Some(zeitpunkt) = self.status.verbindungszeitpunkt_ms() {
            relay.verbindungszeitpunkt_setzen(zeitpunkt);
        }
        self.chat = Some(relay);
    }

    fn kanal_verloren(&mut self) {
        self.auth.abbrechen();
        if !self.status.aktuell().ist_beendet() {
            self.status_wechseln(ConnectionStatus::Disconnected);
        }
        tracing::info!(host = %self.host, "Kanal zum Host geschlossen");
    }

    /// Gibt `false` zurueck, wenn die Laufzeit enden soll
    async fn befehl_ausfuehren(&mut self, befehl: TeilnehmerBefehl) -> bool {
        match befehl {
            TeilnehmerBefehl::PasswortSenden { passwort, antwort } => {
                let _ = antwort.send(self.auth.absenden(&passwort).await);
            }
            TeilnehmerBefehl::ChatSenden { text, antwort } => {
                let ergebnis = match self.chat.as_mut() {
                    Some(relay) => relay.senden(&text).map_err(SignalingError::from),
                    None => Err(SignalingError::zustand("Chat erst nach Zulassung")),
                };
                let _ = antwort.send(ergebnis);
            }
            TeilnehmerBefehl::ChatGeoeffnet(offen) => {
                if let Some(relay) = self.chat.as_mut() {
                    relay.chat_geoeffnet(offen);
                }
            }
            TeilnehmerBefehl::AnrufAnnehmen { handle, antwort } => {
                let ergebnis = if self.auth.zustand() == &ClientZustand::Zugelassen {
                    self.peer_links.anruf_annehmen(handle)
                } else {
                    Err(SignalingError::zustand("Anruf vor Zulassung"))
                };
                let _ = antwort.send(ergebnis);
            }
            TeilnehmerBefehl::Abbrechen => {
                self.auth.abbrechen();
                self.chat = None;
                self.transport.schliessen(&self.host);
                self.status_wechseln(ConnectionStatus::Closed);
                tracing::info!(host = %self.host, "Sitzung verlassen");
                return false;
            }
        }
        true
    }

    fn status_wechseln(&mut self, neu: ConnectionStatus) {
        match self.status.wechseln(neu, self.uhr.jetzt_ms()) {
            Ok(true) => self.melden(TeilnehmerEreignis::Status(neu)),
            Ok(false) => {}
            Err(e) => tracing::warn!(fehler = %e, "Statuswechsel abgelehnt"),
        }
    }

    fn melden(&self, ereignis: TeilnehmerEreignis) {
        let _ = self.ereignisse.send(ereignis);
    }
}
