//! Host-Laufzeit – verteilt Transport-Ereignisse auf Sitzungen und Chat
//!
//! ## Architektur
//!
//! ```text
//! TransportEreignis-Queue
//!     |
//!     v
//! HostRuntime (eine Task)
//!     +-- Geoeffnet    -> Sitzungs-Task starten
//!     +-- Zulassung    -> Queue des Sitzungs-Tasks
//!     +-- Chat         -> ChatRelay (nur zugelassene Absender)
//!     +-- Geschlossen  -> Queue des Sitzungs-Tasks schliessen
//!
//! HostHandle -- Befehle (Chat senden, Beenden) --> HostRuntime
//! HostRuntime -- HostEreignis (broadcast) --> Abonnenten (Metriken, UI)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use perspective_chat::{ChatNachricht, ChatRelay, Empfang, VerwerfGrund};
use perspective_core::clock::Clock;
use perspective_core::roster::Teilnehmerliste;
use perspective_core::status::{ConnectionStatus, StatusTracker};
use perspective_core::types::PeerId;
use perspective_crypto::{ChatSchluessel, NachrichtenCodec};
use perspective_protocol::{ChatEnvelope, Envelope, Transport, TransportEreignis};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::admission::{AdmissionController, SitzungsEingang};
use crate::capacity::KapazitaetsTabelle;
use crate::config::SessionConfig;
use crate::error::{Ablehnungsgrund, SignalingError, SignalingResult};
use crate::peer_link::{LokalerStream, MediaLink, PeerLinkManager};
use crate::session::{sitzung_starten, SitzungsKontext};

/// Groesse des Broadcast-Kanals fuer Host-Ereignisse
const EREIGNIS_KANAL_GROESSE: usize = 256;

/// Groesse der Befehls-Queue
const BEFEHL_QUEUE_GROESSE: usize = 32;

// ---------------------------------------------------------------------------
// Ereignisse und Befehle
// ---------------------------------------------------------------------------

/// Ereignisse, die der Host versendet
#[derive(Debug, Clone)]
pub enum HostEreignis {
    /// Status des Hosts hat sich geaendert
    Status(ConnectionStatus),
    Zugelassen(PeerId),
    /// Sitzung endete ohne Zulassung; `None` bei stillem Abbruch
    Abgelehnt {
        peer: PeerId,
        grund: Option<Ablehnungsgrund>,
    },
    Fehlversuch {
        peer: PeerId,
        verbleibend: u32,
    },
    /// Zugelassener Teilnehmer hat die Verbindung beendet
    Getrennt(PeerId),
    ChatGesendet(ChatNachricht),
    ChatEmpfangen(ChatNachricht),
    ChatVerworfen {
        peer: PeerId,
        grund: VerwerfGrund,
    },
    /// Zulassungs-Envelope verworfen, weil die Sitzungs-Queue voll war
    EingangVerworfen { peer: PeerId, typ: &'static str },
}

enum HostBefehl {
    ChatSenden {
        text: String,
        antwort: oneshot::Sender<SignalingResult<ChatNachricht>>,
    },
    ChatGeoeffnet(bool),
    Beenden,
}

// ---------------------------------------------------------------------------
// HostHandle
// ---------------------------------------------------------------------------

/// Steuer-Handle fuer eine laufende [`HostRuntime`]
///
/// Clone teilt den Zugriff.
#[derive(Clone)]
pub struct HostHandle {
    host_id: PeerId,
    befehle: mpsc::Sender<HostBefehl>,
    ereignisse: broadcast::Sender<HostEreignis>,
    peer_links: PeerLinkManager,
    kapazitaet: KapazitaetsTabelle,
}

impl HostHandle {
    pub fn host_id(&self) -> &PeerId {
        &self.host_id
    }

    /// Abonniert Host-Ereignisse
    pub fn abonnieren(&self) -> broadcast::Receiver<HostEreignis> {
        self.ereignisse.subscribe()
    }

    /// Sendet eine Chat-Nachricht an alle zugelassenen Teilnehmer
    pub async fn chat_senden(&self, text: impl Into<String>) -> SignalingResult<ChatNachricht> {
        let (antwort, rx) = oneshot::channel();
        self.befehle
            .send(HostBefehl::ChatSenden {
                text: text.into(),
                antwort,
            })
            .await
            .map_err(|_| SignalingError::VerbindungGetrennt)?;
        rx.await.map_err(|_| SignalingError::VerbindungGetrennt)?
    }

    /// Markiert die Chat-Oberflaeche als geoeffnet oder geschlossen
    pub async fn chat_geoeffnet(&self, offen: bool) -> SignalingResult<()> {
        self.befehle
            .send(HostBefehl::ChatGeoeffnet(offen))
            .await
            .map_err(|_| SignalingError::VerbindungGetrennt)
    }

    /// Setzt oder wechselt den lokalen Media-Stream
    pub fn stream_setzen(&self, stream: LokalerStream) {
        self.peer_links.stream_setzen(stream);
    }

    pub fn peer_links(&self) -> &PeerLinkManager {
        &self.peer_links
    }

    /// Anzahl zugelassener Teilnehmer
    pub fn teilnehmer_anzahl(&self) -> usize {
        self.peer_links.teilnehmer().anzahl()
    }

    /// Belegte Slots (zugelassen + in Authentifizierung)
    pub fn belegte_slots(&self) -> usize {
        self.kapazitaet.belegt()
    }

    /// Beendet die Laufzeit und schliesst alle Kanaele
    pub async fn beenden(&self) {
        let _ = self.befehle.send(HostBefehl::Beenden).await;
    }
}

// ---------------------------------------------------------------------------
// HostRuntime
// ---------------------------------------------------------------------------

/// Laufzeit des Hosts einer Sitzung
pub struct HostRuntime {
    host_id: PeerId,
    kontext: SitzungsKontext,
    chat: ChatRelay,
    status: StatusTracker,
    uhr: Arc<dyn Clock>,
    sitzungen: HashMap<PeerId, mpsc::Sender<SitzungsEingang>>,
    befehle: mpsc::Receiver<HostBefehl>,
}

impl HostRuntime {
    /// Baut die Laufzeit samt Steuer-Handle
    ///
    /// Ist ein Passwort gesetzt, wird hier einmalig der Chat-Schluessel
    /// abgeleitet.
    pub fn neu(
        host_id: PeerId,
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        media: Arc<dyn MediaLink>,
        uhr: Arc<dyn Clock>,
    ) -> SignalingResult<(Self, HostHandle)> {
        let codec = match config.aktives_passwort() {
            Some(passwort) => NachrichtenCodec::mit_schluessel(ChatSchluessel::ableiten_mit(
                passwort,
                config.chat_iterationen,
            )?),
            None => NachrichtenCodec::klartext(),
        };
        let max_nachrichten_laenge = config.max_nachrichten_laenge;

        let teilnehmer = Teilnehmerliste::neu();
        let controller = AdmissionController::neu(config);
        let peer_links = PeerLinkManager::neu(media, teilnehmer.clone());
        let (ereignisse, _) = broadcast::channel(EREIGNIS_KANAL_GROESSE);
        let (befehl_tx, befehl_rx) = mpsc::channel(BEFEHL_QUEUE_GROESSE);

        let chat = ChatRelay::host(
            host_id.clone(),
            codec,
            Arc::clone(&transport),
            teilnehmer,
            Arc::clone(&uhr),
        )
        .mit_max_laenge(max_nachrichten_laenge);

        let handle = HostHandle {
            host_id: host_id.clone(),
            befehle: befehl_tx,
            ereignisse: ereignisse.clone(),
            peer_links: peer_links.clone(),
            kapazitaet: controller.kapazitaet().clone(),
        };

        let runtime = Self {
            host_id,
            kontext: SitzungsKontext {
                controller,
                transport,
                peer_links,
                ereignisse,
            },
            chat,
            status: StatusTracker::neu(),
            uhr,
            sitzungen: HashMap::new(),
            befehle: befehl_rx,
        };
        Ok((runtime, handle))
    }

    /// Verarbeitet Transport-Ereignisse bis zum Beenden
    ///
    /// Endet, wenn die Ereignis-Queue geschlossen wird oder `beenden`
    /// aufgerufen wurde.
    pub async fn starten(mut self, mut eingang: mpsc::Receiver<TransportEreignis>) {
        self.status_wechseln(ConnectionStatus::Initializing);
        self.status_wechseln(ConnectionStatus::WaitingForPeer);
        if let Some(zeitpunkt) = self.status.verbindungszeitpunkt_ms() {
            self.chat.verbindungszeitpunkt_setzen(zeitpunkt);
        }

        tracing::info!(
            host = %self.host_id,
            passwort = self.kontext.controller.passwort_geschuetzt(),
            max = self.kontext.controller.kapazitaet().max(),
            "Host bereit"
        );

        loop {
            tokio::select! {
                ereignis = eingang.recv() => match ereignis {
                    Some(ereignis) => self.transport_ereignis(ereignis),
                    None => {
                        tracing::info!("Transport-Queue geschlossen");
                        break;
                    }
                },
                Some(befehl) = self.befehle.recv() => {
                    if !self.befehl_ausfuehren(befehl) {
                        break;
                    }
                }
            }
        }

        for peer in self.sitzungen.keys() {
            self.kontext.transport.schliessen(peer);
        }
        self.sitzungen.clear();
        self.status_wechseln(ConnectionStatus::Closed);
        tracing::info!(host = %self.host_id, "Host beendet");
    }

    fn transport_ereignis(&mut self, ereignis: TransportEreignis) {
        match ereignis {
            TransportEreignis::Geoeffnet(peer) => {
                if self.sitzungen.contains_key(&peer) {
                    tracing::debug!(peer = %peer, "Kanal bereits offen");
                    return;
                }
                tracing::info!(peer = %peer, "Neuer Datenkanal");
                let (tx, _) = sitzung_starten(peer.clone(), self.kontext.clone());
                self.sitzungen.insert(peer, tx);
            }
            TransportEreignis::Nachricht {
                von,
                envelope: Envelope::ChatMessage(chat),
            } => self.chat_empfangen(&von, chat),
            TransportEreignis::Nachricht { von, envelope } => {
                let Some(tx) = self.sitzungen.get(&von) else {
                    tracing::debug!(peer = %von, "Nachricht ohne Sitzung ignoriert");
                    return;
                };
                let typ = envelope.typ_name();
                match tx.try_send(SitzungsEingang::Nachricht(envelope)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(peer = %von, typ, "Sitzungs-Queue voll, Envelope verworfen");
                        self.kontext
                            .melden(HostEreignis::EingangVerworfen { peer: von, typ });
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        tracing::debug!(peer = %von, typ, "Sitzung bereits beendet");
                    }
                }
            }
            TransportEreignis::Geschlossen(peer) => {
                // Fallenlassen des Senders meldet dem Task das Schliessen
                if self.sitzungen.remove(&peer).is_some() {
                    tracing::debug!(peer = %peer, "Datenkanal geschlossen");
                }
            }
        }
    }

    fn chat_empfangen(&mut self, von: &PeerId, envelope: ChatEnvelope) {
        match self.chat.empfangen(von, envelope) {
            Empfang::Angezeigt { .. } => {
                if let Some(nachricht) = self.chat.verlauf().nachrichten().last() {
                    self.kontext.melden(HostEreignis::ChatEmpfangen(nachricht.clone()));
                }
            }
            Empfang::Verworfen(grund) => {
                self.kontext.melden(HostEreignis::ChatVerworfen {
                    peer: von.clone(),
                    grund,
                });
            }
        }
    }

    /// Gibt `false` zurueck, wenn die Laufzeit enden soll
    fn befehl_ausfuehren(&mut self, befehl: HostBefehl) -> bool {
        match befehl {
            HostBefehl::ChatSenden { text, antwort } => {
                let ergebnis = self.chat.senden(&text).map_err(SignalingError::from);
                if let Ok(nachricht) = &ergebnis {
                    self.kontext.melden(HostEreignis::ChatGesendet(nachricht.clone()));
                }
                let _ = antwort.send(ergebnis);
                true
            }
            HostBefehl::ChatGeoeffnet(offen) => {
                self.chat.chat_geoeffnet(offen);
                true
            }
            HostBefehl::Beenden => {
                tracing::info!("Beenden angefordert");
                false
            }
        }
    }

    fn status_wechseln(&mut self, neu: ConnectionStatus) {
        match self.status.wechseln(neu, self.uhr.jetzt_ms()) {
            Ok(true) => self.kontext.melden(HostEreignis::Status(neu)),
            Ok(false) => {}
            Err(e) => tracing::warn!(fehler = %e, "Statuswechsel abgelehnt"),
        }
    }
}
