//! TCP-Transport – Datenkanaele ueber laengenpraefixierte JSON-Frames
//!
//! Der [`TcpHost`] bindet einen Socket und startet fuer jede eingehende
//! Verbindung einen eigenen tokio-Task. Teilnehmer verbinden sich mit
//! [`tcp_verbinden`].
//!
//! ## Kennungs-Austausch
//! Vor dem ersten Envelope schicken beide Seiten ihre PeerId als
//! einzelnes Frame (u32 Laenge, UTF-8). Danach laeuft der Kanal ueber
//! den [`FrameCodec`]. Der Austausch hat eine Frist; wer sie verstreichen
//! laesst, wird ohne `Geoeffnet` getrennt. Eine PeerId, die bereits einen
//! offenen Kanal hat, wird abgewiesen.
//!
//! ## Task pro Verbindung
//! Der Task liest Frames und reicht sie als [`TransportEreignis`] weiter,
//! gleichzeitig schreibt er die Send-Queue aus der [`PeerRegistry`].
//! Endet die Queue, wurde lokal geschlossen; alle eingereihten Envelopes
//! sind dann bereits geschrieben.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use perspective_core::types::PeerId;
use perspective_protocol::{Envelope, FrameCodec, Transport, TransportEreignis};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use crate::registry::PeerRegistry;

/// Maximale Laenge einer PeerId im Kennungs-Austausch
const MAX_KENNUNG_LAENGE: usize = 128;

/// Frist fuer den Kennungs-Austausch, falls nichts anderes gesetzt ist
pub const STANDARD_KENNUNG_FRIST: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// TcpHost
// ---------------------------------------------------------------------------

/// Host-Seite des TCP-Transports
pub struct TcpHost {
    listener: TcpListener,
    host_id: PeerId,
    registry: PeerRegistry,
    max_frame: usize,
    kennung_frist: Duration,
}

impl TcpHost {
    /// Bindet den Socket
    pub async fn binden(
        addr: SocketAddr,
        host_id: PeerId,
        registry: PeerRegistry,
        max_frame: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            host_id,
            registry,
            max_frame,
            kennung_frist: STANDARD_KENNUNG_FRIST,
        })
    }

    /// Setzt die Frist fuer den Kennungs-Austausch neuer Verbindungen
    pub fn mit_kennung_frist(mut self, frist: Duration) -> Self {
        self.kennung_frist = frist;
        self
    }

    pub fn lokale_adresse(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen, bis `shutdown_rx` `true` meldet
    pub async fn starten(
        self,
        ereignisse: mpsc::Sender<TransportEreignis>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> io::Result<()> {
        tracing::info!(adresse = %self.listener.local_addr()?, "TCP-Host gestartet");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!(peer_addr = %addr, "Verbindung akzeptiert");
                            let host_id = self.host_id.clone();
                            let registry = self.registry.clone();
                            let ereignisse = ereignisse.clone();
                            let max_frame = self.max_frame;
                            let frist = self.kennung_frist;
                            tokio::spawn(async move {
                                eingehend_betreiben(stream, addr, host_id, registry, ereignisse, max_frame, frist).await;
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("TCP-Host: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        self.registry.alle_schliessen();
        tracing::info!("TCP-Host gestoppt");
        Ok(())
    }
}

async fn eingehend_betreiben(
    mut stream: TcpStream,
    addr: SocketAddr,
    host_id: PeerId,
    registry: PeerRegistry,
    ereignisse: mpsc::Sender<TransportEreignis>,
    max_frame: usize,
    frist: Duration,
) {
    let peer = match kennung_mit_frist(&mut stream, &host_id, frist).await {
        Ok(peer) => peer,
        Err(e) => {
            tracing::warn!(peer_addr = %addr, fehler = %e, "Kennungs-Austausch fehlgeschlagen");
            return;
        }
    };
    if peer == host_id {
        tracing::warn!(peer_addr = %addr, "Gegenseite meldet die Host-Kennung, Verbindung abgewiesen");
        return;
    }
    let Some(sende_rx) = registry.registrieren_falls_frei(peer.clone()) else {
        tracing::warn!(peer = %peer, peer_addr = %addr, "PeerId bereits verbunden, Verbindung abgewiesen");
        return;
    };
    verbindung_betreiben(stream, peer, sende_rx, registry, ereignisse, max_frame).await;
}

// ---------------------------------------------------------------------------
// Teilnehmer-Seite
// ---------------------------------------------------------------------------

/// Verbindet einen Teilnehmer mit einem Host
///
/// Gibt die PeerId des Hosts und den Task der Verbindung zurueck.
pub async fn tcp_verbinden(
    addr: SocketAddr,
    eigene_id: PeerId,
    registry: PeerRegistry,
    ereignisse: mpsc::Sender<TransportEreignis>,
    max_frame: usize,
) -> io::Result<(PeerId, JoinHandle<()>)> {
    let mut stream = TcpStream::connect(addr).await?;
    let host = kennung_mit_frist(&mut stream, &eigene_id, STANDARD_KENNUNG_FRIST).await?;
    tracing::info!(host = %host, adresse = %addr, "Mit Host verbunden");

    let sende_rx = registry.registrieren(host.clone());
    let peer = host.clone();
    let handle = tokio::spawn(async move {
        verbindung_betreiben(stream, peer, sende_rx, registry, ereignisse, max_frame).await;
    });
    Ok((host, handle))
}

// ---------------------------------------------------------------------------
// Gemeinsam
// ---------------------------------------------------------------------------

async fn kennung_mit_frist(
    stream: &mut TcpStream,
    eigene_id: &PeerId,
    frist: Duration,
) -> io::Result<PeerId> {
    tokio::time::timeout(frist, kennung_austauschen(stream, eigene_id))
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("Kennungs-Austausch nach {frist:?} nicht abgeschlossen"),
            )
        })?
}

async fn kennung_austauschen(stream: &mut TcpStream, eigene_id: &PeerId) -> io::Result<PeerId> {
    let eigene = eigene_id.as_str().as_bytes();
    stream.write_u32(eigene.len() as u32).await?;
    stream.write_all(eigene).await?;
    stream.flush().await?;

    let laenge = stream.read_u32().await? as usize;
    if laenge == 0 || laenge > MAX_KENNUNG_LAENGE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Ungueltige Kennungslaenge: {laenge}"),
        ));
    }
    let mut puffer = vec![0u8; laenge];
    stream.read_exact(&mut puffer).await?;
    let kennung = String::from_utf8(puffer)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(PeerId::aus_string(kennung))
}

/// Betreibt einen Kanal, bis eine Seite schliesst
async fn verbindung_betreiben(
    stream: TcpStream,
    peer: PeerId,
    mut sende_rx: mpsc::Receiver<Envelope>,
    registry: PeerRegistry,
    ereignisse: mpsc::Sender<TransportEreignis>,
    max_frame: usize,
) {
    let mut framed = Framed::new(stream, FrameCodec::with_max_size(max_frame));

    if ereignisse
        .send(TransportEreignis::Geoeffnet(peer.clone()))
        .await
        .is_err()
    {
        registry.schliessen(&peer);
        return;
    }

    loop {
        tokio::select! {
            frame = framed.next() => {
                match frame {
                    Some(Ok(envelope)) => {
                        tracing::trace!(peer = %peer, typ = envelope.typ_name(), "Envelope empfangen");
                        let ereignis = TransportEreignis::Nachricht { von: peer.clone(), envelope };
                        if ereignisse.send(ereignis).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(peer = %peer, fehler = %e, "Frame-Lesefehler");
                        break;
                    }
                    None => {
                        tracing::info!(peer = %peer, "Verbindung von Gegenseite getrennt");
                        break;
                    }
                }
            }

            ausgehend = sende_rx.recv() => {
                match ausgehend {
                    Some(envelope) => {
                        if let Err(e) = framed.send(envelope).await {
                            tracing::warn!(peer = %peer, fehler = %e, "Senden fehlgeschlagen");
                            break;
                        }
                    }
                    None => {
                        tracing::debug!(peer = %peer, "Kanal lokal geschlossen");
                        break;
                    }
                }
            }
        }
    }

    registry.schliessen(&peer);
    let _ = ereignisse.send(TransportEreignis::Geschlossen(peer)).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_kanal_in_beide_richtungen() {
        let host_registry = PeerRegistry::neu();
        let host = TcpHost::binden(
            "127.0.0.1:0".parse().unwrap(),
            PeerId::from("host"),
            host_registry.clone(),
            64 * 1024,
        )
        .await
        .unwrap();
        let addr = host.lokale_adresse().unwrap();
        let (host_tx, mut host_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(host.starten(host_tx, shutdown_rx));

        let client_registry = PeerRegistry::neu();
        let (client_tx, mut client_rx) = mpsc::channel(16);
        let (host_id, _task) = tcp_verbinden(
            addr,
            PeerId::from("gast"),
            client_registry.clone(),
            client_tx,
            64 * 1024,
        )
        .await
        .unwrap();
        assert_eq!(host_id, PeerId::from("host"));

        assert_eq!(
            host_rx.recv().await,
            Some(TransportEreignis::Geoeffnet(PeerId::from("gast")))
        );
        assert_eq!(
            client_rx.recv().await,
            Some(TransportEreignis::Geoeffnet(PeerId::from("host")))
        );

        client_registry
            .senden(&host_id, Envelope::join_anfrage("http://localhost"))
            .unwrap();
        assert_eq!(
            host_rx.recv().await,
            Some(TransportEreignis::Nachricht {
                von: PeerId::from("gast"),
                envelope: Envelope::join_anfrage("http://localhost"),
            })
        );

        // Ablehnung wird vor dem Abbau ausgeliefert
        let gast = PeerId::from("gast");
        host_registry
            .senden(&gast, Envelope::beitritt_abgelehnt("nein"))
            .unwrap();
        host_registry.schliessen(&gast);

        assert_eq!(
            client_rx.recv().await,
            Some(TransportEreignis::Nachricht {
                von: PeerId::from("host"),
                envelope: Envelope::beitritt_abgelehnt("nein"),
            })
        );
        assert_eq!(
            client_rx.recv().await,
            Some(TransportEreignis::Geschlossen(PeerId::from("host")))
        );
        assert_eq!(
            host_rx.recv().await,
            Some(TransportEreignis::Geschlossen(PeerId::from("gast")))
        );
    }

    async fn host_starten(
        frist: Duration,
    ) -> (SocketAddr, PeerRegistry, mpsc::Receiver<TransportEreignis>, watch::Sender<bool>) {
        let registry = PeerRegistry::neu();
        let host = TcpHost::binden(
            "127.0.0.1:0".parse().unwrap(),
            PeerId::from("host"),
            registry.clone(),
            64 * 1024,
        )
        .await
        .unwrap()
        .mit_kennung_frist(frist);
        let addr = host.lokale_adresse().unwrap();
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(host.starten(tx, shutdown_rx));
        (addr, registry, rx, shutdown_tx)
    }

    #[tokio::test]
    async fn stummer_client_wird_nach_frist_getrennt() {
        let (addr, registry, mut host_rx, _shutdown) =
            host_starten(Duration::from_millis(200)).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let laenge = stream.read_u32().await.unwrap() as usize;
        let mut kennung = vec![0u8; laenge];
        stream.read_exact(&mut kennung).await.unwrap();
        assert_eq!(kennung, b"host");

        // Keine eigene Kennung senden; der Host muss von sich aus trennen
        let mut rest = Vec::new();
        let gelesen = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
            .await
            .expect("Host hat nicht getrennt")
            .unwrap();
        assert_eq!(gelesen, 0);
        assert!(host_rx.try_recv().is_err());
        assert_eq!(registry.anzahl(), 0);
    }

    #[tokio::test]
    async fn doppelte_peer_id_verdraengt_ersten_kanal_nicht() {
        let (addr, host_registry, mut host_rx, _shutdown) =
            host_starten(STANDARD_KENNUNG_FRIST).await;
        let gast = PeerId::from("gast");

        let erste_registry = PeerRegistry::neu();
        let (erste_tx, mut erste_rx) = mpsc::channel(16);
        let (host_id, _t1) =
            tcp_verbinden(addr, gast.clone(), erste_registry.clone(), erste_tx, 64 * 1024)
                .await
                .unwrap();
        assert_eq!(host_rx.recv().await, Some(TransportEreignis::Geoeffnet(gast.clone())));
        assert_eq!(erste_rx.recv().await, Some(TransportEreignis::Geoeffnet(host_id.clone())));

        let (zweite_tx, mut zweite_rx) = mpsc::channel(16);
        let (_, _t2) = tcp_verbinden(addr, gast.clone(), PeerRegistry::neu(), zweite_tx, 64 * 1024)
            .await
            .unwrap();
        assert_eq!(zweite_rx.recv().await, Some(TransportEreignis::Geoeffnet(host_id.clone())));
        assert_eq!(zweite_rx.recv().await, Some(TransportEreignis::Geschlossen(host_id.clone())));

        // Der erste Kanal laeuft in beide Richtungen weiter
        assert!(host_registry.ist_offen(&gast));
        erste_registry
            .senden(&host_id, Envelope::join_anfrage("http://localhost"))
            .unwrap();
        assert_eq!(
            host_rx.recv().await,
            Some(TransportEreignis::Nachricht {
                von: gast.clone(),
                envelope: Envelope::join_anfrage("http://localhost"),
            })
        );
        host_registry
            .senden(&gast, Envelope::passwort_bestaetigt())
            .unwrap();
        assert_eq!(
            erste_rx.recv().await,
            Some(TransportEreignis::Nachricht {
                von: host_id,
                envelope: Envelope::passwort_bestaetigt(),
            })
        );
    }
}
