//! Integration-Test: Passwort-Beitritt und Chat ueber echten TCP-Socket

use std::sync::Arc;
use std::time::Duration;

use perspective_core::clock::SystemClock;
use perspective_core::types::{PeerId, QualitaetsPraeferenz};
use perspective_signaling::{
    tcp_verbinden, HostEreignis, HostRuntime, LinkHandle, LokalerStream, MediaLink,
    PeerRegistry, SessionConfig, SignalingResult, TcpHost, TeilnehmerEreignis,
    TeilnehmerRuntime,
};
use tokio::sync::{broadcast, mpsc, watch};

struct OhneMedia;

impl MediaLink for OhneMedia {
    fn anruf_starten(&self, peer: &PeerId, stream: &LokalerStream) -> SignalingResult<LinkHandle> {
        Ok(LinkHandle {
            id: format!("{}-{}", stream.id, peer),
            peer: peer.clone(),
        })
    }

    fn anruf_annehmen(&self, _handle: &LinkHandle) -> SignalingResult<()> {
        Ok(())
    }

    fn spur_ersetzen(&self, _handle: &LinkHandle, _stream: &LokalerStream) -> SignalingResult<()> {
        Ok(())
    }

    fn qualitaet_anwenden(&self, _handle: &LinkHandle, _p: QualitaetsPraeferenz) -> SignalingResult<()> {
        Ok(())
    }
}

async fn naechstes<T: Clone>(rx: &mut broadcast::Receiver<T>, mut f: impl FnMut(&T) -> bool) -> T {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Ok(e) = rx.recv().await {
                if f(&e) {
                    return e;
                }
            }
        }
    })
    .await
    .expect("Ereignis kam nicht rechtzeitig")
}

#[tokio::test]
async fn beitritt_mit_passwort_ueber_tcp() {
    let config = SessionConfig {
        chat_iterationen: 1_000,
        ..SessionConfig::default()
    }
    .mit_passwort("tcp-geheim");

    // Host
    let host_registry = PeerRegistry::neu();
    let tcp_host = TcpHost::binden(
        "127.0.0.1:0".parse().unwrap(),
        PeerId::from("host"),
        host_registry.clone(),
        64 * 1024,
    )
    .await
    .unwrap();
    let addr = tcp_host.lokale_adresse().unwrap();
    let (host_tx, host_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(tcp_host.starten(host_tx, shutdown_rx));

    let (runtime, host) = HostRuntime::neu(
        PeerId::from("host"),
        config.clone(),
        Arc::new(host_registry),
        Arc::new(OhneMedia),
        Arc::new(SystemClock::neu()),
    )
    .unwrap();
    let mut host_ereignisse = host.abonnieren();
    tokio::spawn(runtime.starten(host_rx));

    // Teilnehmer
    let gast_registry = PeerRegistry::neu();
    let (gast_tx, gast_rx) = mpsc::channel(64);
    let (host_id, _verbindung) = tcp_verbinden(
        addr,
        PeerId::from("gast"),
        gast_registry.clone(),
        gast_tx,
        64 * 1024,
    )
    .await
    .unwrap();
    let (gast_runtime, gast) = TeilnehmerRuntime::neu(
        PeerId::from("gast"),
        host_id,
        "http://localhost",
        &config,
        Arc::new(gast_registry),
        Arc::new(OhneMedia),
        Arc::new(SystemClock::neu()),
    );
    let mut gast_ereignisse = gast.abonnieren();
    tokio::spawn(gast_runtime.starten(gast_rx));

    naechstes(&mut gast_ereignisse, |e| {
        matches!(e, TeilnehmerEreignis::PasswortErforderlich)
    })
    .await;
    gast.passwort_senden("tcp-geheim").await.unwrap();
    naechstes(&mut gast_ereignisse, |e| matches!(e, TeilnehmerEreignis::Zugelassen)).await;

    gast.chat_senden("ueber TCP").await.unwrap();
    let empfangen = naechstes(&mut host_ereignisse, |e| {
        matches!(e, HostEreignis::ChatEmpfangen(_))
    })
    .await;
    let HostEreignis::ChatEmpfangen(nachricht) = empfangen else {
        unreachable!()
    };
    assert_eq!(nachricht.text, "ueber TCP");
    assert!(nachricht.encrypted);

    shutdown_tx.send(true).unwrap();
}
