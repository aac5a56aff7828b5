//! perspective-server – Bibliotheks-Root
//!
//! Verdrahtet Konfiguration, TCP-Transport, Host-Laufzeit und
//! Observability zu einem lauffaehigen Host-Prozess.

pub mod config;
pub mod media;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use config::ServerConfig;
use media::ProtokollMediaLink;
use perspective_core::clock::SystemClock;
use perspective_core::share_link::share_link_erzeugen;
use perspective_core::types::PeerId;
use perspective_observability::metrics::{ergebnis, richtung};
use perspective_observability::{observability_server_starten, HealthState, PerspectiveMetrics};
use perspective_signaling::{
    Ablehnungsgrund, HostEreignis, HostHandle, HostRuntime, PeerRegistry, TcpHost,
};
use tokio::sync::{broadcast, mpsc, watch};

/// Groesse der Queue zwischen Transport und Host-Laufzeit
const TRANSPORT_QUEUE_GROESSE: usize = 256;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken und Health-Endpunkt
    /// 2. TCP-Transport binden
    /// 3. Host-Laufzeit starten und Share-Link ausgeben
    /// 4. Auf Ctrl-C warten, dann geordnet beenden
    pub async fn starten(self) -> Result<()> {
        let metriken = PerspectiveMetrics::neu()?;
        let health = HealthState::neu();

        if self.config.observability.aktiviert {
            let addr: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let (m, h) = (metriken.clone(), health.clone());
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, m, h).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        let host_id = PeerId::new();
        let registry = PeerRegistry::neu();
        let session_config = self.config.session_config();
        let tcp_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .context("Ungueltige TCP-Adresse")?;
        let tcp_host = TcpHost::binden(
            tcp_addr,
            host_id.clone(),
            registry.clone(),
            self.config.netzwerk.max_frame_groesse,
        )
        .await
        .with_context(|| format!("TCP-Port {tcp_addr} nicht verfuegbar"))?
        .mit_kennung_frist(session_config.join_timeout);

        let (runtime, handle) = HostRuntime::neu(
            host_id.clone(),
            session_config,
            Arc::new(registry),
            Arc::new(ProtokollMediaLink::default()),
            Arc::new(SystemClock::neu()),
        )?;

        tokio::spawn(ereignisse_auswerten(
            handle.abonnieren(),
            handle.clone(),
            metriken,
            health.clone(),
        ));

        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_QUEUE_GROESSE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tcp_task = tokio::spawn(tcp_host.starten(transport_tx, shutdown_rx));
        let host_task = tokio::spawn(runtime.starten(transport_rx));

        tracing::info!(
            host = %host_id,
            adresse = %tcp_addr,
            link = %share_link_erzeugen(&self.config.freigabe.basis_url, &host_id),
            "Sitzung bereit"
        );

        tracing::info!("Host laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Host wird beendet");

        let _ = shutdown_tx.send(true);
        handle.beenden().await;
        health.host_status_setzen(false);

        if let Err(e) = host_task.await {
            tracing::warn!(fehler = %e, "Host-Task abgebrochen");
        }
        match tcp_task.await {
            Ok(Err(e)) => tracing::warn!(fehler = %e, "TCP-Host mit Fehler beendet"),
            Err(e) => tracing::warn!(fehler = %e, "TCP-Task abgebrochen"),
            Ok(Ok(())) => {}
        }
        Ok(())
    }
}

/// Uebertraegt Host-Ereignisse auf Metriken und Health-Zustand
async fn ereignisse_auswerten(
    mut ereignisse: broadcast::Receiver<HostEreignis>,
    handle: HostHandle,
    metriken: PerspectiveMetrics,
    health: HealthState,
) {
    loop {
        match ereignisse.recv().await {
            Ok(ereignis) => {
                ereignis_erfassen(&ereignis, &metriken);
                health.teilnehmer_setzen(handle.teilnehmer_anzahl());
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(verpasst = n, "Host-Ereignisse fuer Metriken verpasst");
                metriken
                    .aktive_teilnehmer
                    .set(handle.teilnehmer_anzahl() as i64);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Bildet ein einzelnes Host-Ereignis auf Metriken ab
pub fn ereignis_erfassen(ereignis: &HostEreignis, metriken: &PerspectiveMetrics) {
    match ereignis {
        HostEreignis::Zugelassen(_) => {
            metriken.zulassung_zaehlen(ergebnis::ZUGELASSEN);
            metriken.aktive_teilnehmer.inc();
        }
        HostEreignis::Abgelehnt { grund, .. } => {
            let label = match grund {
                Some(Ablehnungsgrund::DomainNichtErlaubt) => ergebnis::DOMAIN,
                Some(Ablehnungsgrund::KapazitaetErschoepft) => ergebnis::KAPAZITAET,
                Some(Ablehnungsgrund::VersucheErschoepft) => ergebnis::VERSUCHE,
                None => ergebnis::ABGEBROCHEN,
            };
            metriken.zulassung_zaehlen(label);
        }
        HostEreignis::Fehlversuch { .. } => metriken.passwort_fehlversuche_total.inc(),
        HostEreignis::Getrennt(_) => metriken.aktive_teilnehmer.dec(),
        HostEreignis::ChatGesendet(_) => metriken.chat_zaehlen(richtung::GESENDET),
        HostEreignis::ChatEmpfangen(_) => metriken.chat_zaehlen(richtung::EMPFANGEN),
        HostEreignis::ChatVerworfen { .. } => metriken.chat_verworfen_total.inc(),
        HostEreignis::EingangVerworfen { .. } => metriken.eingang_verworfen_total.inc(),
        HostEreignis::Status(status) => {
            tracing::debug!(status = %status, "Host-Status");
        }
    }
}
