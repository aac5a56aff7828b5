//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Host ohne Konfigurationsdatei
//! lauffaehig ist.

use std::time::Duration;

use perspective_core::types::DomainPolicy;
use perspective_signaling::SessionConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Zulassung und Passwort
    pub sitzung: SitzungsEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    pub chat: ChatEinstellungen,
    /// Share-Links
    pub freigabe: FreigabeEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Einstellungen fuer die Zulassung von Teilnehmern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungsEinstellungen {
    /// Sitzungs-Passwort (leer oder fehlend = offene Sitzung)
    pub passwort: Option<String>,
    pub domain_richtlinie: DomainPolicy,
    /// Origin des Hosts fuer die Domain-Pruefung
    pub host_origin: String,
    pub max_teilnehmer: usize,
    pub max_passwort_versuche: u32,
    /// Frist bis Zulassung oder Ablehnung
    pub join_timeout_sek: u64,
    /// Wartezeit zwischen Ablehnung und Schliessen
    pub schliessen_verzoegerung_ms: u64,
    pub passwort_min_laenge: usize,
    pub passwort_max_laenge: usize,
}

impl Default for SitzungsEinstellungen {
    fn default() -> Self {
        let basis = SessionConfig::default();
        Self {
            passwort: None,
            domain_richtlinie: basis.domain_richtlinie,
            host_origin: basis.host_origin,
            max_teilnehmer: basis.max_teilnehmer,
            max_passwort_versuche: basis.max_passwort_versuche,
            join_timeout_sek: basis.join_timeout.as_secs(),
            schliessen_verzoegerung_ms: basis.schliessen_verzoegerung.as_millis() as u64,
            passwort_min_laenge: basis.passwort_min_laenge,
            passwort_max_laenge: basis.passwort_max_laenge,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den TCP-Transport
    pub bind_adresse: String,
    pub tcp_port: u16,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 9870,
            max_frame_groesse: perspective_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatEinstellungen {
    /// Maximale Zeichenzahl einer Chat-Nachricht
    pub max_nachrichten_laenge: usize,
}

impl Default for ChatEinstellungen {
    fn default() -> Self {
        Self {
            max_nachrichten_laenge: SessionConfig::default().max_nachrichten_laenge,
        }
    }
}

/// Share-Link-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FreigabeEinstellungen {
    /// Basis-URL der Web-Oberflaeche, an die `#/share?peer=` angehaengt wird
    pub basis_url: String,
}

impl Default for FreigabeEinstellungen {
    fn default() -> Self {
        Self {
            basis_url: "http://localhost".into(),
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft Werte, die toml allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        let s = &self.sitzung;
        if s.max_teilnehmer == 0 {
            anyhow::bail!("sitzung.max_teilnehmer muss groesser als 0 sein");
        }
        if s.max_passwort_versuche == 0 {
            anyhow::bail!("sitzung.max_passwort_versuche muss groesser als 0 sein");
        }
        if s.passwort_min_laenge == 0 || s.passwort_min_laenge > s.passwort_max_laenge {
            anyhow::bail!("sitzung.passwort_min_laenge/passwort_max_laenge ungueltig");
        }
        if let Some(passwort) = s.passwort.as_deref().filter(|p| !p.is_empty()) {
            let laenge = passwort.chars().count();
            if laenge < s.passwort_min_laenge || laenge > s.passwort_max_laenge {
                anyhow::bail!(
                    "sitzung.passwort muss {}-{} Zeichen lang sein",
                    s.passwort_min_laenge,
                    s.passwort_max_laenge
                );
            }
        }
        Ok(())
    }

    /// Laufzeitwerte fuer die Zulassung
    pub fn session_config(&self) -> SessionConfig {
        let s = &self.sitzung;
        SessionConfig {
            passwort: s.passwort.clone(),
            domain_richtlinie: s.domain_richtlinie,
            host_origin: s.host_origin.clone(),
            max_teilnehmer: s.max_teilnehmer,
            max_passwort_versuche: s.max_passwort_versuche,
            join_timeout: Duration::from_secs(s.join_timeout_sek),
            schliessen_verzoegerung: Duration::from_millis(s.schliessen_verzoegerung_ms),
            passwort_min_laenge: s.passwort_min_laenge,
            passwort_max_laenge: s.passwort_max_laenge,
            max_nachrichten_laenge: self.chat.max_nachrichten_laenge,
            ..SessionConfig::default()
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }
}
