//! Laufzeit-Konfiguration einer Sitzung

use std::time::Duration;

use perspective_core::types::DomainPolicy;
use perspective_crypto::message_codec::{passwort_gesetzt, PBKDF2_ITERATIONEN};

/// Werte, die Host und Teilnehmer fuer eine Sitzung brauchen
///
/// Wird vom Server aus der TOML-Konfiguration gebaut. `Default` entspricht
/// den Protokoll-Konstanten.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sitzungspasswort; `None` oder leer bedeutet oeffentlicher Raum
    pub passwort: Option<String>,
    pub domain_richtlinie: DomainPolicy,
    /// Origin, unter dem der Host erreichbar ist
    pub host_origin: String,
    pub max_teilnehmer: usize,
    pub max_passwort_versuche: u32,
    /// Frist bis zur Zulassung oder Ablehnung
    pub join_timeout: Duration,
    /// Wartezeit zwischen Ablehnung und Schliessen der Verbindung
    pub schliessen_verzoegerung: Duration,
    pub passwort_min_laenge: usize,
    pub passwort_max_laenge: usize,
    pub max_nachrichten_laenge: usize,
    /// PBKDF2-Iterationen fuer den Chat-Schluessel (auf beiden Seiten gleich)
    pub chat_iterationen: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            passwort: None,
            domain_richtlinie: DomainPolicy::SameDomain,
            host_origin: "http://localhost".into(),
            max_teilnehmer: 24,
            max_passwort_versuche: 3,
            join_timeout: Duration::from_secs(30),
            schliessen_verzoegerung: Duration::from_millis(100),
            passwort_min_laenge: 1,
            passwort_max_laenge: 128,
            max_nachrichten_laenge: 128,
            chat_iterationen: PBKDF2_ITERATIONEN,
        }
    }
}

impl SessionConfig {
    /// Das wirksame Passwort
    ///
    /// Leere oder nur aus Leerzeichen bestehende Werte zaehlen als nicht
    /// gesetzt, wie in [`perspective_crypto::NachrichtenCodec::aus_passwort`].
    pub fn aktives_passwort(&self) -> Option<&str> {
        self.passwort.as_deref().filter(|p| passwort_gesetzt(p))
    }

    pub fn mit_passwort(mut self, passwort: impl Into<String>) -> Self {
        self.passwort = Some(passwort.into());
        self
    }
}
