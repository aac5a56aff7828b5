//! Fehlertypen fuer das Kryptografie-Subsystem

use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Fehler eines Primitivs im Challenge-Response-Ablauf
    #[error("Authentifizierungs-Primitiv fehlgeschlagen: {0}")]
    Auth(String),

    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivation(String),
}

impl CryptoError {
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Gehoert der Fehler zur Klasse "Nachricht nicht entschluesselbar"?
    ///
    /// Solche Nachrichten werden verworfen, nie teilweise angezeigt.
    pub fn ist_entschluesselungsfehler(&self) -> bool {
        matches!(self, Self::Entschluesselung(_) | Self::UngueltigeDaten(_))
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
