//! Fehlertypen fuer das Chat-Crate

use perspective_crypto::CryptoError;
use perspective_protocol::TransportFehler;
use thiserror::Error;

/// Chat-Fehlertypen
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    #[error("Nachricht zu lang: {laenge} Zeichen (Maximum: {max})")]
    ZuLang { laenge: usize, max: usize },

    #[error("Kein Empfaenger fuer Nachricht: {0}")]
    KeinEmpfaenger(String),

    #[error("Krypto-Fehler: {0}")]
    Krypto(#[from] CryptoError),

    #[error("Transport-Fehler: {0}")]
    Transport(#[from] TransportFehler),
}

pub type ChatResult<T> = Result<T, ChatError>;
