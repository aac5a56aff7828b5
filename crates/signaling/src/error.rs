//! Fehlertypen fuer Zulassung, Authentifizierung und Peer-Links

use perspective_chat::ChatError;
use perspective_crypto::CryptoError;
use perspective_protocol::TransportFehler;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Ablehnungsgruende
// ---------------------------------------------------------------------------

/// Grundtext bei falschem Passwort (nicht final)
pub const GRUND_PASSWORT_FALSCH: &str = "Incorrect password";

/// Policy-Ablehnung eines Teilnehmers
///
/// Jede Ablehnung ist fuer den betroffenen Teilnehmer terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ablehnungsgrund {
    /// Origin passt nicht zur Domain-Richtlinie
    DomainNichtErlaubt,
    /// Maximale Teilnehmerzahl erreicht
    KapazitaetErschoepft,
    /// Maximale Passwort-Versuche aufgebraucht
    VersucheErschoepft,
}

impl Ablehnungsgrund {
    /// Grundtext, wie er auf dem Draht steht
    pub fn als_text(&self) -> &'static str {
        match self {
            Self::DomainNichtErlaubt => "Joining from this domain is not allowed.",
            Self::KapazitaetErschoepft => {
                "Session is at maximum capacity. Please try again later."
            }
            Self::VersucheErschoepft => "Maximum password attempts exceeded",
        }
    }

    /// Kurzname fuer Logs und Metrik-Labels
    pub fn kurzname(&self) -> &'static str {
        match self {
            Self::DomainNichtErlaubt => "domain",
            Self::KapazitaetErschoepft => "kapazitaet",
            Self::VersucheErschoepft => "versuche",
        }
    }
}

impl std::fmt::Display for Ablehnungsgrund {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_text())
    }
}

// ---------------------------------------------------------------------------
// SignalingError
// ---------------------------------------------------------------------------

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Kryptografie-Primitiv fehlgeschlagen
    #[error("Krypto-Fehler: {0}")]
    Krypto(#[from] CryptoError),

    #[error("Transport-Fehler: {0}")]
    Transport(#[from] TransportFehler),

    #[error("Chat-Fehler: {0}")]
    Chat(#[from] ChatError),

    /// Teilnehmer wurde abgelehnt
    #[error("Abgelehnt: {0}")]
    Abgelehnt(Ablehnungsgrund),

    /// Lokale Eingabe verletzt Grenzen (z.B. Passwortlaenge)
    #[error("Ungueltige Eingabe: {0}")]
    UngueltigeEingabe(String),

    /// Operation passt nicht zum aktuellen Zustand
    #[error("Ungueltiger Zustand: {0}")]
    UngueltigerZustand(String),

    /// Media-Link-Operation fehlgeschlagen
    #[error("Media-Fehler: {0}")]
    Media(String),

    /// Laufzeit wurde bereits beendet
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn zustand(msg: impl Into<String>) -> Self {
        Self::UngueltigerZustand(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
