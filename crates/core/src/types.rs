//! Gemeinsame Identifikations- und Rollentypen fuer Perspective
//!
//! IDs verwenden das Newtype-Pattern, damit Peer-Kennungen und
//! Nachrichten-IDs zur Compilezeit nicht verwechselt werden koennen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Kennungen
// ---------------------------------------------------------------------------

/// Opake Transport-Kennung eines Peers
///
/// Eindeutig pro Verbindungsversuch. Der Inhalt wird vom Transport
/// vergeben und nie interpretiert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Erstellt eine neue zufaellige PeerId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Uebernimmt eine vom Transport vergebene Kennung
    pub fn aus_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::aus_string(id)
    }
}

/// Eindeutige ID einer Chat-Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Erstellt eine neue zufaellige MessageId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Rollen und Richtlinien
// ---------------------------------------------------------------------------

/// Rolle eines Absenders innerhalb einer Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rolle {
    /// Der Host, der die Sitzung betreibt und Nachrichten weiterleitet
    Host,
    /// Ein zugelassener Teilnehmer
    Peer,
}

impl Rolle {
    pub fn ist_host(&self) -> bool {
        matches!(self, Self::Host)
    }
}

/// Welche Origins einer Sitzung beitreten duerfen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainPolicy {
    /// Nur Teilnehmer vom selben Origin wie der Host
    #[default]
    SameDomain,
    /// Teilnehmer von beliebigen Origins
    AllDomains,
}

impl DomainPolicy {
    /// Prueft, ob ein Teilnehmer-Origin unter dieser Richtlinie zulaessig ist
    pub fn erlaubt(&self, origin: &str, host_origin: &str) -> bool {
        match self {
            Self::AllDomains => true,
            Self::SameDomain => origin == host_origin,
        }
    }
}

// ---------------------------------------------------------------------------
// Medien
// ---------------------------------------------------------------------------

/// Art der lokalen Medienquelle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedienQuelle {
    Screen,
    Camera,
}

/// Degradationspraeferenz fuer ausgehende Videospuren
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualitaetsPraeferenz {
    /// Aufloesung stabil halten (Bildschirminhalte, Text bleibt lesbar)
    MaintainResolution,
    /// Bildrate stabil halten (Kamera, Bewegung bleibt fluessig)
    MaintainFramerate,
    Balanced,
}

impl QualitaetsPraeferenz {
    /// Waehlt die Praeferenz passend zur aktuellen Quelle
    pub fn fuer_quelle(quelle: Option<MedienQuelle>) -> Self {
        match quelle {
            Some(MedienQuelle::Screen) => Self::MaintainResolution,
            Some(MedienQuelle::Camera) => Self::MaintainFramerate,
            None => Self::Balanced,
        }
    }
}
