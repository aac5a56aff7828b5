//! Nachrichten-Envelopes zwischen Host und Teilnehmern
//!
//! Alle Nachrichten werden als JSON mit `type`-Tag und `payload`-Objekt
//! uebertragen:
//!
//! ```json
//! {"type": "PASSWORD_REQUEST", "payload": {"nonce": "…", "algorithm": "hmac-sha256"}}
//! ```
//!
//! Unbekannte oder fehlerhafte Envelopes werden an der Protokollgrenze
//! still verworfen ([`Envelope::aus_json`] liefert `None`), da der Absender
//! vermutlich eine abweichende Protokollversion spricht.

use perspective_core::types::{PeerId, Rolle};
use serde::{Deserialize, Serialize};

/// Algorithmus-Kennung fuer Challenge und Beweis
pub const ALGORITHMUS_HMAC_SHA256: &str = "hmac-sha256";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Alle bekannten Nachrichtenarten
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Envelope {
    /// Teilnehmer -> Host: Beitrittswunsch mit eigenem Origin
    SessionJoinRequest(JoinAnfrage),
    /// Host -> Teilnehmer: Beitritt wegen Domain-Richtlinie abgelehnt
    SessionJoinRejected(Ablehnung),
    /// Host -> Teilnehmer: Passwort-Challenge mit Nonce
    PasswordRequest(PasswortAnfrage),
    /// Teilnehmer -> Host: HMAC-Beweis zur Challenge
    PasswordResponse(PasswortAntwort),
    /// Host -> Teilnehmer: zugelassen
    PasswordApproved(Leer),
    /// Host -> Teilnehmer: Beweis falsch, mit Anzahl verbleibender Versuche
    PasswordRejected(PasswortAbgelehnt),
    /// Host -> Teilnehmer: Sitzung voll
    MaxParticipantsExceeded(Ablehnung),
    /// Chat-Nachricht in beide Richtungen
    ChatMessage(ChatEnvelope),
}

/// Fachliche Zuordnung eines Envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kategorie {
    Zulassung,
    Chat,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinAnfrage {
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ablehnung {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswortAnfrage {
    pub nonce: String,
    pub algorithm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswortAntwort {
    pub proof: String,
    pub algorithm: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswortAbgelehnt {
    pub remaining_retries: u32,
    pub reason: String,
}

/// Leerer Payload (`{}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leer {}

/// Chat-Nachricht auf dem Draht
///
/// Bei `encrypted = true` enthaelt `text` den hex-kodierten Ciphertext
/// und `iv` den hex-kodierten Initialisierungsvektor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEnvelope {
    pub id: String,
    pub sender_id: PeerId,
    pub sender_role: Rolle,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    pub timestamp: u64,
    pub encrypted: bool,
}

// ---------------------------------------------------------------------------
// Konstruktoren und Hilfsfunktionen
// ---------------------------------------------------------------------------

impl Envelope {
    pub fn join_anfrage(origin: impl Into<String>) -> Self {
        Self::SessionJoinRequest(JoinAnfrage {
            origin: origin.into(),
        })
    }

    pub fn beitritt_abgelehnt(grund: impl Into<String>) -> Self {
        Self::SessionJoinRejected(Ablehnung {
            reason: grund.into(),
        })
    }

    pub fn passwort_anfrage(nonce: impl Into<String>) -> Self {
        Self::PasswordRequest(PasswortAnfrage {
            nonce: nonce.into(),
            algorithm: ALGORITHMUS_HMAC_SHA256.to_string(),
        })
    }

    pub fn passwort_antwort(beweis: impl Into<String>) -> Self {
        Self::PasswordResponse(PasswortAntwort {
            proof: beweis.into(),
            algorithm: ALGORITHMUS_HMAC_SHA256.to_string(),
        })
    }

    pub fn passwort_bestaetigt() -> Self {
        Self::PasswordApproved(Leer {})
    }

    pub fn passwort_abgelehnt(verbleibend: u32, grund: impl Into<String>) -> Self {
        Self::PasswordRejected(PasswortAbgelehnt {
            remaining_retries: verbleibend,
            reason: grund.into(),
        })
    }

    pub fn kapazitaet_erschoepft(grund: impl Into<String>) -> Self {
        Self::MaxParticipantsExceeded(Ablehnung {
            reason: grund.into(),
        })
    }

    /// Wire-Name des Nachrichtentyps (fuer Logging)
    pub fn typ_name(&self) -> &'static str {
        match self {
            Self::SessionJoinRequest(_) => "SESSION_JOIN_REQUEST",
            Self::SessionJoinRejected(_) => "SESSION_JOIN_REJECTED",
            Self::PasswordRequest(_) => "PASSWORD_REQUEST",
            Self::PasswordResponse(_) => "PASSWORD_RESPONSE",
            Self::PasswordApproved(_) => "PASSWORD_APPROVED",
            Self::PasswordRejected(_) => "PASSWORD_REJECTED",
            Self::MaxParticipantsExceeded(_) => "MAX_PARTICIPANTS_EXCEEDED",
            Self::ChatMessage(_) => "CHAT_MESSAGE",
        }
    }

    pub fn kategorie(&self) -> Kategorie {
        match self {
            Self::ChatMessage(_) => Kategorie::Chat,
            _ => Kategorie::Zulassung,
        }
    }

    /// Serialisiert den Envelope als JSON
    pub fn zu_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert einen Envelope; Unbekanntes wird verworfen
    pub fn aus_json(json: &str) -> Option<Self> {
        match serde_json::from_str::<serde_json::Value>(json) {
            Ok(wert) => Self::aus_wert(wert),
            Err(e) => {
                tracing::debug!(fehler = %e, "Kein gueltiges JSON – Envelope verworfen");
                None
            }
        }
    }

    /// Interpretiert einen bereits geparsten JSON-Wert
    pub fn aus_wert(wert: serde_json::Value) -> Option<Self> {
        let typ = wert
            .get("type")
            .and_then(|t| t.as_str())
            .map(str::to_owned);
        match serde_json::from_value(wert) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::debug!(
                    typ = typ.as_deref().unwrap_or("<ohne>"),
                    fehler = %e,
                    "Unbekannter oder fehlerhafter Envelope verworfen"
                );
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
