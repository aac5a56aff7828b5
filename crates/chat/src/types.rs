//! Oeffentliche Typen fuer den Chat

use perspective_core::types::{PeerId, Rolle};
use perspective_protocol::ChatEnvelope;
use serde::{Deserialize, Serialize};

/// Maximale Laenge einer Chat-Nachricht in Zeichen
pub const MAX_NACHRICHTEN_LAENGE: usize = 128;

/// Eine angezeigte Chat-Nachricht (immer Klartext)
///
/// Unveraenderlich nach dem Anlegen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatNachricht {
    pub id: String,
    pub sender_id: PeerId,
    pub sender_role: Rolle,
    pub text: String,
    /// Millisekunden seit Unix-Epoche (Absender-Uhr)
    pub timestamp: u64,
    /// War die Nachricht auf dem Draht verschluesselt?
    pub encrypted: bool,
    pub iv: Option<String>,
}

impl ChatNachricht {
    /// Uebernimmt Metadaten aus einem Envelope mit entschluesseltem Text
    pub fn aus_envelope(envelope: &ChatEnvelope, klartext: String) -> Self {
        Self {
            id: envelope.id.clone(),
            sender_id: envelope.sender_id.clone(),
            sender_role: envelope.sender_role,
            text: klartext,
            timestamp: envelope.timestamp,
            encrypted: envelope.encrypted,
            iv: envelope.iv.clone(),
        }
    }
}

/// Warum eine empfangene Nachricht nicht angezeigt wurde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerwerfGrund {
    /// Absender ist (noch) kein zugelassener Teilnehmer
    NichtZugelassen,
    /// Absender-Angaben passen nicht zum Transport-Peer
    UngueltigerAbsender,
    /// Entschluesselung oder Authentifizierung fehlgeschlagen
    Entschluesselung,
    /// Zeitstempel liegt vor dem eigenen Verbindungszeitpunkt
    Veraltet,
    /// Leerer oder ueberlanger Text
    UngueltigerInhalt,
}

/// Ergebnis von `ChatRelay::empfangen`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Empfang {
    Angezeigt {
        /// Unread-Zaehler wurde erhoeht (Chat war geschlossen)
        ungelesen_erhoeht: bool,
        /// Anzahl der Teilnehmer, an die der Host weitergeleitet hat
        weitergeleitet: usize,
    },
    Verworfen(VerwerfGrund),
}
