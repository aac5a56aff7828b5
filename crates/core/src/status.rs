//! Verbindungsstatus – beidseitig genutzte Zustandsanzeige
//!
//! Der Status schreitet pro Verbindungsversuch nur vorwaerts fort:
//!
//! ```text
//! Idle -> Initializing -> WaitingForPeer | Connecting -> Connected
//!                                                            |
//!                                    Disconnected | Failed <-+
//!                                                  |
//!                                                  v
//!                                                Closed
//! ```
//!
//! Zurueck auf `Idle` geht es ausschliesslich ueber
//! [`StatusTracker::zuruecksetzen`].

use serde::{Deserialize, Serialize};

use crate::error::{PerspectiveError, Result};

/// Verbindungsstatus eines Hosts oder Teilnehmers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Idle,
    Initializing,
    WaitingForPeer,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionStatus {
    /// Fortschrittsstufe fuer die Monotonie-Pruefung
    fn stufe(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Initializing => 1,
            Self::WaitingForPeer | Self::Connecting => 2,
            Self::Connected => 3,
            Self::Disconnected | Self::Failed => 4,
            Self::Closed => 5,
        }
    }

    /// Setzt dieser Status den Verbindungszeitpunkt fuer den Chat?
    pub fn setzt_verbindungszeitpunkt(&self) -> bool {
        matches!(self, Self::WaitingForPeer | Self::Connected)
    }

    pub fn ist_beendet(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Closed)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::WaitingForPeer => "waiting_for_peer",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Verfolgt den Verbindungsstatus und den Verbindungszeitpunkt
///
/// Der Verbindungszeitpunkt wird beim ersten Erreichen von
/// `WaitingForPeer` oder `Connected` festgehalten. Chat-Nachrichten
/// mit aelterem Zeitstempel werden nie angezeigt.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    aktuell: ConnectionStatus,
    verbindungszeitpunkt_ms: Option<u64>,
}

impl StatusTracker {
    pub fn neu() -> Self {
        Self {
            aktuell: ConnectionStatus::Idle,
            verbindungszeitpunkt_ms: None,
        }
    }

    pub fn aktuell(&self) -> ConnectionStatus {
        self.aktuell
    }

    pub fn verbindungszeitpunkt_ms(&self) -> Option<u64> {
        self.verbindungszeitpunkt_ms
    }

    /// Wechselt in einen neuen Status
    ///
    /// Gibt `Ok(false)` zurueck, wenn der Status bereits gesetzt war.
    /// Rueckschritte liefern `UngueltigerStatusWechsel`.
    pub fn wechseln(&mut self, neu: ConnectionStatus, jetzt_ms: u64) -> Result<bool> {
        if neu == self.aktuell {
            return Ok(false);
        }
        if neu.stufe() <= self.aktuell.stufe() {
            return Err(PerspectiveError::UngueltigerStatusWechsel {
                von: self.aktuell,
                nach: neu,
            });
        }

        if neu.setzt_verbindungszeitpunkt() && self.verbindungszeitpunkt_ms.is_none() {
            self.verbindungszeitpunkt_ms = Some(jetzt_ms);
        }
        self.aktuell = neu;
        Ok(true)
    }

    /// Expliziter Reset auf `Idle` (Trennen / neuer Versuch)
    pub fn zuruecksetzen(&mut self) {
        self.aktuell = ConnectionStatus::Idle;
        self.verbindungszeitpunkt_ms = None;
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::neu()
    }
}
