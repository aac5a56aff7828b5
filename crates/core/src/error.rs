//! Fehlertypen fuer Perspective
//!
//! Zentraler Fehler-Enum fuer die gemeinsamen Bausteine. Die Fach-Crates
//! definieren eigene Fehler und konvertieren bei Bedarf via `#[from]`.

use thiserror::Error;

use crate::status::ConnectionStatus;

/// Globaler Result-Alias fuer Perspective
pub type Result<T> = std::result::Result<T, PerspectiveError>;

/// Fehler der gemeinsamen Bausteine
#[derive(Debug, Error)]
pub enum PerspectiveError {
    // --- Verbindungsstatus ---
    #[error("Ungueltiger Statuswechsel: {von} -> {nach}")]
    UngueltigerStatusWechsel {
        von: ConnectionStatus,
        nach: ConnectionStatus,
    },

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl PerspectiveError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Konfigurationsfehler
    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }
}
