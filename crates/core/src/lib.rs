//! perspective-core – Gemeinsame Typen, Traits und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Perspective-Crates gemeinsam genutzt werden: Peer-Kennungen,
//! Verbindungsstatus, Zeitquelle, Teilnehmerliste und Freigabe-Links.

pub mod clock;
pub mod error;
pub mod roster;
pub mod share_link;
pub mod status;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{PerspectiveError, Result};
pub use roster::Teilnehmerliste;
pub use share_link::{share_link_erzeugen, share_link_validieren, LinkFehler};
pub use status::{ConnectionStatus, StatusTracker};
pub use types::{DomainPolicy, MedienQuelle, MessageId, PeerId, QualitaetsPraeferenz, Rolle};
