//! perspective-signaling – Zulassung, Chat-Routing und Media-Verwaltung
//!
//! Dieser Crate verbindet die Zustandsmaschinen mit tokio: ein Task pro
//! geoeffnetem Datenkanal beim Host, eine Laufzeit pro Teilnehmer und
//! Transporte ueber TCP oder im Speicher.
//!
//! ## Architektur
//!
//! ```text
//! Transport (TcpHost / memory::verbinden)
//!     |  TransportEreignis
//!     v
//! HostRuntime
//!     |
//!     +-- ChatMessage  -> ChatRelay (Weiterleitung an Zugelassene)
//!     +-- Zulassung    -> Sitzungs-Task pro Peer
//!                            |  ParticipantSession (Join, Passwort, Kapazitaet)
//!                            v
//!                         PeerLinkManager (Media-Anrufe nach Zulassung)
//!
//! TeilnehmerRuntime
//!     +-- AuthenticationClient (Challenge, Beweis, Ergebnis)
//!     +-- ChatRelay (nur Host als Gegenstelle)
//! ```

pub mod admission;
pub mod auth_client;
pub mod capacity;
pub mod config;
pub mod error;
pub mod host;
pub mod memory;
pub mod participant;
pub mod peer_link;
pub mod registry;
mod session;
pub mod tcp;

// Bequeme Re-Exporte
pub use admission::{AdmissionController, Aktion, ParticipantSession, SitzungsEingang, ZulassungsZustand};
pub use auth_client::{AuthenticationClient, ClientEreignis, ClientZustand};
pub use capacity::{KapazitaetsTabelle, SlotZustand};
pub use config::SessionConfig;
pub use error::{Ablehnungsgrund, SignalingError, SignalingResult, GRUND_PASSWORT_FALSCH};
pub use host::{HostEreignis, HostHandle, HostRuntime};
pub use memory::{verbinden, Endpunkt};
pub use participant::{TeilnehmerEreignis, TeilnehmerHandle, TeilnehmerRuntime};
pub use peer_link::{LinkHandle, LokalerStream, MediaLink, PeerLinkManager};
pub use registry::PeerRegistry;
pub use tcp::{tcp_verbinden, TcpHost};
