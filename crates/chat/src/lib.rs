//! perspective-chat – Text-Chat ueber den Zulassungs-Datenkanal
//!
//! Stellt den [`ChatRelay`] bereit: Senden, Empfangen, Hub-Weiterleitung
//! durch den Host, Zeitstempel-Filter und Unread-Zaehler. Ist fuer die
//! Sitzung ein Passwort gesetzt, wird jeder Text mit dem daraus
//! abgeleiteten Schluessel verschluesselt.
//!
//! # Beispiel
//!
//! ```rust,ignore
//! use perspective_chat::ChatRelay;
//!
//! let mut chat = ChatRelay::host(host_id, codec, transport, teilnehmer, uhr);
//! chat.senden("Hallo zusammen!")?;
//! ```

pub mod error;
pub mod relay;
pub mod types;
pub mod verlauf;

pub use error::{ChatError, ChatResult};
pub use relay::ChatRelay;
pub use types::{ChatNachricht, Empfang, VerwerfGrund, MAX_NACHRICHTEN_LAENGE};
pub use verlauf::ChatVerlauf;

#[cfg(test)]
mod tests;
