//! # perspective-crypto
//!
//! Kryptografische Primitiven fuer Perspective.
//!
//! ## Module
//! - `auth_codec` - Passwort-Hash, Nonce, HMAC-Beweis (Challenge-Response)
//! - `message_codec` - Chat-Verschluesselung mit passwortabgeleitetem Schluessel
//! - `types` - `SecretBytes`
//! - `error` - Fehlertypen

pub mod auth_codec;
pub mod error;
pub mod message_codec;
pub mod types;

// Bequeme Re-Exports
pub use auth_codec::{
    beweis_aus_hex, beweis_berechnen, beweis_pruefen, geheimnis_hashen, nonce_erzeugen,
    GehashtesGeheimnis, NONCE_LAENGE,
};
pub use error::{CryptoError, CryptoResult};
pub use message_codec::{
    entschluesseln, verschluesseln, ChatSchluessel, KodierterText, NachrichtenCodec,
    VerschluesselterText,
};
pub use types::SecretBytes;
