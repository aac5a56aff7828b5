//! Challenge-Response-Primitiven fuer den Passwortschutz
//!
//! ## Ablauf
//! ```text
//! Host                                   Teilnehmer
//!  |  geheimnis = SHA-256(passwort)          |
//!  |--- PASSWORD_REQUEST { nonce } --------->|
//!  |                                         |  k = SHA-256(eingabe)
//!  |<-- PASSWORD_RESPONSE { HMAC(k, nonce) } |
//!  |  HMAC(geheimnis, nonce) == beweis ?     |
//! ```
//!
//! Das Passwort verlaesst nie das Geraet, auf dem es eingegeben wurde.
//! Der Beweis ist lowercase-hex von HMAC-SHA256 ueber die UTF-8-Bytes der
//! Nonce, Schluessel sind die rohen 32 Bytes des SHA-256-Hashs.

use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

/// Standard-Laenge einer Nonce in Bytes (32 Hex-Zeichen)
pub const NONCE_LAENGE: usize = 16;

/// Laenge eines SHA-256-Hashs in Bytes
pub const HASH_LAENGE: usize = 32;

// ---------------------------------------------------------------------------
// GehashtesGeheimnis
// ---------------------------------------------------------------------------

/// SHA-256-Hash eines Passworts, Schluesselmaterial fuer den HMAC-Beweis
#[derive(Clone, Debug)]
pub struct GehashtesGeheimnis(SecretBytes);

impl GehashtesGeheimnis {
    /// Hasht ein eingegebenes Passwort
    pub fn aus_passwort(passwort: &str) -> Self {
        let digest = Sha256::digest(passwort.as_bytes());
        Self(SecretBytes::new(digest.to_vec()))
    }

    /// Uebernimmt einen hex-kodierten Hash
    pub fn aus_hex(hash_hex: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(hash_hex.trim())
            .map_err(|e| CryptoError::auth(format!("Schluesselmaterial kein Hex: {e}")))?;
        if bytes.len() != HASH_LAENGE {
            return Err(CryptoError::UngueltigeSchluesselLaenge {
                erwartet: HASH_LAENGE,
                erhalten: bytes.len(),
            });
        }
        Ok(Self(SecretBytes::new(bytes)))
    }

    /// Hex-Darstellung des Hashs
    pub fn als_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    fn hmac_schluessel(&self) -> hmac::Key {
        hmac::Key::new(hmac::HMAC_SHA256, self.0.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Freie Funktionen
// ---------------------------------------------------------------------------

/// Einweg-Hash eines Passworts als lowercase-hex
pub fn geheimnis_hashen(passwort: &str) -> String {
    GehashtesGeheimnis::aus_passwort(passwort).als_hex()
}

/// Erzeugt eine kryptografisch zufaellige Nonce als Hex-String
pub fn nonce_erzeugen(laenge: usize) -> CryptoResult<String> {
    if laenge == 0 {
        return Err(CryptoError::auth("Nonce-Laenge 0 ist nicht zulaessig"));
    }
    let mut bytes = vec![0u8; laenge];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| CryptoError::auth("Zufallsquelle nicht verfuegbar"))?;
    Ok(hex::encode(bytes))
}

/// Berechnet den Beweis `HMAC-SHA256(geheimnis, nonce)` als Hex
pub fn beweis_berechnen(geheimnis: &GehashtesGeheimnis, nonce: &str) -> String {
    let tag = hmac::sign(&geheimnis.hmac_schluessel(), nonce.as_bytes());
    hex::encode(tag.as_ref())
}

/// Wie [`beweis_berechnen`], mit hex-kodiertem Schluesselmaterial
///
/// Ungueltiges Material liefert `CryptoError::Auth` bzw.
/// `UngueltigeSchluesselLaenge`; der Challenge-Zyklus ist dann abzubrechen.
pub fn beweis_aus_hex(geheimnis_hex: &str, nonce: &str) -> CryptoResult<String> {
    let geheimnis = GehashtesGeheimnis::aus_hex(geheimnis_hex)?;
    Ok(beweis_berechnen(&geheimnis, nonce))
}

/// Prueft einen Beweis in konstanter Zeit
///
/// Nicht-hex Beweise gelten als falsch.
pub fn beweis_pruefen(geheimnis: &GehashtesGeheimnis, nonce: &str, beweis_hex: &str) -> bool {
    let beweis = match hex::decode(beweis_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    hmac::verify(&geheimnis.hmac_schluessel(), nonce.as_bytes(), &beweis).is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
