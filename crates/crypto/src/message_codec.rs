//! Chat-Verschluesselung mit passwortabgeleitetem Schluessel
//!
//! ## Verfahren
//! - Schluessel: PBKDF2-HMAC-SHA256, fester Anwendungs-Salt, 100 000 Iterationen, 32 Bytes
//! - AEAD: AES-256-GCM mit zufaelligem 12-Byte-IV pro Nachricht
//! - Draht: Ciphertext (inkl. 16-Byte-Tag) und IV jeweils lowercase-hex
//!
//! Der Schluessel wird einmal pro Sitzung abgeleitet und in
//! [`ChatSchluessel`] gehalten.

use std::num::NonZeroU32;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce as AesNonce,
};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{CryptoError, CryptoResult};
use crate::types::SecretBytes;

/// Anwendungsspezifischer Salt fuer die Schluesselableitung
pub const CHAT_SALT: &[u8] = b"perspective-chat-salt";

/// PBKDF2-Iterationen
pub const PBKDF2_ITERATIONEN: u32 = 100_000;

/// Laenge des AES-GCM-IV in Bytes
pub const IV_LAENGE: usize = 12;

/// Laenge des AES-256-Schluessels in Bytes
pub const SCHLUESSEL_LAENGE: usize = 32;

// ---------------------------------------------------------------------------
// Typen
// ---------------------------------------------------------------------------

/// Verschluesselter Text in Draht-Darstellung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerschluesselterText {
    pub ciphertext: String,
    pub iv: String,
}

/// Aus dem Sitzungspasswort abgeleiteter AES-256-GCM-Schluessel
#[derive(Clone, Debug)]
pub struct ChatSchluessel {
    bytes: SecretBytes,
}

impl ChatSchluessel {
    /// Leitet den Schluessel mit den Standard-Parametern ab
    pub fn ableiten(passwort: &str) -> CryptoResult<Self> {
        Self::ableiten_mit(passwort, PBKDF2_ITERATIONEN)
    }

    /// Leitet den Schluessel mit einer bestimmten Iterationszahl ab
    pub fn ableiten_mit(passwort: &str, iterationen: u32) -> CryptoResult<Self> {
        let iterationen = NonZeroU32::new(iterationen)
            .ok_or_else(|| CryptoError::KeyDerivation("Iterationszahl 0".into()))?;
        let mut schluessel = vec![0u8; SCHLUESSEL_LAENGE];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterationen,
            CHAT_SALT,
            passwort.as_bytes(),
            &mut schluessel,
        );
        Ok(Self {
            bytes: SecretBytes::new(schluessel),
        })
    }

    fn cipher(&self) -> CryptoResult<Aes256Gcm> {
        if self.bytes.len() != SCHLUESSEL_LAENGE {
            return Err(CryptoError::UngueltigeSchluesselLaenge {
                erwartet: SCHLUESSEL_LAENGE,
                erhalten: self.bytes.len(),
            });
        }
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(
            self.bytes.as_bytes(),
        )))
    }

    /// Verschluesselt einen Klartext mit frischem Zufalls-IV
    pub fn verschluesseln(&self, klartext: &str) -> CryptoResult<VerschluesselterText> {
        let mut iv = [0u8; IV_LAENGE];
        SystemRandom::new()
            .fill(&mut iv)
            .map_err(|_| CryptoError::Verschluesselung("Zufallsquelle nicht verfuegbar".into()))?;

        let ciphertext = self
            .cipher()?
            .encrypt(AesNonce::from_slice(&iv), klartext.as_bytes())
            .map_err(|e| CryptoError::Verschluesselung(format!("AES-256-GCM: {e}")))?;

        Ok(VerschluesselterText {
            ciphertext: hex::encode(ciphertext),
            iv: hex::encode(iv),
        })
    }

    /// Entschluesselt und authentifiziert einen Ciphertext
    pub fn entschluesseln(&self, ciphertext_hex: &str, iv_hex: &str) -> CryptoResult<String> {
        let iv = hex::decode(iv_hex)
            .map_err(|e| CryptoError::UngueltigeDaten(format!("IV kein Hex: {e}")))?;
        if iv.len() != IV_LAENGE {
            return Err(CryptoError::UngueltigeDaten(format!(
                "IV-Laenge {} statt {}",
                iv.len(),
                IV_LAENGE
            )));
        }
        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|e| CryptoError::UngueltigeDaten(format!("Ciphertext kein Hex: {e}")))?;

        let klartext = self
            .cipher()?
            .decrypt(AesNonce::from_slice(&iv), ciphertext.as_ref())
            .map_err(|_| {
                CryptoError::Entschluesselung("Authentifizierung fehlgeschlagen".into())
            })?;

        String::from_utf8(klartext)
            .map_err(|_| CryptoError::UngueltigeDaten("Klartext ist kein UTF-8".into()))
    }
}

/// Einmalige Verschluesselung mit Passwort (leitet den Schluessel ab)
pub fn verschluesseln(klartext: &str, passwort: &str) -> CryptoResult<VerschluesselterText> {
    ChatSchluessel::ableiten(passwort)?.verschluesseln(klartext)
}

/// Einmalige Entschluesselung mit Passwort (leitet den Schluessel ab)
pub fn entschluesseln(ciphertext_hex: &str, iv_hex: &str, passwort: &str) -> CryptoResult<String> {
    ChatSchluessel::ableiten(passwort)?.entschluesseln(ciphertext_hex, iv_hex)
}

// ---------------------------------------------------------------------------
// NachrichtenCodec
// ---------------------------------------------------------------------------

/// Kodierter Chat-Text, bereit fuer den Envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KodierterText {
    pub text: String,
    pub iv: Option<String>,
    pub verschluesselt: bool,
}

/// Ob ein Sitzungspasswort als gesetzt gilt (nicht leer, nicht nur Leerzeichen)
pub fn passwort_gesetzt(passwort: &str) -> bool {
    !passwort.trim().is_empty()
}

/// Verschluesselt, wenn ein Sitzungspasswort gesetzt ist, sonst Durchreichen
#[derive(Clone, Debug, Default)]
pub struct NachrichtenCodec {
    schluessel: Option<ChatSchluessel>,
}

impl NachrichtenCodec {
    /// Codec ohne Verschluesselung (oeffentliche Sitzung)
    pub fn klartext() -> Self {
        Self { schluessel: None }
    }

    pub fn mit_schluessel(schluessel: ChatSchluessel) -> Self {
        Self {
            schluessel: Some(schluessel),
        }
    }

    /// Leitet den Codec aus einem optionalen Sitzungspasswort ab
    ///
    /// `None` oder ein leeres Passwort ergeben einen Klartext-Codec.
    pub fn aus_passwort(passwort: Option<&str>) -> CryptoResult<Self> {
        match passwort.filter(|p| passwort_gesetzt(p)) {
            Some(p) => Ok(Self::mit_schluessel(ChatSchluessel::ableiten(p)?)),
            None => Ok(Self::klartext()),
        }
    }

    pub fn ist_verschluesselt(&self) -> bool {
        self.schluessel.is_some()
    }

    pub fn kodieren(&self, text: &str) -> CryptoResult<KodierterText> {
        match &self.schluessel {
            Some(schluessel) => {
                let v = schluessel.verschluesseln(text)?;
                Ok(KodierterText {
                    text: v.ciphertext,
                    iv: Some(v.iv),
                    verschluesselt: true,
                })
            }
            None => Ok(KodierterText {
                text: text.to_string(),
                iv: None,
                verschluesselt: false,
            }),
        }
    }

    /// Dekodiert einen empfangenen Text
    ///
    /// Verschluesselte Texte ohne lokalen Schluessel oder ohne IV sind nicht
    /// darstellbar und liefern einen Entschluesselungsfehler.
    pub fn dekodieren(&self, text: &str, iv: Option<&str>, verschluesselt: bool) -> CryptoResult<String> {
        if !verschluesselt {
            return Ok(text.to_string());
        }
        let schluessel = self
            .schluessel
            .as_ref()
            .ok_or_else(|| CryptoError::Entschluesselung("kein Sitzungsschluessel".into()))?;
        let iv = iv.ok_or_else(|| CryptoError::UngueltigeDaten("IV fehlt".into()))?;
        schluessel.entschluesseln(text, iv)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
