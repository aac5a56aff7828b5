//! Gemeinsame Typen fuer das Kryptografie-Subsystem

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Sicherer Schluessel-Container (wird beim Drop genullt)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretBytes(Vec<u8>);

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretBytes([REDACTED] {} bytes)", self.0.len())
    }
}

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nullt den Inhalt sofort, ohne auf den Drop zu warten
    pub fn loeschen(&mut self) {
        self.0.zeroize();
    }
}
