//! Zeitquelle in Millisekunden
//!
//! Chat-Zeitstempel werden zwischen Peers verglichen und sind daher
//! Wanduhr-Zeit. `SystemClock` stellt sicher, dass die gelieferten Werte
//! innerhalb eines Prozesses nie zuruecklaufen.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Liefert den aktuellen Zeitpunkt in Millisekunden seit Unix-Epoche
pub trait Clock: Send + Sync {
    fn jetzt_ms(&self) -> u64;
}

/// Systemuhr mit Monotonie-Garantie
#[derive(Debug, Default)]
pub struct SystemClock {
    letzter: AtomicU64,
}

impl SystemClock {
    pub fn neu() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn jetzt_ms(&self) -> u64 {
        let wand = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let vorher = self.letzter.fetch_max(wand, Ordering::AcqRel);
        vorher.max(wand)
    }
}

/// Manuell gesteuerte Uhr fuer Tests und Simulationen
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    jetzt: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn neu(start_ms: u64) -> Self {
        Self {
            jetzt: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn setzen(&self, ms: u64) {
        self.jetzt.store(ms, Ordering::Release);
    }

    pub fn vorstellen(&self, ms: u64) {
        self.jetzt.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn jetzt_ms(&self) -> u64 {
        self.jetzt.load(Ordering::Acquire)
    }
}
