//! Prometheus-kompatible Metriken fuer Perspective
//!
//! Registrierte Metriken:
//! - `perspective_zulassungen_total{ergebnis}` – Counter: Zulassungen nach Ergebnis
//! - `perspective_aktive_teilnehmer` – Gauge: Aktuell zugelassene Teilnehmer
//! - `perspective_passwort_fehlversuche_total` – Counter: Falsche Passwort-Beweise
//! - `perspective_chat_nachrichten_total{richtung}` – Counter: Chat-Nachrichten
//! - `perspective_chat_verworfen_total` – Counter: Verworfene Chat-Nachrichten
//! - `perspective_eingang_verworfen_total` – Counter: Wegen voller Sitzungs-Queue verworfene Envelopes

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Ergebnis-Label fuer `perspective_zulassungen_total`
pub mod ergebnis {
    pub const ZUGELASSEN: &str = "zugelassen";
    pub const DOMAIN: &str = "domain";
    pub const KAPAZITAET: &str = "kapazitaet";
    pub const VERSUCHE: &str = "versuche";
    pub const ABGEBROCHEN: &str = "abgebrochen";
}

/// Richtungs-Label fuer `perspective_chat_nachrichten_total`
pub mod richtung {
    pub const GESENDET: &str = "gesendet";
    pub const EMPFANGEN: &str = "empfangen";
}

/// Alle Perspective-Prometheus-Metriken
#[derive(Clone)]
pub struct PerspectiveMetrics {
    pub registry: Arc<Registry>,

    // Zulassung
    pub zulassungen_total: IntCounterVec,
    pub aktive_teilnehmer: IntGauge,
    pub passwort_fehlversuche_total: IntCounter,
    pub eingang_verworfen_total: IntCounter,

    // Chat
    pub chat_nachrichten_total: IntCounterVec,
    pub chat_verworfen_total: IntCounter,
}

impl PerspectiveMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Zulassung ---
        let zulassungen_total = IntCounterVec::new(
            Opts::new(
                "perspective_zulassungen_total",
                "Abgeschlossene Zulassungen nach Ergebnis",
            ),
            &["ergebnis"],
        )?;
        registry.register(Box::new(zulassungen_total.clone()))?;

        let aktive_teilnehmer = IntGauge::with_opts(Opts::new(
            "perspective_aktive_teilnehmer",
            "Anzahl aktuell zugelassener Teilnehmer",
        ))?;
        registry.register(Box::new(aktive_teilnehmer.clone()))?;

        let passwort_fehlversuche_total = IntCounter::with_opts(Opts::new(
            "perspective_passwort_fehlversuche_total",
            "Gesamtanzahl falscher Passwort-Beweise",
        ))?;
        registry.register(Box::new(passwort_fehlversuche_total.clone()))?;

        let eingang_verworfen_total = IntCounter::with_opts(Opts::new(
            "perspective_eingang_verworfen_total",
            "Zulassungs-Envelopes, die wegen voller Sitzungs-Queue verworfen wurden",
        ))?;
        registry.register(Box::new(eingang_verworfen_total.clone()))?;

        // --- Chat ---
        let chat_nachrichten_total = IntCounterVec::new(
            Opts::new(
                "perspective_chat_nachrichten_total",
                "Chat-Nachrichten nach Richtung",
            ),
            &["richtung"],
        )?;
        registry.register(Box::new(chat_nachrichten_total.clone()))?;

        let chat_verworfen_total = IntCounter::with_opts(Opts::new(
            "perspective_chat_verworfen_total",
            "Verworfene eingehende Chat-Nachrichten",
        ))?;
        registry.register(Box::new(chat_verworfen_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            zulassungen_total,
            aktive_teilnehmer,
            passwort_fehlversuche_total,
            eingang_verworfen_total,
            chat_nachrichten_total,
            chat_verworfen_total,
        })
    }

    pub fn zulassung_zaehlen(&self, ergebnis: &str) {
        self.zulassungen_total.with_label_values(&[ergebnis]).inc();
    }

    pub fn chat_zaehlen(&self, richtung: &str) {
        self.chat_nachrichten_total
            .with_label_values(&[richtung])
            .inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: PerspectiveMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<PerspectiveMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(fehler = %err, "Metriken-Export fehlgeschlagen");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = PerspectiveMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn zulassungen_nach_ergebnis() {
        let metriken = PerspectiveMetrics::neu().unwrap();
        metriken.zulassung_zaehlen(ergebnis::ZUGELASSEN);
        metriken.zulassung_zaehlen(ergebnis::ZUGELASSEN);
        metriken.zulassung_zaehlen(ergebnis::KAPAZITAET);

        let zugelassen = metriken
            .zulassungen_total
            .with_label_values(&[ergebnis::ZUGELASSEN])
            .get();
        let voll = metriken
            .zulassungen_total
            .with_label_values(&[ergebnis::KAPAZITAET])
            .get();
        assert_eq!(zugelassen, 2);
        assert_eq!(voll, 1);
    }

    #[test]
    fn gauge_aktive_teilnehmer() {
        let metriken = PerspectiveMetrics::neu().unwrap();
        metriken.aktive_teilnehmer.inc();
        metriken.aktive_teilnehmer.inc();
        metriken.aktive_teilnehmer.dec();
        assert_eq!(metriken.aktive_teilnehmer.get(), 1);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = PerspectiveMetrics::neu().unwrap();
        metriken.passwort_fehlversuche_total.inc();
        metriken.chat_zaehlen(richtung::EMPFANGEN);

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("perspective_passwort_fehlversuche_total 1"));
        assert!(output.contains("perspective_chat_nachrichten_total{richtung=\"empfangen\"} 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn alle_metriken_in_registry_registriert() {
        let metriken = PerspectiveMetrics::neu().unwrap();

        // Vec-Metriken erscheinen in gather() erst nach dem ersten Label-Zugriff
        metriken.zulassung_zaehlen(ergebnis::DOMAIN);
        metriken.chat_zaehlen(richtung::GESENDET);

        let families = metriken.registry.gather();
        let namen: Vec<&str> = families.iter().map(|f| f.get_name()).collect();

        assert!(namen.contains(&"perspective_zulassungen_total"));
        assert!(namen.contains(&"perspective_aktive_teilnehmer"));
        assert!(namen.contains(&"perspective_passwort_fehlversuche_total"));
        assert!(namen.contains(&"perspective_chat_nachrichten_total"));
        assert!(namen.contains(&"perspective_chat_verworfen_total"));
        assert!(namen.contains(&"perspective_eingang_verworfen_total"));
    }
}
