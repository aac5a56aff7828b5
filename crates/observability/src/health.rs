//! Health-Check-Endpunkt fuer Perspective
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime und Anzahl aktiver Teilnehmer

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub aktive_teilnehmer: usize,
}

/// Geteilter Zustand fuer den Health-Check-Handler
///
/// Der Server aktualisiert Teilnehmerzahl und Host-Zustand.
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    aktive_teilnehmer: Arc<AtomicUsize>,
    host_laeuft: Arc<AtomicBool>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            aktive_teilnehmer: Arc::new(AtomicUsize::new(0)),
            host_laeuft: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn teilnehmer_setzen(&self, anzahl: usize) {
        self.aktive_teilnehmer.store(anzahl, Ordering::Relaxed);
    }

    pub fn aktive_teilnehmer(&self) -> usize {
        self.aktive_teilnehmer.load(Ordering::Relaxed)
    }

    pub fn host_status_setzen(&self, laeuft: bool) {
        self.host_laeuft.store(laeuft, Ordering::Relaxed);
    }

    pub fn antwort(&self) -> HealthResponse {
        let status = if self.host_laeuft.load(Ordering::Relaxed) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            aktive_teilnehmer: self.aktive_teilnehmer(),
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Hoststatus zurueck
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let antwort = state.antwort();
    let http_status = match antwort.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (http_status, Json(antwort))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_state_frisch() {
        let state = HealthState::neu();
        assert!(state.uptime_seconds() < 5);
        assert_eq!(state.aktive_teilnehmer(), 0);
        assert_eq!(state.antwort().status, HealthStatus::Healthy);
    }

    #[test]
    fn teilnehmerzahl_wird_geteilt() {
        let state = HealthState::neu();
        let klon = state.clone();
        klon.teilnehmer_setzen(7);
        assert_eq!(state.antwort().aktive_teilnehmer, 7);
    }

    #[test]
    fn gestoppter_host_ist_unhealthy() {
        let state = HealthState::neu();
        state.host_status_setzen(false);
        assert_eq!(state.antwort().status, HealthStatus::Unhealthy);
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "0.1.0".to_string(),
            uptime_seconds: 3600,
            aktive_teilnehmer: 3,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptime_seconds\":3600"));
        assert!(json.contains("\"aktive_teilnehmer\":3"));
    }

    #[tokio::test]
    async fn handler_liefert_503_wenn_host_gestoppt() {
        let state = HealthState::neu();
        state.host_status_setzen(false);
        let antwort = health_handler(State(state)).await.into_response();
        assert_eq!(antwort.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
