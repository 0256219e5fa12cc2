use axum::{extract::State, Json};
use serde::Serialize;

use crate::governor::{AdmissionSnapshot, CacheSummary};
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub model: String,
}

#[derive(Serialize)]
pub struct PacingStatus {
    pub interval_ms: u64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
}

#[derive(Serialize)]
pub struct GovernorStatus {
    pub now_ms: u64,
    pub admission: AdmissionSnapshot,
    pub cache: CacheSummary,
    pub pending_refreshes: usize,
    pub pacing: PacingStatus,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        model: state.settings.load().upstream.model.clone(),
    })
}

pub async fn get_governor(State(state): State<AppState>) -> Json<GovernorStatus> {
    let governor = &state.governor;
    let now_ms = governor.now_ms();
    let settings = state.settings.load();

    Json(GovernorStatus {
        now_ms,
        admission: governor.admission().snapshot(now_ms),
        cache: governor.cache().summary(now_ms),
        pending_refreshes: governor.pending_refreshes(),
        pacing: PacingStatus {
            interval_ms: state.pacing.current_interval_ms(),
            min_interval_ms: settings.pacing.min_interval_ms,
            max_interval_ms: settings.pacing.max_interval_ms,
        },
    })
}
